/// 统一的错误处理类型
///
/// 库内部使用 [`CoreError`] 描述可预期的失败；二进制程序与示例可以直接使用
/// `anyhow::Result`，并通过 `.context()` 添加上下文信息。
///
/// # 示例
///
/// ```rust,ignore
/// use interpose_core::{Result, Settings};
/// use anyhow::Context;
///
/// fn load() -> Result<Settings> {
///     Settings::load("config/application.toml").context("Failed to load settings")
/// }
/// ```
pub use anyhow::Result;

use std::path::PathBuf;

/// 配置与日志相关的错误
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// 读取配置文件失败
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 解析 TOML 失败
    #[error("Failed to parse TOML source '{name}': {source}")]
    ConfigParse {
        name: String,
        #[source]
        source: toml::de::Error,
    },

    /// 将配置段绑定到结构体失败
    #[error("Failed to bind config section '{prefix}': {message}")]
    ConfigBind { prefix: String, message: String },

    /// 日志系统初始化失败（通常是重复初始化）
    #[error("Failed to initialize logging: {0}")]
    LoggingInitFailed(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
