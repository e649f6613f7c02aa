// interpose-core: Interpose 各 crate 共用的基础设施
//
// 提供：
// - 统一错误类型（CoreError）
// - 基于 tracing-subscriber 的日志初始化
// - 分层配置（TOML 文件 + 环境变量 + 内存覆盖）

pub mod config;
pub mod error;
pub mod logging;

pub use config::{
    ConfigValue, EnvironmentPropertySource, MapPropertySource, PropertySource, Settings,
    TomlPropertySource, ENV_PREFIX,
};
pub use error::{CoreError, CoreResult, Result};
pub use logging::{LogFormat, LogLevel, LoggingConfig};

/// Prelude 模块，包含常用的类型
pub mod prelude {
    pub use crate::config::{ConfigValue, PropertySource, Settings};
    pub use crate::error::{CoreError, CoreResult, Result};
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use anyhow::{anyhow, Context};
}
