//! 代理配置
//!
//! 对应配置文件中的 `[proxy]` 段：
//!
//! ```toml
//! [proxy]
//! policy = "single-match"
//! name = "user-service"
//! ```

use crate::error::AopResult;
use interpose_core::Settings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 通知匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyPolicy {
    /// 所有匹配的通知按注册顺序嵌套成一条链，每个方法首次调用后固定
    #[default]
    Chained,
    /// 每次调用按注册顺序取第一个匹配的通知，只包裹真实调用
    SingleMatch,
}

impl fmt::Display for ProxyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyPolicy::Chained => write!(f, "chained"),
            ProxyPolicy::SingleMatch => write!(f, "single-match"),
        }
    }
}

impl FromStr for ProxyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "chained" => Ok(ProxyPolicy::Chained),
            "single-match" => Ok(ProxyPolicy::SingleMatch),
            _ => Err(format!("Invalid proxy policy: {}", s)),
        }
    }
}

/// 代理配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// 匹配策略
    pub policy: ProxyPolicy,

    /// 日志中显示的代理名称，缺省为目标类型短名
    pub name: Option<String>,
}

impl ProxyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从 `[proxy]` 配置段读取
    pub fn from_settings(settings: &Settings) -> AopResult<Self> {
        Ok(settings.bind("proxy")?)
    }

    pub fn with_policy(mut self, policy: ProxyPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
