//! 拦截引擎的错误类型

use interpose_core::CoreError;
use std::fmt::{Debug, Display};

/// 代理调用与切点构造过程中可能出现的错误
///
/// 引擎本身不会记录、重试或吞掉这些错误，全部同步返回给 `call` 的调用方。
#[derive(Debug, thiserror::Error)]
pub enum AopError {
    /// 目标类型上不存在该方法
    #[error("Cannot find method `{method}` on type `{type_name}`")]
    MethodNotFound { type_name: String, method: String },

    /// 参数个数与方法声明不一致
    #[error("Method `{method}` expects {expected} parameter(s) but got {actual}")]
    ArityMismatch {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// 参数类型与方法声明不一致
    #[error("Argument {index} of `{method}` expects `{expected}` but got `{actual}`")]
    ArgumentType {
        method: String,
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// 切点正则表达式无效
    #[error("Invalid pointcut pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// 通知或目标方法执行失败
    #[error(transparent)]
    Failed(#[from] anyhow::Error),

    /// 代理配置无效
    #[error("Invalid proxy configuration: {0}")]
    Config(#[from] CoreError),
}

impl AopError {
    /// 由通知或目标方法主动抛出的失败
    pub fn failed<M>(message: M) -> Self
    where
        M: Display + Debug + Send + Sync + 'static,
    {
        AopError::Failed(anyhow::Error::msg(message))
    }

    /// 错误种类名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            AopError::MethodNotFound { .. } => "MethodNotFound",
            AopError::ArityMismatch { .. } => "ArityMismatch",
            AopError::ArgumentType { .. } => "ArgumentType",
            AopError::InvalidPattern(_) => "InvalidPattern",
            AopError::Failed(_) => "Failed",
            AopError::Config(_) => "Config",
        }
    }
}

pub type AopResult<T> = Result<T, AopError>;
