//! 错误信息结构
//!
//! 把 [`AopError`] 拆成便于记录日志的结构化信息

use crate::error::AopError;
use std::error::Error;

/// 结构化的错误信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// 错误种类，见 [`AopError::kind`]
    pub kind: &'static str,

    /// 错误消息
    pub message: String,

    /// 错误源链（cause chain）
    pub source_chain: Vec<String>,
}

impl ErrorInfo {
    pub fn from_error(error: &AopError) -> Self {
        let mut source_chain = Vec::new();
        match error {
            // anyhow 的错误链从自身开始，第一项就是 message
            AopError::Failed(inner) => {
                source_chain.extend(inner.chain().skip(1).map(|cause| cause.to_string()));
            }
            _ => {
                let mut current = error.source();
                while let Some(source) = current {
                    source_chain.push(source.to_string());
                    current = source.source();
                }
            }
        }

        Self {
            kind: error.kind(),
            message: error.to_string(),
            source_chain,
        }
    }

    /// 获取完整的错误描述（包含源链）
    pub fn full_description(&self) -> String {
        if self.source_chain.is_empty() {
            self.message.clone()
        } else {
            format!(
                "{}\nCaused by:\n  {}",
                self.message,
                self.source_chain.join("\n  ")
            )
        }
    }
}

impl From<&AopError> for ErrorInfo {
    fn from(error: &AopError) -> Self {
        Self::from_error(error)
    }
}
