//! 预定义的常用通知
//!
//! - [`LoggingAdvice`] - 记录方法进入、退出与失败
//! - [`PerformanceAdvice`] - 慢调用告警
//! - [`RetryAdvice`] - 失败重试

use crate::advice::Advice;
use crate::error::{AopError, AopResult};
use crate::error_info::ErrorInfo;
use crate::invocation::Invocation;
use crate::Value;
use std::time::{Duration, Instant};

/// 日志通知 - 记录方法调用
///
/// 失败只记录，不改变传播。
#[derive(Debug, Clone)]
pub struct LoggingAdvice {
    log_args: bool,
    log_result: bool,
}

impl LoggingAdvice {
    pub fn new() -> Self {
        Self {
            log_args: false,
            log_result: false,
        }
    }

    pub fn with_args(mut self) -> Self {
        self.log_args = true;
        self
    }

    pub fn with_result(mut self) -> Self {
        self.log_result = true;
        self
    }
}

impl Default for LoggingAdvice {
    fn default() -> Self {
        Self::new()
    }
}

impl Advice for LoggingAdvice {
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let method = invocation.method_name().to_string();
        if self.log_args {
            tracing::info!("→ Entering: {} args={:?}", method, params);
        } else {
            tracing::info!("→ Entering: {}", method);
        }

        let start = Instant::now();
        let result = invocation.invoke(params);
        let elapsed = start.elapsed();

        match &result {
            Ok(ret) if self.log_result => {
                tracing::info!("← Exiting: {} (took {:?}) result={:?}", method, elapsed, ret)
            }
            Ok(_) => tracing::info!("← Exiting: {} (took {:?})", method, elapsed),
            Err(err) => {
                let info = ErrorInfo::from_error(err);
                tracing::error!(
                    kind = info.kind,
                    "❌ Exception in {}: {}",
                    method,
                    info.full_description()
                );
            }
        }
        result
    }
}

/// 性能监控通知
#[derive(Debug, Clone)]
pub struct PerformanceAdvice {
    threshold: Duration,
}

impl PerformanceAdvice {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl Advice for PerformanceAdvice {
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let start = Instant::now();
        let result = invocation.invoke(params);
        let elapsed = start.elapsed();

        if elapsed > self.threshold {
            tracing::warn!(
                "⚠️ Slow method detected: {} took {}ms (threshold: {}ms)",
                invocation.method_name(),
                elapsed.as_millis(),
                self.threshold.as_millis()
            );
        }
        result
    }
}

/// 重试通知
///
/// 只重试 [`AopError::Failed`]；参数个数、类型错误重试也不会成功，直接返回。
/// 每次重试使用相同的参数。
#[derive(Debug, Clone)]
pub struct RetryAdvice {
    max_attempts: usize,
}

impl RetryAdvice {
    /// `max_attempts` 包含第一次调用，至少为 1
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }
}

impl Advice for RetryAdvice {
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let mut attempt = 1;
        loop {
            match invocation.invoke(params.clone()) {
                Err(err @ AopError::Failed(_)) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Retrying {} after failure: {}",
                        invocation.method_name(),
                        err
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
