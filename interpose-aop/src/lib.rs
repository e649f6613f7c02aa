//! Interpose AOP - 按名称调用的方法拦截
//!
//! 提供：
//! - 可组合的切点（方法名、正则、通配符、与/或/非、自定义闭包）
//! - 环绕式通知，以及前置/返回后/异常通知的简写
//! - 按方法缓存调用链的代理，并发首次调用只构建一次
//! - `#[methods]` 宏，从 `impl` 块生成方法表
//! - 预定义的日志、性能、重试通知
//!
//! ```ignore
//! use interpose_aop::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! #[methods]
//! impl Greeter {
//!     pub fn greet(&self, name: &str) -> String {
//!         format!("hello {}", name)
//!     }
//! }
//!
//! let proxy = Proxy::new(Arc::new(Greeter));
//! proxy.register(pointcut::method_name("greet"), LoggingAdvice::new());
//! let ret = proxy.call("greet", params!["world".to_string()])?;
//! ```

pub mod advice;
pub mod aspects;
pub mod config;
pub mod error;
pub mod error_info;
pub mod invocation;
pub mod joinpoint;
pub mod method;
pub mod pointcut;
pub mod proxy;
pub mod value;

// 重新导出核心类型
pub use advice::{Advice, AdviceType, Advisor};
pub use aspects::{LoggingAdvice, PerformanceAdvice, RetryAdvice};
pub use config::{ProxyConfig, ProxyPolicy};
pub use error::{AopError, AopResult};
pub use error_info::ErrorInfo;
pub use invocation::{Chain, Invocation};
pub use joinpoint::{JoinPoint, MethodSignature, TargetType};
pub use method::{MethodDescriptor, MethodResolver, MethodTable, Proxied};
pub use pointcut::{PointCut, PointCutExt};
pub use proxy::{CompiledChain, MethodKey, Proxy};
pub use value::Value;

pub use interpose_aop_macros::methods;

/// 预导入模块
pub mod prelude {
    pub use crate::advice::{self, after_returning, after_throwing, around, before, Advice, Advisor};
    pub use crate::aspects::{LoggingAdvice, PerformanceAdvice, RetryAdvice};
    pub use crate::config::{ProxyConfig, ProxyPolicy};
    pub use crate::error::{AopError, AopResult};
    pub use crate::invocation::Invocation;
    pub use crate::joinpoint::{JoinPoint, MethodSignature, TargetType};
    pub use crate::method::{MethodResolver, MethodTable, Proxied};
    pub use crate::params;
    pub use crate::pointcut::{self, PointCut, PointCutExt};
    pub use crate::proxy::Proxy;
    pub use crate::value::Value;
    pub use interpose_aop_macros::methods;
    pub use std::sync::Arc;
}
