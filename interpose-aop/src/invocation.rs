//! 调用链
//!
//! [`Invocation`] 表示“下一步要做的事”：要么是真实的方法调用（终端节点），
//! 要么是包裹着下一层调用的通知。

use crate::advice::Advice;
use crate::error::AopResult;
use crate::method::MethodDescriptor;
use crate::Value;
use std::fmt;
use std::sync::Arc;

/// 调用链中的一步
pub trait Invocation: Send + Sync {
    /// 以给定参数继续执行，返回结果列表
    fn invoke(&self, params: Vec<Value>) -> AopResult<Vec<Value>>;

    /// 被调用的方法名
    fn method_name(&self) -> &str;
}

/// 调用链节点
pub enum Chain<T> {
    /// 直接调用目标方法
    Terminal {
        target: Arc<T>,
        method: Arc<MethodDescriptor<T>>,
    },
    /// 调用 `advice(next, params)`
    Advised {
        advice: Arc<dyn Advice>,
        next: Arc<Chain<T>>,
    },
}

impl<T> Chain<T> {
    pub fn terminal(target: Arc<T>, method: Arc<MethodDescriptor<T>>) -> Self {
        Chain::Terminal { target, method }
    }

    pub fn advised(advice: Arc<dyn Advice>, next: Arc<Chain<T>>) -> Self {
        Chain::Advised { advice, next }
    }

    /// 终端节点之前的通知层数
    pub fn depth(&self) -> usize {
        match self {
            Chain::Terminal { .. } => 0,
            Chain::Advised { next, .. } => 1 + next.depth(),
        }
    }
}

impl<T: Send + Sync + 'static> Invocation for Chain<T> {
    fn invoke(&self, params: Vec<Value>) -> AopResult<Vec<Value>> {
        match self {
            Chain::Terminal { target, method } => method.invoke(target, params),
            Chain::Advised { advice, next } => advice.advise(next.as_ref(), params),
        }
    }

    fn method_name(&self) -> &str {
        match self {
            Chain::Terminal { method, .. } => method.name(),
            Chain::Advised { next, .. } => next.method_name(),
        }
    }
}

impl<T> fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Terminal { method, .. } => f
                .debug_struct("Terminal")
                .field("method", &method.name())
                .finish(),
            Chain::Advised { next, .. } => f.debug_struct("Advised").field("next", next).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::around;
    use crate::joinpoint::MethodSignature;
    use crate::{params, value, Value};

    struct Echo;

    fn echo_method() -> Arc<MethodDescriptor<Echo>> {
        Arc::new(MethodDescriptor::new(
            MethodSignature::new("echo").param::<String>().returns(1),
            Arc::new(|_: &Echo, params: Vec<Value>| -> AopResult<Vec<Value>> {
                let s = value::arg::<String>(&params, "echo", 0)?.clone();
                Ok(params![s])
            }),
        ))
    }

    #[test]
    fn test_terminal() {
        let chain = Chain::terminal(Arc::new(Echo), echo_method());
        let ret = chain.invoke(params!["x".to_string()]).unwrap();
        assert_eq!(ret[0].get::<String>().as_deref(), Some("x"));
        assert_eq!(chain.method_name(), "echo");
        assert_eq!(chain.depth(), 0);
    }

    #[test]
    fn test_nested_advice_order() {
        let suffix = |tag: &'static str| {
            Arc::new(around(move |inv, mut params| {
                let s = params[0].get::<String>().unwrap_or_default();
                params[0] = Value::new(format!("{}>{}", s, tag));
                let mut ret = inv.invoke(params)?;
                let r = ret[0].get::<String>().unwrap_or_default();
                ret[0] = Value::new(format!("{}<{}", r, tag));
                Ok(ret)
            })) as Arc<dyn Advice>
        };

        let terminal = Arc::new(Chain::terminal(Arc::new(Echo), echo_method()));
        let inner = Arc::new(Chain::advised(suffix("b"), terminal));
        let outer = Chain::advised(suffix("a"), inner);

        assert_eq!(outer.depth(), 2);
        assert_eq!(outer.method_name(), "echo");

        let ret = outer.invoke(params!["x".to_string()]).unwrap();
        assert_eq!(ret[0].get::<String>().as_deref(), Some("x>a>b<b<a"));
    }
}
