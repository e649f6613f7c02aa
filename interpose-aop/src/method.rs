//! 方法解析与调用适配
//!
//! Rust 没有运行时反射，按名称调用依赖一张显式的方法表（手写的 vtable）：
//! 方法名 -> ([`MethodSignature`], 调用闭包)。方法表可以手写，
//! 也可以由 `#[methods]` 宏从 `impl` 块生成。

use crate::error::{AopError, AopResult};
use crate::joinpoint::MethodSignature;
use crate::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 实际执行方法调用的闭包
pub type MethodHandler<T> = Arc<dyn Fn(&T, Vec<Value>) -> AopResult<Vec<Value>> + Send + Sync>;

/// 已解析的方法
pub struct MethodDescriptor<T> {
    signature: MethodSignature,
    handler: MethodHandler<T>,
}

impl<T> MethodDescriptor<T> {
    pub fn new(signature: MethodSignature, handler: MethodHandler<T>) -> Self {
        Self { signature, handler }
    }

    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub fn name(&self) -> &str {
        self.signature.name()
    }

    /// 调用目标方法
    ///
    /// 参数个数必须与声明一致。声明零个返回值的方法返回空列表。
    pub fn invoke(&self, target: &T, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let expected = self.signature.param_count();
        if params.len() != expected {
            return Err(AopError::ArityMismatch {
                method: self.signature.name().to_string(),
                expected,
                actual: params.len(),
            });
        }
        (self.handler)(target, params)
    }
}

impl<T> fmt::Debug for MethodDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("signature", &self.signature)
            .finish()
    }
}

/// 方法解析器
///
/// 给定名称返回可调用的方法；找不到时返回 `None`，由代理转换为 `MethodNotFound`。
pub trait MethodResolver<T>: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<MethodDescriptor<T>>>;

    /// 所有可解析的方法名
    fn method_names(&self) -> Vec<String>;
}

/// 方法表
pub struct MethodTable<T> {
    methods: HashMap<String, Arc<MethodDescriptor<T>>>,
}

impl<T> MethodTable<T> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// 注册方法，同名方法会被覆盖
    pub fn insert<F>(&mut self, signature: MethodSignature, handler: F)
    where
        F: Fn(&T, Vec<Value>) -> AopResult<Vec<Value>> + Send + Sync + 'static,
    {
        let name = signature.name().to_string();
        self.methods
            .insert(name, Arc::new(MethodDescriptor::new(signature, Arc::new(handler))));
    }

    /// 链式注册
    pub fn with_method<F>(mut self, signature: MethodSignature, handler: F) -> Self
    where
        F: Fn(&T, Vec<Value>) -> AopResult<Vec<Value>> + Send + Sync + 'static,
    {
        self.insert(signature, handler);
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl<T> Default for MethodTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync> MethodResolver<T> for MethodTable<T> {
    fn resolve(&self, name: &str) -> Option<Arc<MethodDescriptor<T>>> {
        self.methods.get(name).cloned()
    }

    fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }
}

/// 可被代理的类型
///
/// 通常由 `#[methods]` 宏实现：
///
/// ```ignore
/// #[interpose_aop::methods]
/// impl Greeter {
///     pub fn greet(&self, name: &str) -> String {
///         format!("hello {}", name)
///     }
/// }
/// ```
pub trait Proxied: Sized + Send + Sync + 'static {
    fn method_table() -> MethodTable<Self>;
}
