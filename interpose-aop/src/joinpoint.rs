//! 连接点（JoinPoint）定义
//!
//! 连接点描述一次按名称发起的方法调用：目标类型、方法签名与调用参数。
//! 切点只看得到连接点，看不到目标对象本身。

use crate::Value;
use std::any::TypeId;
use std::fmt;

/// 目标类型信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
}

impl TargetType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// 完整类型名，例如 `my_crate::service::UserService`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 去掉模块路径的类型名，例如 `UserService`
    ///
    /// 泛型参数保持原样：`my_crate::Wrapper<alloc::string::String>` -> `Wrapper<alloc::string::String>`
    pub fn short_name(&self) -> &'static str {
        let head = self.name.split('<').next().unwrap_or(self.name);
        match head.rfind("::") {
            Some(pos) => &self.name[pos + 2..],
            None => self.name,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 方法签名
///
/// 方法名、按顺序排列的参数类型名、声明的返回值个数。解析后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    name: String,
    params: Vec<&'static str>,
    returns: usize,
}

impl MethodSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: 0,
        }
    }

    /// 追加一个参数，类型名取自 `T`
    pub fn param<T: ?Sized + 'static>(mut self) -> Self {
        self.params.push(std::any::type_name::<T>());
        self
    }

    /// 以类型名追加参数（手写方法表时使用）
    pub fn param_named(mut self, type_name: &'static str) -> Self {
        self.params.push(type_name);
        self
    }

    /// 声明返回值个数
    pub fn returns(mut self, count: usize) -> Self {
        self.returns = count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_types(&self) -> &[&'static str] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn return_count(&self) -> usize {
        self.returns
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) -> {}", self.name, self.params.join(", "), self.returns)
    }
}

/// 连接点信息
///
/// 切点匹配时的上下文：目标类型、方法签名、本次调用的参数。
#[derive(Clone, Copy)]
pub struct JoinPoint<'a> {
    target_type: &'a TargetType,
    method: &'a MethodSignature,
    args: &'a [Value],
}

impl<'a> JoinPoint<'a> {
    pub fn new(target_type: &'a TargetType, method: &'a MethodSignature, args: &'a [Value]) -> Self {
        Self {
            target_type,
            method,
            args,
        }
    }

    pub fn target_type(&self) -> &'a TargetType {
        self.target_type
    }

    pub fn method(&self) -> &'a MethodSignature {
        self.method
    }

    pub fn method_name(&self) -> &'a str {
        self.method.name()
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// `UserService::get_user` 形式的签名
    pub fn signature(&self) -> String {
        format!("{}::{}", self.target_type.short_name(), self.method.name())
    }
}

impl fmt::Debug for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinPoint")
            .field("target_type", &self.target_type.name())
            .field("method", &self.method)
            .field("args", &self.args)
            .finish()
    }
}

impl fmt::Display for JoinPoint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}
