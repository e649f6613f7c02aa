//! 动态类型的参数/返回值
//!
//! 代理按名称调用方法，参数与返回值在调用链中以 [`Value`] 传递。
//! `Value` 克隆成本很低（共享同一份数据），通知可以自由复制、替换参数列表。

use crate::error::{AopError, AopResult};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// 线程安全、可共享的动态值
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Value {
    /// 包装任意值
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// 存储值的类型名称
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// 存储值的 TypeId
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// 是否存储的是 `T`
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// 借用为 `&T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// 克隆出 `T`
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 常见类型直接打印内容，其余只打印类型名
        if let Some(s) = self.downcast_ref::<String>() {
            write!(f, "{:?}", s)
        } else if let Some(s) = self.downcast_ref::<&'static str>() {
            write!(f, "{:?}", s)
        } else if let Some(n) = self.downcast_ref::<i64>() {
            write!(f, "{}", n)
        } else if let Some(n) = self.downcast_ref::<i32>() {
            write!(f, "{}", n)
        } else if let Some(n) = self.downcast_ref::<usize>() {
            write!(f, "{}", n)
        } else if let Some(n) = self.downcast_ref::<u64>() {
            write!(f, "{}", n)
        } else if let Some(n) = self.downcast_ref::<f64>() {
            write!(f, "{}", n)
        } else if let Some(b) = self.downcast_ref::<bool>() {
            write!(f, "{}", b)
        } else {
            write!(f, "<{}>", self.type_name)
        }
    }
}

/// 从参数列表中按位置借用 `T`
///
/// 由 `#[methods]` 生成的代码以及手写的方法表使用。
///
/// 参数个数由调用链末端按签名检查，这里越界说明处理函数与签名不一致。
pub fn arg<'a, T: Any>(params: &'a [Value], method: &str, index: usize) -> AopResult<&'a T> {
    let value = nth(params, method, index)?;
    value.downcast_ref::<T>().ok_or_else(|| AopError::ArgumentType {
        method: method.to_string(),
        index,
        expected: std::any::type_name::<T>(),
        actual: value.type_name(),
    })
}

/// 按位置借用字符串参数，`String` 与 `&'static str` 均可
pub fn arg_str<'a>(params: &'a [Value], method: &str, index: usize) -> AopResult<&'a str> {
    let value = nth(params, method, index)?;
    if let Some(s) = value.downcast_ref::<String>() {
        return Ok(s.as_str());
    }
    value
        .downcast_ref::<&'static str>()
        .copied()
        .ok_or_else(|| AopError::ArgumentType {
            method: method.to_string(),
            index,
            expected: std::any::type_name::<String>(),
            actual: value.type_name(),
        })
}

fn nth<'a>(params: &'a [Value], method: &str, index: usize) -> AopResult<&'a Value> {
    params.get(index).ok_or_else(|| {
        AopError::failed(format!(
            "method `{}` read parameter #{} but only {} were passed",
            method,
            index,
            params.len()
        ))
    })
}

/// 构造参数列表
///
/// ```ignore
/// let ret = proxy.call("Concat", params!["hello".to_string(), "world".to_string()])?;
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::new($value)),+]
    };
}
