//! 切点（Pointcut）
//!
//! 切点是纯谓词：给定连接点，决定某个通知是否作用于它。
//! 切点可能在缓存结果之前被多次调用，实现不得有副作用，也不得回调同一个代理。

use crate::error::AopResult;
use crate::joinpoint::{JoinPoint, MethodSignature, TargetType};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// 切点 Trait
pub trait PointCut: Send + Sync {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool;
}

impl<P: PointCut + ?Sized> PointCut for Arc<P> {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        (**self).matches(join_point)
    }
}

/// 由闭包构成的切点，见 [`from_fn`]
#[derive(Clone)]
pub struct FnPointCut<F>(F);

impl<F> PointCut for FnPointCut<F>
where
    F: Fn(&JoinPoint<'_>) -> bool + Send + Sync,
{
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        (self.0)(join_point)
    }
}

/// 按方法名精确匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNamePointCut(String);

impl MethodNamePointCut {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl PointCut for MethodNamePointCut {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        join_point.method_name() == self.0
    }
}

/// 类型名字符串化函数
pub type TypeStringifier = Arc<dyn Fn(&TargetType) -> String + Send + Sync>;

/// 方法字符串化函数
pub type MethodStringifier = Arc<dyn Fn(&MethodSignature) -> String + Send + Sync>;

/// 按正则匹配类型与方法
///
/// 类型名与方法名先经过可替换的字符串化函数，再分别与两个可选的正则比较。
/// 未设置的正则视为总是匹配，两个都未设置时匹配所有方法。
#[derive(Clone)]
pub struct PatternPointCut {
    type_pattern: Option<Regex>,
    method_pattern: Option<Regex>,
    type_stringifier: TypeStringifier,
    method_stringifier: MethodStringifier,
}

impl PatternPointCut {
    /// 空字符串与 `None` 等价
    pub fn new(type_pattern: Option<&str>, method_pattern: Option<&str>) -> AopResult<Self> {
        Ok(Self {
            type_pattern: compile(type_pattern)?,
            method_pattern: compile(method_pattern)?,
            type_stringifier: Arc::new(canonical_type_name),
            method_stringifier: Arc::new(bare_method_name),
        })
    }

    pub fn with_type_stringifier<F>(mut self, stringifier: F) -> Self
    where
        F: Fn(&TargetType) -> String + Send + Sync + 'static,
    {
        self.type_stringifier = Arc::new(stringifier);
        self
    }

    pub fn with_method_stringifier<F>(mut self, stringifier: F) -> Self
    where
        F: Fn(&MethodSignature) -> String + Send + Sync + 'static,
    {
        self.method_stringifier = Arc::new(stringifier);
        self
    }
}

fn compile(pattern: Option<&str>) -> AopResult<Option<Regex>> {
    match pattern {
        Some(p) if !p.is_empty() => Ok(Some(Regex::new(p)?)),
        _ => Ok(None),
    }
}

/// 默认的类型字符串化：完整类型名
pub fn canonical_type_name(target_type: &TargetType) -> String {
    target_type.name().to_string()
}

/// 短类型名
pub fn short_type_name(target_type: &TargetType) -> String {
    target_type.short_name().to_string()
}

/// 默认的方法字符串化：方法名
pub fn bare_method_name(method: &MethodSignature) -> String {
    method.name().to_string()
}

impl PointCut for PatternPointCut {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        if let Some(regex) = &self.type_pattern {
            if !regex.is_match(&(self.type_stringifier)(join_point.target_type())) {
                return false;
            }
        }
        if let Some(regex) = &self.method_pattern {
            if !regex.is_match(&(self.method_stringifier)(join_point.method())) {
                return false;
            }
        }
        true
    }
}

impl fmt::Debug for PatternPointCut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternPointCut")
            .field("type_pattern", &self.type_pattern.as_ref().map(Regex::as_str))
            .field("method_pattern", &self.method_pattern.as_ref().map(Regex::as_str))
            .finish()
    }
}

/// 匹配所有方法
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPointCut;

impl PointCut for AnyPointCut {
    fn matches(&self, _join_point: &JoinPoint<'_>) -> bool {
        true
    }
}

/// 与运算
pub struct And<L, R>(L, R);

impl<L: PointCut, R: PointCut> PointCut for And<L, R> {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        self.0.matches(join_point) && self.1.matches(join_point)
    }
}

/// 或运算
pub struct Or<L, R>(L, R);

impl<L: PointCut, R: PointCut> PointCut for Or<L, R> {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        self.0.matches(join_point) || self.1.matches(join_point)
    }
}

/// 非运算
pub struct Not<P>(P);

impl<P: PointCut> PointCut for Not<P> {
    fn matches(&self, join_point: &JoinPoint<'_>) -> bool {
        !self.0.matches(join_point)
    }
}

/// 切点组合
pub trait PointCutExt: PointCut + Sized {
    fn and<R: PointCut>(self, other: R) -> And<Self, R> {
        And(self, other)
    }

    fn or<R: PointCut>(self, other: R) -> Or<Self, R> {
        Or(self, other)
    }

    fn not(self) -> Not<Self> {
        Not(self)
    }
}

impl<P: PointCut> PointCutExt for P {}

/// 按方法名精确匹配
pub fn method_name(name: impl Into<String>) -> MethodNamePointCut {
    MethodNamePointCut::new(name)
}

/// 按正则匹配类型名与方法名
pub fn pattern(type_pattern: Option<&str>, method_pattern: Option<&str>) -> AopResult<PatternPointCut> {
    PatternPointCut::new(type_pattern, method_pattern)
}

/// 自定义匹配函数
pub fn from_fn<F>(f: F) -> FnPointCut<F>
where
    F: Fn(&JoinPoint<'_>) -> bool + Send + Sync,
{
    FnPointCut(f)
}

/// 匹配所有方法
pub fn any() -> AnyPointCut {
    AnyPointCut
}

/// 通配符匹配（只支持 `*`），类型与方法名都使用短名称
///
/// - `*` - 匹配任意字符串
/// - `User*` - 以 User 开头
/// - `*Service` - 以 Service 结尾
/// - `get_*` - 以 get_ 开头的方法
pub fn glob(type_glob: &str, method_glob: &str) -> AopResult<PatternPointCut> {
    let type_pattern = glob_to_regex(type_glob);
    let method_pattern = glob_to_regex(method_glob);
    Ok(PatternPointCut::new(type_pattern.as_deref(), method_pattern.as_deref())?
        .with_type_stringifier(short_type_name))
}

fn glob_to_regex(glob: &str) -> Option<String> {
    if glob.is_empty() || glob == "*" {
        return None;
    }
    let escaped: Vec<String> = glob.split('*').map(|part| regex::escape(part)).collect();
    Some(format!("^{}$", escaped.join(".*")))
}
