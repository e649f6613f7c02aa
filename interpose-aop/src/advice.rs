//! 通知（Advice）定义
//!
//! 通知拿到“调用链的剩余部分”和参数，自行决定是否、何时、调用几次下一层，
//! 也可以在调用前替换参数、在调用后替换结果。
//! 前置/后置并不是独立的钩子，只是通知在调用下一层之前或之后执行的代码，
//! [`before`]、[`after_returning`]、[`after_throwing`] 是对这几种常见形态的简写。

use crate::error::{AopError, AopResult};
use crate::invocation::Invocation;
use crate::pointcut::PointCut;
use crate::Value;
use std::fmt;
use std::sync::Arc;

/// 通知 Trait
pub trait Advice: Send + Sync {
    /// 执行通知，`invocation` 是被包裹的剩余调用链
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>>;
}

impl<A: Advice + ?Sized> Advice for Arc<A> {
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        (**self).advise(invocation, params)
    }
}

impl<A: Advice + ?Sized> Advice for Box<A> {
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        (**self).advise(invocation, params)
    }
}

/// 通知类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdviceType {
    /// 前置通知
    Before,
    /// 返回后通知（成功返回时执行）
    AfterReturning,
    /// 异常通知（失败时执行，失败照常向上传播）
    AfterThrowing,
    /// 环绕通知（完全控制方法执行）
    Around,
}

/// 环绕通知
#[derive(Clone)]
pub struct Around<F>(F);

impl<F> Advice for Around<F>
where
    F: Fn(&dyn Invocation, Vec<Value>) -> AopResult<Vec<Value>> + Send + Sync,
{
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        (self.0)(invocation, params)
    }
}

/// 前置通知：可检查或改写参数，返回错误则中止调用
#[derive(Clone)]
pub struct Before<F>(F);

impl<F> Advice for Before<F>
where
    F: Fn(&str, &mut Vec<Value>) -> AopResult<()> + Send + Sync,
{
    fn advise(&self, invocation: &dyn Invocation, mut params: Vec<Value>) -> AopResult<Vec<Value>> {
        (self.0)(invocation.method_name(), &mut params)?;
        invocation.invoke(params)
    }
}

/// 返回后通知：可检查或改写结果
#[derive(Clone)]
pub struct AfterReturning<F>(F);

impl<F> Advice for AfterReturning<F>
where
    F: Fn(&str, &mut Vec<Value>) -> AopResult<()> + Send + Sync,
{
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let mut ret = invocation.invoke(params)?;
        (self.0)(invocation.method_name(), &mut ret)?;
        Ok(ret)
    }
}

/// 异常通知：只观察失败，不改变传播
#[derive(Clone)]
pub struct AfterThrowing<F>(F);

impl<F> Advice for AfterThrowing<F>
where
    F: Fn(&str, &AopError) + Send + Sync,
{
    fn advise(&self, invocation: &dyn Invocation, params: Vec<Value>) -> AopResult<Vec<Value>> {
        invocation.invoke(params).map_err(|err| {
            (self.0)(invocation.method_name(), &err);
            err
        })
    }
}

pub fn around<F>(f: F) -> Around<F>
where
    F: Fn(&dyn Invocation, Vec<Value>) -> AopResult<Vec<Value>> + Send + Sync,
{
    Around(f)
}

pub fn before<F>(f: F) -> Before<F>
where
    F: Fn(&str, &mut Vec<Value>) -> AopResult<()> + Send + Sync,
{
    Before(f)
}

pub fn after_returning<F>(f: F) -> AfterReturning<F>
where
    F: Fn(&str, &mut Vec<Value>) -> AopResult<()> + Send + Sync,
{
    AfterReturning(f)
}

pub fn after_throwing<F>(f: F) -> AfterThrowing<F>
where
    F: Fn(&str, &AopError) + Send + Sync,
{
    AfterThrowing(f)
}

/// 切点与通知的组合
pub struct Advisor {
    pointcut: Arc<dyn PointCut>,
    advice: Arc<dyn Advice>,
}

impl Advisor {
    pub fn new(pointcut: Arc<dyn PointCut>, advice: Arc<dyn Advice>) -> Self {
        Self { pointcut, advice }
    }

    pub fn pointcut(&self) -> &dyn PointCut {
        self.pointcut.as_ref()
    }

    pub fn advice(&self) -> &Arc<dyn Advice> {
        &self.advice
    }
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor").finish_non_exhaustive()
    }
}
