//! 代理（Proxy）
//!
//! 代理持有目标对象与通知列表，按名称调用目标方法：
//!
//! 1. 解析方法（成功结果按名称缓存，失败不缓存）
//! 2. 找出匹配的通知，组合成调用链（按方法缓存，首次调用后固定）
//! 3. 执行调用链，返回结果或错误
//!
//! 所有缓存都属于单个代理实例。同一方法的并发首次调用只会构建一次调用链，
//! 不同方法的构建互不等待。通知在所有锁之外执行，通知内部可以再次调用代理。

use crate::advice::{Advice, Advisor};
use crate::config::{ProxyConfig, ProxyPolicy};
use crate::error::{AopError, AopResult};
use crate::invocation::{Chain, Invocation};
use crate::joinpoint::{JoinPoint, TargetType};
use crate::method::{MethodDescriptor, MethodResolver, Proxied};
use crate::pointcut::PointCut;
use crate::Value;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// 调用链缓存的键：目标类型名 + 方法名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    type_name: &'static str,
    method: String,
}

impl MethodKey {
    pub fn new(target_type: &TargetType, method: impl Into<String>) -> Self {
        Self {
            type_name: target_type.name(),
            method: method.into(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.method)
    }
}

/// 已编译的调用链
///
/// 拆成最外层通知与其余部分；没有匹配的通知时 `advice` 为空，直接调用目标方法。
pub struct CompiledChain<T> {
    advice: Option<Arc<dyn Advice>>,
    next: Arc<Chain<T>>,
}

impl<T: Send + Sync + 'static> CompiledChain<T> {
    /// 对快照中的通知做一次逆序扫描：越早注册的通知越靠外
    fn build(
        target: &Arc<T>,
        method: &Arc<MethodDescriptor<T>>,
        advisors: &[Arc<Advisor>],
        join_point: &JoinPoint<'_>,
    ) -> Self {
        let mut next = Arc::new(Chain::terminal(target.clone(), method.clone()));
        let mut outermost: Option<Arc<dyn Advice>> = None;

        for advisor in advisors.iter().rev() {
            if !advisor.pointcut().matches(join_point) {
                continue;
            }
            if let Some(inner) = outermost.take() {
                next = Arc::new(Chain::advised(inner, next));
            }
            outermost = Some(advisor.advice().clone());
        }

        Self {
            advice: outermost,
            next,
        }
    }

    /// 链上的通知个数
    pub fn advice_count(&self) -> usize {
        usize::from(self.advice.is_some()) + self.next.depth()
    }

    pub fn invoke(&self, params: Vec<Value>) -> AopResult<Vec<Value>> {
        match &self.advice {
            Some(advice) => advice.advise(self.next.as_ref(), params),
            None => self.next.invoke(params),
        }
    }
}

impl<T> fmt::Debug for CompiledChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledChain")
            .field("advised", &self.advice.is_some())
            .field("next", &self.next)
            .finish()
    }
}

/// 每个键一个惰性单元：并发的首次访问汇聚到同一次构建
type CellMap<K, V> = RwLock<HashMap<K, Arc<OnceCell<Arc<V>>>>>;

fn cell_for<K, V>(map: &CellMap<K, V>, key: &K) -> Arc<OnceCell<Arc<V>>>
where
    K: Clone + Eq + Hash,
{
    let existing = map.read().get(key).cloned();
    if let Some(cell) = existing {
        return cell;
    }
    map.write().entry(key.clone()).or_default().clone()
}

/// 方法拦截代理
///
/// ```ignore
/// let proxy = Proxy::new(Arc::new(Calculator::default()));
/// proxy
///     .register(pointcut::method_name("add"), LoggingAdvice::new())
///     .register(pointcut::glob("*", "get_*")?, PerformanceAdvice::new(Duration::from_millis(50)));
///
/// let ret = proxy.call("add", params![1i64, 2i64])?;
/// ```
pub struct Proxy<T> {
    target: Arc<T>,
    target_type: TargetType,
    resolver: Arc<dyn MethodResolver<T>>,
    config: ProxyConfig,
    advisors: RwLock<Vec<Arc<Advisor>>>,
    methods: CellMap<String, MethodDescriptor<T>>,
    chains: CellMap<MethodKey, CompiledChain<T>>,
    single: CellMap<(usize, MethodKey), Chain<T>>,
}

impl<T: Proxied> Proxy<T> {
    /// 使用类型自带的方法表创建代理
    pub fn new(target: Arc<T>) -> Self {
        Self::with_config(target, ProxyConfig::default())
    }

    pub fn with_config(target: Arc<T>, config: ProxyConfig) -> Self {
        Self::with_resolver(target, Arc::new(T::method_table()), config)
    }
}

impl<T: Send + Sync + 'static> Proxy<T> {
    /// 使用自定义的方法解析器创建代理
    pub fn with_resolver(
        target: Arc<T>,
        resolver: Arc<dyn MethodResolver<T>>,
        config: ProxyConfig,
    ) -> Self {
        Self {
            target,
            target_type: TargetType::of::<T>(),
            resolver,
            config,
            advisors: RwLock::new(Vec::new()),
            methods: RwLock::new(HashMap::new()),
            chains: RwLock::new(HashMap::new()),
            single: RwLock::new(HashMap::new()),
        }
    }

    /// 注册通知
    ///
    /// 注册永远不会失败。已经编译过调用链的方法（链式策略）不受后注册通知的影响。
    pub fn register<P, A>(&self, pointcut: P, advice: A) -> &Self
    where
        P: PointCut + 'static,
        A: Advice + 'static,
    {
        self.register_advisor(Advisor::new(Arc::new(pointcut), Arc::new(advice)))
    }

    pub fn register_advisor(&self, advisor: Advisor) -> &Self {
        let mut advisors = self.advisors.write();
        advisors.push(Arc::new(advisor));
        tracing::debug!(
            proxy = %self.label(),
            advisors = advisors.len(),
            "Registered advisor"
        );
        self
    }

    /// 按名称调用目标方法
    pub fn call(&self, name: &str, params: Vec<Value>) -> AopResult<Vec<Value>> {
        let method = self.resolve(name)?;
        tracing::trace!(proxy = %self.label(), method = name, args = params.len(), "Calling");

        match self.config.policy {
            ProxyPolicy::Chained => {
                let chain = self.compiled_chain(&method, &params);
                chain.invoke(params)
            }
            ProxyPolicy::SingleMatch => self.call_single_match(&method, params),
        }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn target_type(&self) -> &TargetType {
        &self.target_type
    }

    pub fn policy(&self) -> ProxyPolicy {
        self.config.policy
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn advisor_count(&self) -> usize {
        self.advisors.read().len()
    }

    /// 目标上可调用的方法名
    pub fn method_names(&self) -> Vec<String> {
        self.resolver.method_names()
    }

    fn label(&self) -> &str {
        self.config
            .name
            .as_deref()
            .unwrap_or_else(|| self.target_type.short_name())
    }

    fn resolve(&self, name: &str) -> AopResult<Arc<MethodDescriptor<T>>> {
        let key = name.to_string();
        let cell = cell_for(&self.methods, &key);

        let resolved = cell.get_or_try_init(|| {
            let method = self
                .resolver
                .resolve(name)
                .ok_or_else(|| AopError::MethodNotFound {
                    type_name: self.target_type.name().to_string(),
                    method: name.to_string(),
                })?;
            tracing::debug!(proxy = %self.label(), signature = %method.signature(), "Resolved method");
            Ok(method)
        });

        match resolved {
            Ok(method) => Ok(method.clone()),
            Err(err) => {
                // 未找到的名称不留下空单元
                let mut methods = self.methods.write();
                if methods
                    .get(&key)
                    .is_some_and(|c| Arc::ptr_eq(c, &cell) && c.get().is_none())
                {
                    methods.remove(&key);
                }
                Err(err)
            }
        }
    }

    /// 链式策略：取出（必要时构建）该方法的调用链
    fn compiled_chain(
        &self,
        method: &Arc<MethodDescriptor<T>>,
        params: &[Value],
    ) -> Arc<CompiledChain<T>> {
        let key = MethodKey::new(&self.target_type, method.name());
        let cell = cell_for(&self.chains, &key);

        cell.get_or_init(|| {
            let advisors = self.advisors.read().clone();
            let join_point = JoinPoint::new(&self.target_type, method.signature(), params);
            let chain = CompiledChain::build(&self.target, method, &advisors, &join_point);
            tracing::debug!(
                proxy = %self.label(),
                key = %key,
                advices = chain.advice_count(),
                "Compiled invocation chain"
            );
            Arc::new(chain)
        })
        .clone()
    }

    /// 单匹配策略：每次调用重新匹配，第一个匹配的通知包裹真实调用
    fn call_single_match(
        &self,
        method: &Arc<MethodDescriptor<T>>,
        params: Vec<Value>,
    ) -> AopResult<Vec<Value>> {
        let hit = {
            let join_point = JoinPoint::new(&self.target_type, method.signature(), &params);
            let advisors = self.advisors.read();
            let found = advisors
                .iter()
                .enumerate()
                .find(|(_, advisor)| advisor.pointcut().matches(&join_point))
                .map(|(index, advisor)| (index, advisor.clone()));
            found
        };

        let Some((index, advisor)) = hit else {
            return method.invoke(&self.target, params);
        };

        let key = (index, MethodKey::new(&self.target_type, method.name()));
        let cell = cell_for(&self.single, &key);
        let chain = cell
            .get_or_init(|| {
                tracing::debug!(
                    proxy = %self.label(),
                    key = %key.1,
                    advisor = index,
                    "Built single-match invocation"
                );
                let terminal = Arc::new(Chain::terminal(self.target.clone(), method.clone()));
                Arc::new(Chain::advised(advisor.advice().clone(), terminal))
            })
            .clone();

        chain.invoke(params)
    }
}

impl<T> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("target_type", &self.target_type.name())
            .field("policy", &self.config.policy)
            .field("advisors", &self.advisors.read().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::{after_throwing, around};
    use crate::joinpoint::MethodSignature;
    use crate::method::MethodTable;
    use crate::pointcut::{self, PointCutExt};
    use crate::{params, value};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Barrier, Weak};
    use std::time::Duration;

    #[derive(Default)]
    struct Calc {
        direct_calls: AtomicUsize,
    }

    impl Calc {
        fn concat(&self, a: &str, b: &str) -> (String, usize) {
            self.direct_calls.fetch_add(1, Ordering::SeqCst);
            let ret = format!("{}{}", a, b);
            let len = ret.len();
            (ret, len)
        }
    }

    impl Proxied for Calc {
        fn method_table() -> MethodTable<Self> {
            MethodTable::new()
                .with_method(
                    MethodSignature::new("AGet").param::<String>().returns(1),
                    |_: &Calc, params| {
                        let a = value::arg::<String>(&params, "AGet", 0)?.clone();
                        Ok(params![a])
                    },
                )
                .with_method(
                    MethodSignature::new("Concat")
                        .param::<String>()
                        .param::<String>()
                        .returns(2),
                    |calc: &Calc, params| {
                        let a = value::arg::<String>(&params, "Concat", 0)?;
                        let b = value::arg::<String>(&params, "Concat", 1)?;
                        let (ret, len) = calc.concat(a, b);
                        Ok(params![ret, len])
                    },
                )
                .with_method(MethodSignature::new("Reset"), |calc: &Calc, _params| {
                    calc.direct_calls.store(0, Ordering::SeqCst);
                    Ok(Vec::new())
                })
        }
    }

    /// 记录进入/退出顺序的环绕通知
    fn tracing_advice(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> impl Advice {
        around(move |inv, params| {
            log.lock().push(format!("enter{}", tag));
            let ret = inv.invoke(params);
            log.lock().push(format!("exit{}", tag));
            ret
        })
    }

    fn counting_advice(counter: Arc<AtomicUsize>) -> impl Advice {
        around(move |inv, params| {
            counter.fetch_add(1, Ordering::SeqCst);
            inv.invoke(params)
        })
    }

    fn text(ret: &[Value], index: usize) -> String {
        ret[index].get::<String>().unwrap_or_default()
    }

    #[test]
    fn test_single_advisor_runs_once() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let count = Arc::new(AtomicUsize::new(0));
        proxy.register(pointcut::method_name("Concat"), counting_advice(count.clone()));

        let ret = proxy
            .call("Concat", params!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(text(&ret, 0), "ab");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(proxy.target().direct_calls.load(Ordering::SeqCst), 1);

        proxy
            .call("Concat", params!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(proxy.target().direct_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registration_order_is_nesting_order() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let log = Arc::new(Mutex::new(Vec::new()));

        proxy
            .register(pointcut::any(), tracing_advice("A", log.clone()))
            .register(pointcut::method_name("AGet"), tracing_advice("B", log.clone()))
            .register(pointcut::method_name("Concat"), tracing_advice("X", log.clone()))
            .register(pointcut::any(), tracing_advice("C", log.clone()));

        let inner = log.clone();
        proxy.register(
            pointcut::method_name("AGet"),
            around(move |inv, params| {
                inner.lock().push("call".to_string());
                inv.invoke(params)
            }),
        );

        proxy.call("AGet", params!["x".to_string()]).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["enterA", "enterB", "enterC", "call", "exitC", "exitB", "exitA"]
        );
    }

    #[test]
    fn test_concurrent_first_calls_build_once() {
        const THREADS: usize = 8;

        let proxy = Proxy::new(Arc::new(Calc::default()));
        let matches = Arc::new(AtomicUsize::new(0));
        let seen = matches.clone();
        proxy.register(
            pointcut::from_fn(move |jp| {
                seen.fetch_add(1, Ordering::SeqCst);
                jp.method_name() == "Concat"
            }),
            around(|inv, params| inv.invoke(params)),
        );

        let barrier = Barrier::new(THREADS);
        std::thread::scope(|scope| {
            for i in 0..THREADS {
                let proxy = &proxy;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let ret = proxy
                        .call("Concat", params![i.to_string(), "z".to_string()])
                        .unwrap();
                    assert_eq!(text(&ret, 0), format!("{}z", i));
                });
            }
        });

        assert_eq!(matches.load(Ordering::SeqCst), 1);
        assert_eq!(proxy.target().direct_calls.load(Ordering::SeqCst), THREADS);
    }

    #[test]
    fn test_chain_frozen_after_first_call() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let early = Arc::new(AtomicUsize::new(0));
        let late = Arc::new(AtomicUsize::new(0));

        proxy.register(pointcut::method_name("AGet"), counting_advice(early.clone()));
        proxy.call("AGet", params!["x".to_string()]).unwrap();

        proxy.register(pointcut::any(), counting_advice(late.clone()));
        proxy.call("AGet", params!["x".to_string()]).unwrap();
        proxy.call("AGet", params!["x".to_string()]).unwrap();

        assert_eq!(early.load(Ordering::SeqCst), 3);
        assert_eq!(late.load(Ordering::SeqCst), 0);
        assert_eq!(proxy.advisor_count(), 2);

        // 尚未调用过的方法会看到新注册的通知
        proxy
            .call("Concat", params!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(late.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_params_and_results_mutation() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        proxy.register(
            pointcut::method_name("Concat"),
            around(|inv, mut params| {
                params[0] = Value::new(format!("{}p1", text(&params, 0)));
                let mut ret = inv.invoke(params)?;
                ret[0] = Value::new(format!("{}r1", text(&ret, 0)));
                Ok(ret)
            }),
        );

        let ret = proxy
            .call("Concat", params!["hello".to_string(), "world".to_string()])
            .unwrap();
        assert_eq!(text(&ret, 0), "hellop1worldr1");
        assert_eq!(ret[1].get::<usize>(), Some(12));
    }

    #[test]
    fn test_unmatched_method_is_direct_call() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let count = Arc::new(AtomicUsize::new(0));
        proxy.register(pointcut::method_name("xx"), counting_advice(count.clone()));

        let ret = proxy
            .call("Concat", params!["hello".to_string(), "world".to_string()])
            .unwrap();
        let direct = proxy.target().concat("hello", "world");

        assert_eq!(text(&ret, 0), direct.0);
        assert_eq!(ret[1].get::<usize>(), Some(direct.1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_method_not_found() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let err = proxy.call("Missing", params![]).unwrap_err();
        match err {
            AopError::MethodNotFound { type_name, method } => {
                assert!(type_name.ends_with("Calc"));
                assert_eq!(method, "Missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_arity_mismatch() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let err = proxy.call("Concat", params!["only".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            AopError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
        assert!(err.to_string().contains("expects 2 parameter(s) but got 1"));
    }

    #[test]
    fn test_zero_returns() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        proxy
            .call("Concat", params!["a".to_string(), "b".to_string()])
            .unwrap();
        let ret = proxy.call("Reset", params![]).unwrap();
        assert!(ret.is_empty());
        assert_eq!(proxy.target().direct_calls.load(Ordering::SeqCst), 0);
    }

    /// 记录解析次数的解析器
    struct CountingResolver {
        table: MethodTable<Calc>,
        lookups: AtomicUsize,
        delay: Duration,
    }

    impl CountingResolver {
        fn new(delay: Duration) -> Self {
            Self {
                table: Calc::method_table(),
                lookups: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl MethodResolver<Calc> for CountingResolver {
        fn resolve(&self, name: &str) -> Option<Arc<MethodDescriptor<Calc>>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.table.resolve(name)
        }

        fn method_names(&self) -> Vec<String> {
            self.table.method_names()
        }
    }

    #[test]
    fn test_resolution_hits_cached_misses_not() {
        let resolver = Arc::new(CountingResolver::new(Duration::ZERO));
        let proxy = Proxy::with_resolver(
            Arc::new(Calc::default()),
            resolver.clone(),
            ProxyConfig::default(),
        );

        for _ in 0..3 {
            proxy.call("AGet", params!["x".to_string()]).unwrap();
        }
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);

        for _ in 0..3 {
            assert!(proxy.call("Nope", params![]).is_err());
        }
        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 4);
        assert!(proxy.methods.read().get("Nope").is_none());
        assert_eq!(proxy.method_names(), vec!["AGet", "Concat", "Reset"]);
    }

    #[test]
    fn test_concurrent_first_calls_resolve_once() {
        const THREADS: usize = 8;

        let resolver = Arc::new(CountingResolver::new(Duration::from_millis(50)));
        let proxy = Proxy::with_resolver(
            Arc::new(Calc::default()),
            resolver.clone(),
            ProxyConfig::default(),
        );

        let barrier = Barrier::new(THREADS);
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let proxy = &proxy;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    let ret = proxy.call("Reset", params![]).unwrap();
                    assert!(ret.is_empty());
                });
            }
        });

        assert_eq!(resolver.lookups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_during_first_calls() {
        const CALLERS: usize = 4;
        const REGISTRARS: usize = 4;
        const ROUNDS: usize = 50;

        let proxy = Proxy::new(Arc::new(Calc::default()));
        let hits = Arc::new(AtomicUsize::new(0));
        proxy.register(pointcut::any(), counting_advice(hits.clone()));

        let barrier = Barrier::new(CALLERS + REGISTRARS);
        std::thread::scope(|scope| {
            for _ in 0..REGISTRARS {
                let (proxy, barrier, hits) = (&proxy, &barrier, hits.clone());
                scope.spawn(move || {
                    barrier.wait();
                    proxy.register(pointcut::method_name("Concat"), counting_advice(hits));
                });
            }
            for i in 0..CALLERS {
                let (proxy, barrier) = (&proxy, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    for _ in 0..ROUNDS {
                        let ret = proxy
                            .call("Concat", params![i.to_string(), "z".to_string()])
                            .unwrap();
                        assert_eq!(text(&ret, 0), format!("{}z", i));
                    }
                });
            }
        });

        assert_eq!(proxy.advisor_count(), 1 + REGISTRARS);

        // 冻结的调用链包含快照中的全部通知，每次调用各执行一次
        let key = MethodKey::new(proxy.target_type(), "Concat");
        let depth = proxy.chains.read()[&key].get().unwrap().advice_count();
        assert!((1..=1 + REGISTRARS).contains(&depth));
        assert_eq!(hits.load(Ordering::SeqCst), depth * CALLERS * ROUNDS);
    }

    #[test]
    fn test_single_match_concurrent_build_once() {
        const THREADS: usize = 8;

        let proxy = Proxy::with_config(
            Arc::new(Calc::default()),
            ProxyConfig::new().with_policy(ProxyPolicy::SingleMatch),
        );
        let count = Arc::new(AtomicUsize::new(0));
        proxy.register(pointcut::method_name("Concat"), counting_advice(count.clone()));

        let captured = Arc::new(Mutex::new(Vec::<u8>::new()));
        let sink = captured.clone();
        let dispatch = tracing::Dispatch::new(
            tracing_subscriber::fmt()
                .with_writer(move || CapturedWriter(sink.clone()))
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish(),
        );

        let barrier = Barrier::new(THREADS);
        std::thread::scope(|scope| {
            for i in 0..THREADS {
                let (proxy, barrier, dispatch) = (&proxy, &barrier, &dispatch);
                scope.spawn(move || {
                    let _guard = tracing::dispatcher::set_default(dispatch);
                    barrier.wait();
                    let ret = proxy
                        .call("Concat", params![i.to_string(), "z".to_string()])
                        .unwrap();
                    assert_eq!(text(&ret, 0), format!("{}z", i));
                });
            }
        });

        let logs = String::from_utf8_lossy(&captured.lock()).into_owned();
        assert_eq!(logs.matches("Built single-match invocation").count(), 1);
        assert_eq!(proxy.single.read().len(), 1);
        assert_eq!(count.load(Ordering::SeqCst), THREADS);
    }

    /// 把日志写入共享缓冲区
    struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_advice_failure_propagates_unchanged() {
        let proxy = Proxy::new(Arc::new(Calc::default()));
        let failures = Arc::new(AtomicUsize::new(0));
        let observed = failures.clone();

        proxy
            .register(
                pointcut::any(),
                after_throwing(move |_, _| {
                    observed.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .register(
                pointcut::method_name("AGet"),
                around(|inv, params| {
                    if text(&params, 0) == "bad" {
                        return Err(AopError::failed("rejected"));
                    }
                    inv.invoke(params)
                }),
            );

        let err = proxy.call("AGet", params!["bad".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "rejected");
        assert_eq!(err.kind(), "Failed");
        assert_eq!(failures.load(Ordering::SeqCst), 1);

        let ret = proxy.call("AGet", params!["good".to_string()]).unwrap();
        assert_eq!(text(&ret, 0), "good");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_call_from_advice() {
        let proxy = Arc::new(Proxy::new(Arc::new(Calc::default())));
        let weak: Weak<Proxy<Calc>> = Arc::downgrade(&proxy);

        proxy.register(
            pointcut::method_name("AGet"),
            around(move |inv, params| {
                let proxy = weak.upgrade().ok_or_else(|| AopError::failed("proxy dropped"))?;
                let joined = proxy.call("Concat", params![text(&params, 0), "!".to_string()])?;
                inv.invoke(params![text(&joined, 0)])
            }),
        );
        proxy.register(
            pointcut::method_name("Concat"),
            around(|inv, params| inv.invoke(params)),
        );

        let ret = proxy.call("AGet", params!["hi".to_string()]).unwrap();
        assert_eq!(text(&ret, 0), "hi!");
    }

    #[test]
    fn test_single_match_first_advisor_wins() {
        let proxy = Proxy::with_config(
            Arc::new(Calc::default()),
            ProxyConfig::new().with_policy(ProxyPolicy::SingleMatch),
        );
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        proxy
            .register(pointcut::method_name("AGet"), counting_advice(first.clone()))
            .register(pointcut::any(), counting_advice(second.clone()));

        proxy.call("AGet", params!["x".to_string()]).unwrap();
        proxy
            .call("Concat", params!["a".to_string(), "b".to_string()])
            .unwrap();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(proxy.policy(), ProxyPolicy::SingleMatch);
    }

    #[test]
    fn test_single_match_sees_later_registrations() {
        let proxy = Proxy::with_config(
            Arc::new(Calc::default()),
            ProxyConfig::new().with_policy(ProxyPolicy::SingleMatch),
        );
        let late = Arc::new(AtomicUsize::new(0));

        proxy.register(pointcut::method_name("xx"), counting_advice(Arc::new(AtomicUsize::new(0))));
        proxy.call("AGet", params!["x".to_string()]).unwrap();

        proxy.register(
            pointcut::method_name("AGet").or(pointcut::method_name("BGet")),
            counting_advice(late.clone()),
        );
        proxy.call("AGet", params!["x".to_string()]).unwrap();
        proxy.call("AGet", params!["x".to_string()]).unwrap();

        assert_eq!(late.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_method_key_display() {
        let key = MethodKey::new(&TargetType::of::<Calc>(), "Concat");
        assert!(key.to_string().ends_with("Calc.Concat"));
        assert_eq!(key.method(), "Concat");
    }
}
