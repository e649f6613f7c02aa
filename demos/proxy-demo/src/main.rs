use interpose_aop::prelude::*;
use interpose_aop::{value, ErrorInfo};
use interpose_core::prelude::*;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// ==================== 配置定义 ====================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct AppSection {
    name: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "Interpose Proxy Demo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct OrderSection {
    discount: u64,
}

// ==================== 业务服务 ====================

struct OrderService {
    discount: u64,
    next_id: AtomicU64,
}

#[methods]
impl OrderService {
    pub fn place(&self, item: &str, cents: u64) -> (u64, u64) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let total = cents * (100 - self.discount.min(100)) / 100;
        tracing::info!("   placing order #{} for {}", id, item);
        (id, total)
    }

    pub fn describe(&self, id: u64) -> String {
        format!("order #{}", id)
    }

    pub fn slow_report(&self) -> usize {
        std::thread::sleep(Duration::from_millis(30));
        self.next_id.load(Ordering::SeqCst) as usize
    }
}

fn main() -> Result<()> {
    // 查找配置文件
    let config_paths = ["demos/proxy-demo/application.toml", "application.toml"];
    let config_file = config_paths
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .copied()
        .unwrap_or("application.toml");

    let settings = Settings::load(config_file)?;
    LoggingConfig::from_settings(&settings)?.init()?;

    let app: AppSection = settings.bind("app")?;
    let order: OrderSection = settings.bind("order")?;
    let proxy_config = ProxyConfig::from_settings(&settings)?;

    println!("\n╔════════════════════════════════════════════════════╗");
    println!("║  {}", app.name);
    println!("╚════════════════════════════════════════════════════╝\n");
    println!("📦 Proxy policy: {}", proxy_config.policy);

    let service = Arc::new(OrderService {
        discount: order.discount,
        next_id: AtomicU64::new(0),
    });
    let proxy = Proxy::with_config(service, proxy_config);

    proxy
        .register(pointcut::any(), LoggingAdvice::new().with_args().with_result())
        .register(
            pointcut::glob("*Service", "slow_*")?,
            PerformanceAdvice::new(Duration::from_millis(10)),
        )
        .register(
            pointcut::method_name("place"),
            before(|_, params| {
                let cents = value::arg::<u64>(params, "place", 1)?;
                if *cents == 0 {
                    return Err(AopError::failed("order total must be positive"));
                }
                Ok(())
            }),
        )
        .register(
            pointcut::method_name("describe"),
            after_returning(|_, ret| {
                let text = ret[0].get::<String>().unwrap_or_default();
                ret[0] = Value::new(text.to_uppercase());
                Ok(())
            }),
        );

    println!("🔧 Methods: {:?}", proxy.method_names());

    let ret = proxy.call("place", params!["book".to_string(), 2500u64])?;
    let id = ret[0].get::<u64>().unwrap_or_default();
    println!("   Order {} total: {} cents", id, ret[1].get::<u64>().unwrap_or_default());

    let ret = proxy.call("describe", params![id])?;
    println!("   Description: {}", ret[0].get::<String>().unwrap_or_default());

    if let Err(err) = proxy.call("place", params!["nothing".to_string(), 0u64]) {
        println!("   Rejected: {}", err);
    }

    let ret = proxy.call("slow_report", params![])?;
    println!("   Orders placed: {}", ret[0].get::<usize>().unwrap_or_default());

    if let Err(err) = proxy.call("cancel", params![id]) {
        println!("   {}", ErrorInfo::from_error(&err).full_description());
    }

    println!("\n✅ Done");
    Ok(())
}
