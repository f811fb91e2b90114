//! # A small storage stack
//!
//! Demonstrates modvisor end to end:
//! - module registration with internal building blocks
//! - target selection from the command line
//! - a custom `Service` shared by two dependents
//! - fail-fast shutdown (`--fail`) and Ctrl-C shutdown
//!
//! ```text
//! cargo run --example tracing_stack                 # runs "all" until Ctrl-C
//! cargo run --example tracing_stack -- querier      # only querier + its dependencies
//! cargo run --example tracing_stack -- all --fail   # ingester fails, everything stops
//! cargo run --example tracing_stack -- --list       # public modules
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use modvisor::{
    BasicService, Instance, LogWriter, ModuleDescriptor, ModuleRegistry, Orchestrator,
    OrchestratorConfig, Service, ServiceError, ServiceState, Subscribe,
};

/// In-memory "storage": counts writes, shared by ingester and querier.
struct Store {
    inner: BasicService,
    writes: Arc<AtomicU64>,
}

impl Store {
    fn new() -> Self {
        let writes = Arc::new(AtomicU64::new(0));
        let inner = BasicService::new("store", |token: CancellationToken| async move {
            token.cancelled().await;
            Ok(())
        })
        .with_stopping(|_| async {
            println!("💾 Store: flushed");
            Ok(())
        });
        Self { inner, writes }
    }

    fn write(&self) -> u64 {
        self.writes.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Service for Store {
    fn start(&self) -> Result<(), ServiceError> {
        self.inner.start()
    }

    fn stop_async(&self) {
        self.inner.stop_async()
    }

    fn watch_state(&self) -> watch::Receiver<ServiceState> {
        self.inner.watch_state()
    }
}

fn registry(fail: bool) -> anyhow::Result<ModuleRegistry> {
    let store = ModuleDescriptor::new("store")
        .internal()
        .with_factory(|_, _| Ok(Some(Instance::new(Arc::new(Store::new())))));

    // Structural: groups store for the write path, produces no service.
    let ring = ModuleDescriptor::new("ring").internal().depends_on(["store"]);

    let ingester = ModuleDescriptor::new("ingester")
        .depends_on(["ring"])
        .with_factory(move |_, deps| {
            let store = deps.require::<Store>("store")?;
            let svc = BasicService::new("ingester", move |token: CancellationToken| {
                let store = store.clone();
                async move {
                    store.await_running().await?;
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
                        }
                        let n = store.write();
                        println!("📥 Ingester: write #{n}");
                        if fail && n == 3 {
                            return Err(ServiceError::fail("disk full"));
                        }
                    }
                }
            });
            Ok(Some(Instance::from_service(svc)))
        });

    let querier = ModuleDescriptor::new("querier")
        .depends_on(["store"])
        .with_factory(|_, deps| {
            let store = deps.require::<Store>("store")?;
            let svc = BasicService::new("querier", move |token: CancellationToken| {
                let store = store.clone();
                async move {
                    store.await_running().await?;
                    loop {
                        tokio::select! {
                            _ = token.cancelled() => return Ok(()),
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        }
                        println!("🔎 Querier: {} writes so far", store.count());
                    }
                }
            });
            Ok(Some(Instance::from_service(svc)))
        });

    let all = ModuleDescriptor::new("all").depends_on(["ingester", "querier"]);

    let registry = ModuleRegistry::builder()
        .register_all([store, ring, ingester, querier, all])
        .build()?;
    registry.validate()?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let fail = args.iter().any(|a| a == "--fail");
    let registry = registry(fail)?;

    if args.iter().any(|a| a == "--list") {
        for name in registry.user_visible_modules() {
            println!("{name}");
        }
        return Ok(());
    }

    let target = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| "all".to_string());

    let cfg = OrchestratorConfig {
        grace: Duration::from_secs(10),
        ..OrchestratorConfig::for_target(target)
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    Orchestrator::builder(registry, cfg)
        .with_subscribers(subs)
        .build()
        .run()
        .await?;

    println!("✅ Stopped cleanly");
    Ok(())
}
