//! Background sweep tasks.
//!
//! Two periodic jobs: reap idle sessions and return expired aging numbers to
//! the pool. A failed pass is logged and the loop keeps its cadence; both
//! sweeps are idempotent, so the next tick simply retries.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::Config;
use crate::lifecycle::LifecycleEngine;
use crate::session::SessionRegistry;

/// Handle to the running sweep tasks. Aborted on shutdown.
pub struct Sweeper {
    handles: Vec<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawns the idle-session sweep and the lifecycle sweep on their
    /// configured intervals.
    pub fn start(
        registry: Arc<SessionRegistry>,
        engine: Arc<LifecycleEngine>,
        config: &Config,
    ) -> Self {
        let mut handles = Vec::with_capacity(2);

        let idle_interval = config.idle_sweep_interval;
        let idle_registry = registry.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(idle_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let reaped = idle_registry.sweep_idle().await;
                if reaped > 0 {
                    debug!(target = "linectl.sweep", reaped, "idle sweep pass");
                }
            }
        }));

        let lifecycle_interval = config.lifecycle_sweep_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(lifecycle_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.sweep().await {
                    error!(target = "linectl.sweep", error = %e, "lifecycle sweep failed");
                }
            }
        }));

        Self { handles }
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;

    use crate::inventory::{MemoryStore, NumberStatus};

    #[tokio::test]
    async fn lifecycle_sweep_runs_on_its_interval() {
        let mut config = Config::default();
        config.idle_sweep_interval = Duration::from_millis(20);
        config.lifecycle_sweep_interval = Duration::from_millis(20);

        let registry = Arc::new(SessionRegistry::new(config.clone()));
        let engine = Arc::new(LifecycleEngine::new(Arc::new(MemoryStore::new()), &config));

        let mut rec = engine.import("contoso", "+15551230000", "seed").await.unwrap();
        rec.status = NumberStatus::Aging;
        rec.aging_until = Some(Utc::now() - chrono::Duration::minutes(1));
        engine.store().update(&rec).await.unwrap();

        let sweeper = Sweeper::start(registry, engine.clone(), &config);
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.shutdown();

        let rec = engine
            .store()
            .get_by_line("contoso", "+15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rec.status, NumberStatus::Available);
    }
}
