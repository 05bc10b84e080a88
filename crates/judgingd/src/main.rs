//! judgingd: keeps the contest mirror in sync with the upstream source.
//!
//! Runs one reconciliation pass immediately and then every
//! `JUDGING_SYNC_INTERVAL_SECS` until Ctrl-C. A failed pass is logged and
//! retried on the next tick.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use judging_core::{init_tracing, HttpContestSource, JudgingConfig, MirrorStore, SyncService};
use judging_state::SurrealMirrorStore;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let json = std::env::var("JUDGINGD_LOG_JSON").is_ok_and(|v| v == "1" || v == "true");
    init_tracing(json, Level::INFO);

    let config = JudgingConfig::from_env().context("Invalid judging configuration")?;
    let store: Arc<dyn MirrorStore> = Arc::new(
        SurrealMirrorStore::setup_from_env()
            .await
            .context("Failed to connect to the mirror database")?,
    );
    let source =
        HttpContestSource::from_config(&config).context("Failed to build contest source client")?;

    let service = SyncService::new(Arc::new(source), store, &config);
    info!(
        source = %config.source_url,
        interval_secs = config.sync_interval.as_secs(),
        "judgingd started"
    );

    let passes = run(&service, config.sync_interval, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
    })
    .await;

    info!(passes, "judgingd stopped");
    Ok(())
}

/// Run a pass on every tick until `shutdown` resolves. Returns the number of
/// passes that completed.
async fn run(service: &SyncService, every: Duration, shutdown: impl Future<Output = ()>) -> u64 {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match service.sync().await {
                    Ok(report) => {
                        passes += 1;
                        if !report.failures.is_empty() {
                            warn!(
                                pass_id = %report.pass_id,
                                failures = report.failures.len(),
                                "pass finished with write failures"
                            );
                        }
                    }
                    Err(e) => error!(error = %e, "sync pass failed"),
                }
                service.metrics().flush();
            }
        }
    }
    passes
}

#[cfg(test)]
mod tests {
    use super::*;
    use judging_core::source::StaticContestSource;
    use judging_core::{read_mirrored_contests, Contest, ContestSet, Entry, SourceError};
    use judging_state::fakes::MemoryMirrorStore;

    fn upstream() -> ContestSet {
        let contest = Contest::new("c1", "Spring").with_entry(Entry::new("e1"));
        ContestSet::from([(contest.id.clone(), contest)])
    }

    #[tokio::test(start_paused = true)]
    async fn runs_a_pass_per_tick_until_shutdown() {
        let store = Arc::new(MemoryMirrorStore::new());
        let source = Arc::new(StaticContestSource::new(upstream()));
        let service = SyncService::new(source.clone(), store.clone(), &JudgingConfig::default());

        let passes = run(
            &service,
            Duration::from_secs(100),
            tokio::time::sleep(Duration::from_secs(250)),
        )
        .await;

        assert_eq!(passes, 3);
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(service.metrics().sync_passes(), 3);
        assert_eq!(service.metrics().contests_added(), 1);

        let mirror = read_mirrored_contests(store.as_ref()).await.unwrap();
        assert_eq!(mirror.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_passes_do_not_stop_the_loop() {
        let store = Arc::new(MemoryMirrorStore::new());
        let source = Arc::new(StaticContestSource::failing(SourceError::Unavailable(
            "maintenance".into(),
        )));
        let service = SyncService::new(source.clone(), store.clone(), &JudgingConfig::default());

        let passes = run(
            &service,
            Duration::from_secs(60),
            tokio::time::sleep(Duration::from_secs(150)),
        )
        .await;

        assert_eq!(passes, 0);
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(store.write_count(), 0);
    }
}
