use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::services::events::{EventBus, PredictionEvent};
use crate::services::replicate::ReplicateClient;
use crate::services::store::{ApplyOutcome, PredictionStore};

const MAX_CONCURRENT_LOOKUPS: usize = 4;
const PRUNE_EVERY: Duration = Duration::from_secs(3600);

/// Fallback loop that reconciles prediction state when webhook delivery
/// fails.
///
/// Webhooks are the latency optimization; this poller is the correctness
/// backstop. It only touches predictions no verified webhook has confirmed,
/// and its updates never set `webhook_confirmed`.
pub struct ReconciliationPoller {
    store: Arc<PredictionStore>,
    client: Arc<ReplicateClient>,
    events: EventBus,
    poll_interval: Duration,
    retention: chrono::Duration,
}

impl ReconciliationPoller {
    pub fn new(
        store: Arc<PredictionStore>,
        client: Arc<ReplicateClient>,
        events: EventBus,
        poll_interval: Duration,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            store,
            client,
            events,
            poll_interval,
            retention,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_prune = Instant::now();

        loop {
            ticker.tick().await;
            self.tick().await;

            if last_prune.elapsed() >= PRUNE_EVERY {
                last_prune = Instant::now();
                match self.store.prune(self.retention).await {
                    Ok(0) => {}
                    Ok(n) => tracing::info!(pruned = n, "Removed expired predictions"),
                    Err(e) => tracing::error!(error = %e, "Retention prune failed"),
                }
            }
        }
    }

    /// One reconciliation pass over all webhook-unconfirmed active
    /// predictions. A failing lookup is logged per prediction and never
    /// aborts the rest of the pass.
    pub async fn tick(&self) {
        metrics::counter!("poll_ticks_total").increment(1);

        let pending = match self.store.list_unconfirmed().await {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list pending predictions");
                return;
            }
        };
        metrics::gauge!("predictions_pending").set(pending.len() as f64);
        if pending.is_empty() {
            return;
        }

        tracing::debug!(pending = pending.len(), "Reconciling prediction status");

        futures::stream::iter(pending)
            .for_each_concurrent(MAX_CONCURRENT_LOOKUPS, |job| async move {
                self.check_job(&job.id).await;
            })
            .await;
    }

    async fn check_job(&self, id: &str) {
        match self.client.get_status(id).await {
            Ok(ApplyOutcome::Applied {
                record,
                status_changed,
            }) => {
                if status_changed {
                    tracing::info!(
                        prediction_id = %record.id,
                        status = %record.status,
                        "Poll advanced prediction"
                    );
                    self.events.publish(PredictionEvent::from_record(&record));
                }
            }
            Ok(ApplyOutcome::Stale {
                id,
                stored,
                incoming,
            }) => {
                tracing::info!(
                    prediction_id = %id,
                    stored = %stored,
                    incoming = %incoming,
                    "Discarded stale poll result"
                );
            }
            Ok(ApplyOutcome::Unknown { id }) => {
                tracing::warn!(prediction_id = %id, "Polled prediction vanished from store");
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    prediction_id = %id,
                    error = %e,
                    "Transient error polling prediction; retrying next tick"
                );
            }
            Err(e) => {
                tracing::error!(prediction_id = %id, error = %e, "Failed to poll prediction");
            }
        }
    }
}
