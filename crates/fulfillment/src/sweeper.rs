//! Expiry Sweeper: payment deadlines and retention.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use common::AggregateId;
use document_store::DocumentStore;
use domain::{Aggregate, OrderService};
use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::FulfillmentConfig;
use crate::lifecycle::OrderLifecycle;
use crate::location::LocationStore;

/// Orders expired concurrently within one sweep.
const SWEEP_CONCURRENCY: usize = 8;

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub expired: usize,
    /// Orders paid, cancelled or failed between selection and write.
    pub skipped: usize,
}

/// Outcome of one retention purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub examined: usize,
    pub purged: usize,
    pub skipped: usize,
}

/// Background job cancelling unpaid orders and purging old cancelled ones.
#[derive(Clone)]
pub struct ExpirySweeper<S: DocumentStore> {
    orders: OrderService<S>,
    lifecycle: OrderLifecycle<S>,
    locations: LocationStore,
    sweep_interval: StdDuration,
    purge_interval: StdDuration,
    payment_timeout: Duration,
    cancelled_retention: Duration,
}

impl<S: DocumentStore + Clone + 'static> ExpirySweeper<S> {
    pub fn new(
        orders: OrderService<S>,
        lifecycle: OrderLifecycle<S>,
        locations: LocationStore,
        config: &FulfillmentConfig,
    ) -> Self {
        Self {
            orders,
            lifecycle,
            locations,
            sweep_interval: config.sweep_interval,
            purge_interval: config.purge_interval,
            payment_timeout: config.payment_timeout,
            cancelled_retention: config.cancelled_retention,
        }
    }

    /// Cancels every pending, unpaid order older than the payment timeout
    /// and returns its stock.
    ///
    /// An order that a customer cancels or pays while the sweep runs is
    /// skipped; its stock is returned by whichever write cancelled it.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> crate::Result<SweepReport> {
        let candidates = self
            .orders
            .unpaid_created_before(now - self.payment_timeout)
            .await?;
        let examined = candidates.len();

        let ids: Vec<AggregateId> = candidates.iter().filter_map(|order| order.id()).collect();
        let mut expired = 0;
        for chunk in ids.chunks(SWEEP_CONCURRENCY) {
            let outcomes = join_all(chunk.iter().map(|&id| self.expire_one(id, now))).await;
            expired += outcomes.into_iter().filter(|expired| *expired).count();
        }

        metrics::counter!("sweeper_expired_total").increment(expired as u64);
        let report = SweepReport {
            examined,
            expired,
            skipped: examined - expired,
        };
        if examined > 0 {
            tracing::info!(?report, "expiry sweep finished");
        }
        Ok(report)
    }

    async fn expire_one(&self, id: AggregateId, now: DateTime<Utc>) -> bool {
        match self.lifecycle.expire(id, now, self.payment_timeout).await {
            Ok(_) => true,
            Err(e) if e.is_fatal() => {
                tracing::error!(order_id = %id, error = %e, "failed to expire order");
                false
            }
            Err(e) => {
                tracing::debug!(order_id = %id, error = %e, "order no longer expirable");
                false
            }
        }
    }

    /// Deletes cancelled orders untouched for longer than the retention
    /// window. Best effort: an order changed since it was read is kept.
    #[tracing::instrument(skip(self))]
    pub async fn purge_cancelled(&self, now: DateTime<Utc>) -> crate::Result<PurgeReport> {
        let candidates = self
            .orders
            .cancelled_before(now - self.cancelled_retention)
            .await?;
        let mut report = PurgeReport {
            examined: candidates.len(),
            ..PurgeReport::default()
        };

        for order in candidates {
            let Some(id) = order.id() else {
                report.skipped += 1;
                continue;
            };
            match self.orders.delete(id, Some(order.version())).await {
                Ok(true) => report.purged += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::warn!(order_id = %id, error = %e, "failed to purge order");
                    report.skipped += 1;
                }
            }
        }

        metrics::counter!("sweeper_purged_total").increment(report.purged as u64);
        if report.examined > 0 {
            tracing::info!(?report, "retention purge finished");
        }
        Ok(report)
    }

    /// Runs both sweeps on their intervals until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut sweep = tokio::time::interval(self.sweep_interval);
        let mut purge = tokio::time::interval(self.purge_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            sweep_interval = ?self.sweep_interval,
            purge_interval = ?self.purge_interval,
            "expiry sweeper started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sweep.tick() => {
                    let started = std::time::Instant::now();
                    let now = Utc::now();
                    if let Err(e) = self.sweep_expired(now).await {
                        tracing::error!(error = %e, "expiry sweep failed");
                    }
                    let pruned = self.locations.prune(now);
                    if pruned > 0 {
                        tracing::debug!(pruned, "pruned stale agent locations");
                    }
                    metrics::histogram!("sweeper_run_duration_seconds", "job" => "expire")
                        .record(started.elapsed().as_secs_f64());
                }
                _ = purge.tick() => {
                    let started = std::time::Instant::now();
                    if let Err(e) = self.purge_cancelled(Utc::now()).await {
                        tracing::error!(error = %e, "retention purge failed");
                    }
                    metrics::histogram!("sweeper_run_duration_seconds", "job" => "purge")
                        .record(started.elapsed().as_secs_f64());
                }
            }
        }

        tracing::info!("expiry sweeper stopped");
    }
}
