// src/enrichment/orchestrator.rs
//! Fans a batch of rows out over one shared enricher and collects the outcomes.

use crate::enrichment::{
    models::{InputRow, RowOutcome},
    progress::BatchProgress,
    row_enricher::RowEnricher,
};
use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::{sync::Arc, time::Instant};
use tokio::sync::watch;

pub struct BatchOrchestrator {
    enricher: Arc<RowEnricher>,
    max_in_flight: usize,
    progress_tx: watch::Sender<BatchProgress>,
}

impl BatchOrchestrator {
    /// `max_in_flight` of 0 is treated as 1.
    pub fn new(enricher: Arc<RowEnricher>, max_in_flight: usize) -> Self {
        let (progress_tx, _) = watch::channel(BatchProgress::default());
        Self {
            enricher,
            max_in_flight: max_in_flight.max(1),
            progress_tx,
        }
    }

    /// Receives a progress snapshot after every finished row.
    pub fn subscribe(&self) -> watch::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    pub fn enricher(&self) -> &RowEnricher {
        &self.enricher
    }

    /// Processes every row and returns one outcome per row, sorted by input index.
    ///
    /// Rows interleave on the calling task; a failed row never cancels its siblings.
    pub async fn process_rows(&self, rows: &[InputRow]) -> Vec<RowOutcome> {
        let total = rows.len();
        let mut progress = BatchProgress::new(total);
        self.progress_tx.send_replace(progress.clone());

        if rows.is_empty() {
            info!("No rows to process.");
            return Vec::new();
        }

        info!(
            "Processing {} rows with at most {} in flight",
            total, self.max_in_flight
        );
        let started = Instant::now();
        let enricher = &self.enricher;

        let mut outcomes = Vec::with_capacity(total);
        let mut pending = stream::iter(rows.iter().enumerate())
            .map(|(index, row)| enricher.enrich(index, total, row))
            .buffer_unordered(self.max_in_flight);

        while let Some(outcome) = pending.next().await {
            progress.record(outcome.is_success(), started.elapsed());
            match &outcome.result {
                Some(result) => debug!("{} ({}ms)", result.message, result.elapsed.as_millis()),
                None => debug!("Row {} of {} failed", outcome.index + 1, total),
            }
            info!("Progress: {}", progress);
            self.progress_tx.send_replace(progress.clone());
            outcomes.push(outcome);
        }

        outcomes.sort_by_key(|outcome| outcome.index);
        info!(
            "Batch finished: {} succeeded, {} failed in {:.2}s ({} token refreshes)",
            progress.succeeded,
            progress.failed,
            started.elapsed().as_secs_f64(),
            self.enricher.tokens().refresh_count()
        );
        info!("Rate limiter: {}", self.enricher.limiter().get_usage_stats().await);
        outcomes
    }
}
