use crate::utils::format_eta;
use serde::Serialize;
use std::time::Duration;

/// Snapshot of a running batch, published after every finished row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchProgress {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    pub fn record(&mut self, success: bool, elapsed: Duration) {
        self.processed += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.elapsed = elapsed;
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.processed as f64 / self.total as f64 * 100.0
    }

    /// Average time per processed row times the rows still to go.
    pub fn eta(&self) -> Option<Duration> {
        if self.processed == 0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.processed) as u128;
        let nanos = self.elapsed.as_nanos() * remaining / self.processed as u128;
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    pub fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

impl std::fmt::Display for BatchProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2}% ({}/{} rows, {} failed), ETA {}",
            self.percent(),
            self.processed,
            self.total,
            self.failed,
            self.eta().map(format_eta).unwrap_or_else(|| "unknown".to_string())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eta_scales_average_row_time() {
        let mut progress = BatchProgress::new(10);
        assert_eq!(progress.eta(), None);
        progress.record(true, Duration::from_secs(2));
        progress.record(false, Duration::from_secs(4));
        assert_eq!(progress.eta(), Some(Duration::from_secs(16)));
        assert_eq!(progress.percent(), 20.0);
        assert_eq!(progress.failed, 1);
    }

    #[test]
    fn eta_holds_for_counts_past_u32() {
        let mut progress = BatchProgress::new(5_000_000_001);
        progress.processed = 1;
        progress.elapsed = Duration::from_millis(2);
        assert_eq!(progress.eta(), Some(Duration::from_secs(10_000_000)));

        progress.processed = 4_294_967_297;
        progress.elapsed = Duration::from_secs(4_294_967_297);
        assert_eq!(progress.eta(), Some(Duration::from_secs(705_032_704)));
    }

    #[test]
    fn finished_batch_has_zero_eta() {
        let mut progress = BatchProgress::new(1);
        progress.record(true, Duration::from_millis(300));
        assert!(progress.is_complete());
        assert_eq!(progress.eta(), Some(Duration::ZERO));
    }
}
