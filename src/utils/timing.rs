//! Stage timing for per-row processing.

use log::debug;
use std::time::{Duration, Instant};

/// Measures one row's processing, with a checkpoint per completed stage.
#[derive(Debug)]
pub struct Timer {
    start_time: Instant,
    label: String,
    checkpoints: Vec<(&'static str, Instant)>,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start_time: Instant::now(),
            label: label.into(),
            checkpoints: Vec::new(),
        }
    }

    pub fn checkpoint(&mut self, stage: &'static str) {
        let now = Instant::now();
        debug!(
            "{} - {} after {}ms",
            self.label,
            stage,
            now.duration_since(self.start_time).as_millis()
        );
        self.checkpoints.push((stage, now));
    }

    /// Time spent between the previous checkpoint (or start) and each checkpoint.
    pub fn segments(&self) -> Vec<(&'static str, Duration)> {
        let mut last = self.start_time;
        self.checkpoints
            .iter()
            .map(|(stage, at)| {
                let segment = at.duration_since(last);
                last = *at;
                (*stage, segment)
            })
            .collect()
    }

    pub fn finish(self) -> Duration {
        let total = self.start_time.elapsed();
        if !self.checkpoints.is_empty() {
            let breakdown = self
                .segments()
                .iter()
                .map(|(stage, d)| format!("{}={}ms", stage, d.as_millis()))
                .collect::<Vec<_>>()
                .join(" ");
            debug!("{} completed in {}ms ({})", self.label, total.as_millis(), breakdown);
        }
        total
    }
}
