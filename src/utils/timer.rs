//! Timer utilities
//!
//! Provides timing helpers for run diagnostics.

use std::time::{Duration, Instant};

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    label: String,
}

impl Timer {
    /// Create and start a new timer
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop timer and return elapsed time
    pub fn stop(self) -> Duration {
        let elapsed = self.elapsed();
        tracing::debug!("{} took {}", self.label, minutes_seconds(elapsed));
        elapsed
    }
}

/// Format as "M minutes S seconds"
pub fn minutes_seconds(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{} minutes {} seconds", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timer() {
        let timer = Timer::start("test");
        sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }

    #[test]
    fn test_minutes_seconds() {
        assert_eq!(minutes_seconds(Duration::from_secs(0)), "0 minutes 0 seconds");
        assert_eq!(minutes_seconds(Duration::from_secs(125)), "2 minutes 5 seconds");
        assert_eq!(
            minutes_seconds(Duration::from_millis(59_999)),
            "0 minutes 59 seconds"
        );
    }
}
