use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ModelError> {
        if end <= start {
            return Err(ModelError::EmptyWindow {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// The `days`-long window ending at `end`.
    pub fn trailing_days(end: DateTime<Utc>, days: i64) -> Result<Self, ModelError> {
        Self::new(end - Duration::days(days), end)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Contiguous, equal-length window immediately before this one.
    pub fn preceding(&self) -> Self {
        Self {
            start: self.start - self.duration(),
            end: self.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn half_open_bounds() {
        let w = Window::new(ts(100), ts(200)).unwrap();
        assert!(w.contains(ts(100)));
        assert!(w.contains(ts(199)));
        assert!(!w.contains(ts(200)));
        assert!(!w.contains(ts(99)));
    }

    #[test]
    fn preceding_is_adjacent_and_equal_length() {
        let w = Window::new(ts(1_000), ts(1_600)).unwrap();
        let prev = w.preceding();
        assert_eq!(prev.end, w.start);
        assert_eq!(prev.duration(), w.duration());
        assert_eq!(prev.start, ts(400));
    }

    #[test]
    fn rejects_empty_window() {
        assert!(Window::new(ts(5), ts(5)).is_err());
        assert!(Window::new(ts(6), ts(5)).is_err());
    }
}
