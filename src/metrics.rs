use std::time::Instant;

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Per-request stage latencies in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyMetrics {
    pub transcription: f64,
    pub tool_call: f64,
    pub post_processing: f64,
}

impl LatencyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_timer() -> Instant {
        Instant::now()
    }

    /// Seconds since `start`, rounded to milliseconds.
    pub fn end_timer(start: Instant) -> f64 {
        round3(start.elapsed().as_secs_f64())
    }

    pub fn total(&self) -> f64 {
        let total = round3(self.transcription + self.tool_call + self.post_processing);
        tracing::info!("Total latency: {} seconds", total);
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fresh_metrics_are_zero() {
        let metrics = LatencyMetrics::new();
        assert_eq!(metrics.transcription, 0.0);
        assert_eq!(metrics.tool_call, 0.0);
        assert_eq!(metrics.post_processing, 0.0);
        assert_eq!(metrics.total(), 0.0);
    }

    #[test]
    fn test_total_is_rounded_sum() {
        let metrics = LatencyMetrics {
            transcription: 0.1234,
            tool_call: 1.0004,
            post_processing: 0.0101,
        };
        assert_eq!(metrics.total(), 1.134);
    }

    #[test]
    fn test_timer_rounds_to_milliseconds() {
        let start = LatencyMetrics::start_timer();
        std::thread::sleep(Duration::from_millis(5));
        let elapsed = LatencyMetrics::end_timer(start);
        assert!(elapsed >= 0.005);
        assert_eq!(elapsed, round3(elapsed));
    }
}
