use std::collections::HashMap;
use std::time::Instant;

/// Diagnostics sink for detection sessions.
///
/// Sessions report stage timings and per-call counts here instead of
/// deciding themselves where diagnostics go.
pub trait PipelineLogger: Send {
    /// Record how long a named stage took for one detect call.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. region count).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit a summary of everything recorded so far. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Forwards every event to the `log` facade at debug level.
pub struct LogPipelineLogger;

impl PipelineLogger for LogPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        log::debug!("{stage}: {duration_ms:.2}ms");
    }

    fn metric(&mut self, name: &str, value: f64) {
        log::debug!("{name} = {value}");
    }

    fn info(&mut self, message: &str) {
        log::debug!("{message}");
    }
}

/// Accumulates timings and metrics across detect calls and renders
/// per-stage averages on request.
pub struct StatsPipelineLogger {
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
}

impl StatsPipelineLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
        }
    }

    /// Formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!("Detection summary ({:.1}ms wall):", elapsed_ms)];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            lines.push(format!(
                "  {stage:12}: avg {:6.2}ms  total {total_ms:7.1}ms  ({} calls)",
                mean(durations),
                durations.len()
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            lines.push(format!("  {name}: avg {:.1}", mean(&self.metrics[name])));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

impl Default for StatsPipelineLogger {
    fn default() -> Self {
        Self::new()
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl PipelineLogger for StatsPipelineLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_and_log_loggers_accept_everything() {
        let mut loggers: Vec<Box<dyn PipelineLogger>> =
            vec![Box::new(NullPipelineLogger), Box::new(LogPipelineLogger)];
        for logger in loggers.iter_mut() {
            logger.timing("propose", 5.0);
            logger.metric("regions", 3.0);
            logger.info("hello");
            logger.summary();
        }
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = StatsPipelineLogger::new();
        logger.timing("propose", 20.0);
        logger.timing("propose", 30.0);
        logger.timing("landmarks", 5.0);

        assert_eq!(logger.timings_for("propose").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("landmarks").unwrap().len(), 1);
        assert!(logger.timings_for("suppress").is_none());
    }

    #[test]
    fn test_metric_average_in_summary() {
        let mut logger = StatsPipelineLogger::new();
        logger.metric("regions", 3.0);
        logger.metric("regions", 4.0);

        assert_relative_eq!(mean(logger.metrics_for("regions").unwrap()), 3.5);
        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("regions"));
        assert!(summary.contains("avg 3.5"));
    }

    #[test]
    fn test_summary_lists_stages_and_call_counts() {
        let mut logger = StatsPipelineLogger::new();
        logger.timing("propose", 10.0);
        logger.timing("propose", 20.0);
        logger.timing("landmarks", 1.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Detection summary"));
        assert!(summary.contains("propose"));
        assert!(summary.contains("(2 calls)"));
        assert!(summary.contains("landmarks"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StatsPipelineLogger::default().summary_string().is_none());
    }
}
