//! Human-readable run report embedded in the summary event.

use crate::events::SummaryPayload;
use crate::stats::LatencyStats;

/// Render the multiline text block for a finished run.
pub fn render(summary: &SummaryPayload) -> String {
    let mut lines = vec![
        format!(
            "Load test complete: scenario={} profile={}",
            summary.scenario,
            summary.profile.as_deref().unwrap_or("-")
        ),
        format!(
            "Duration: {}s  Completed: {}  Errors: {}  Samples: {}",
            summary.duration_seconds, summary.completed, summary.errors, summary.samples
        ),
        series_line("overall", &summary.latency),
    ];

    if let Some(stats) = &summary.command {
        lines.push(series_line("command", stats));
    }
    if let Some(stats) = &summary.get_session {
        lines.push(series_line("get_session", stats));
    }
    if let Some(stats) = &summary.list_sessions {
        lines.push(series_line("list_sessions", stats));
    }

    lines.join("\n")
}

fn series_line(name: &str, stats: &LatencyStats) -> String {
    format!(
        "{name:>13}: avg {:.1}ms  p50 {}ms  p95 {}ms  p99 {}ms  min {}ms  max {}ms",
        stats.avg, stats.p50, stats.p95, stats.p99, stats.min, stats.max
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_with(command: Option<LatencyStats>) -> SummaryPayload {
        let latency = LatencyStats::from_samples(&[10, 20, 30, 40]);
        SummaryPayload {
            scenario: "providerless".to_string(),
            profile: Some("command_only".to_string()),
            duration_seconds: 30,
            completed: 4,
            errors: 1,
            samples: 4,
            latency: latency.clone(),
            mixed: latency,
            command,
            get_session: None,
            list_sessions: None,
            report: String::new(),
        }
    }

    #[test]
    fn report_lists_every_present_series() {
        let text = render(&summary_with(Some(LatencyStats::from_samples(&[10, 20]))));
        assert!(text.contains("scenario=providerless profile=command_only"));
        assert!(text.contains("Completed: 4  Errors: 1"));
        assert!(text.contains("overall: avg 25.0ms  p50 20ms  p95 40ms"));
        assert!(text.contains("command:"));
        assert!(!text.contains("get_session:"));
    }

    #[test]
    fn report_is_multiline_text() {
        let text = render(&summary_with(None));
        assert!(text.lines().count() >= 3);
    }
}
