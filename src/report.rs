//! Rendering of the final run summary for stdout.

use std::fmt::Write;

use crate::audit::AuditReport;

pub fn render_text(shuttle: &str, report: &AuditReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "CID audit for {}", shuttle);
    let _ = writeln!(out, "  total:       {}", s.total_items);
    if !report.complete {
        let _ = writeln!(out, "  completed:   {} (run incomplete)", s.completed);
    }
    let _ = writeln!(out, "  available:   {}", s.available);
    let _ = writeln!(out, "  unavailable: {}", s.unavailable_total());
    for (code, count) in &s.unavailable {
        let _ = writeln!(out, "    {}: {}", code, count);
    }
    let _ = writeln!(out, "  unreachable: {}", s.unreachable_total());
    for (reason, count) in &s.unreachable {
        let _ = writeln!(out, "    {}: {}", reason, count);
    }
    out
}

pub fn render_json(shuttle: &str, report: &AuditReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "shuttle": shuttle,
        "complete": report.complete,
        "summary": report.summary,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::RunSummary;

    fn report(complete: bool) -> AuditReport {
        let mut summary = RunSummary { total_items: 5, ..Default::default() };
        summary.record(&crate::model::ProbeStatus::Available);
        summary.record(&crate::model::ProbeStatus::Available);
        summary.record(&crate::model::ProbeStatus::Unavailable { code: 404 });
        summary.record(&crate::model::ProbeStatus::Unavailable { code: 404 });
        summary.record(&crate::model::ProbeStatus::Unreachable { reason: "timeout".into() });
        AuditReport { summary, complete, workers: Vec::new() }
    }

    #[test]
    fn test_text_lists_breakdowns() {
        let text = render_text("shuttle-5.estuary.tech", &report(true));
        assert!(text.contains("total:       5"));
        assert!(text.contains("available:   2"));
        assert!(text.contains("unavailable: 2"));
        assert!(text.contains("    404: 2"));
        assert!(text.contains("unreachable: 1"));
        assert!(text.contains("    timeout: 1"));
        assert!(!text.contains("run incomplete"));
    }

    #[test]
    fn test_text_flags_incomplete_run() {
        let text = render_text("s", &report(false));
        assert!(text.contains("completed:   5 (run incomplete)"));
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&render_json("s", &report(true)).unwrap()).unwrap();
        assert_eq!(json["complete"], true);
        assert_eq!(json["summary"]["totalItems"], 5);
        assert_eq!(json["summary"]["available"], 2);
        assert_eq!(json["summary"]["unavailable"]["404"], 2);
        assert_eq!(json["summary"]["unreachable"]["timeout"], 1);
    }
}
