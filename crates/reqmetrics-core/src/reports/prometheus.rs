//! Prometheus text exposition (version 0.0.4).
//!
//! Instrument names are free text (per-route timers look like
//! `GET /users/:id`), so they travel as the `name` label. Families are named
//! after the context path and instrument kind.

use std::fmt::Write;

use crate::registry::MetricsData;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

/// Lower-case and replace everything outside `[a-z0-9_]` with `_`.
fn sanitize(v: &str) -> String {
    let mut out: String = v
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

pub fn prometheus_report(data: &MetricsData) -> String {
    let mut out = String::new();
    render(data, &sanitize(&data.context), &mut out);
    out
}

fn render(data: &MetricsData, prefix: &str, out: &mut String) {
    if !data.counters.is_empty() {
        let family = format!("{prefix}_counter");
        let _ = writeln!(out, "# TYPE {} gauge", family);
        for c in &data.counters {
            let _ = writeln!(out, "{}{{name=\"{}\"}} {}", family, escape_label(&c.name), c.value.count);
        }
    }

    if !data.meters.is_empty() {
        let total = format!("{prefix}_meter_total");
        let _ = writeln!(out, "# TYPE {} counter", total);
        for m in &data.meters {
            let _ = writeln!(out, "{}{{name=\"{}\"}} {}", total, escape_label(&m.name), m.value.count);
        }
        let rate = format!("{prefix}_meter_mean_rate");
        let _ = writeln!(out, "# TYPE {} gauge", rate);
        for m in &data.meters {
            let _ = writeln!(out, "{}{{name=\"{}\"}} {}", rate, escape_label(&m.name), m.value.mean_rate);
        }
    }

    if !data.histograms.is_empty() {
        let family = format!("{prefix}_histogram");
        let _ = writeln!(out, "# TYPE {} summary", family);
        for h in &data.histograms {
            let label = escape_label(&h.name);
            let v = &h.value;
            let _ = writeln!(out, "{}_count{{name=\"{}\"}} {}", family, label, v.count);
            let _ = writeln!(out, "{}_sum{{name=\"{}\"}} {}", family, label, v.sum);
            let _ = writeln!(out, "{}_min{{name=\"{}\"}} {}", family, label, v.min);
            let _ = writeln!(out, "{}_max{{name=\"{}\"}} {}", family, label, v.max);
        }
    }

    // Timers sharing a duration unit share one family; emit its TYPE once.
    let mut timers: Vec<_> = data.timers.iter().collect();
    timers.sort_by_key(|t| t.value.duration_unit.suffix());
    let mut current: Option<String> = None;
    for t in timers {
        let v = &t.value;
        let family = format!("{prefix}_timer_{}", v.duration_unit.suffix());
        if current.as_deref() != Some(family.as_str()) {
            let _ = writeln!(out, "# TYPE {} summary", family);
            current = Some(family.clone());
        }
        let label = escape_label(&t.name);
        let _ = writeln!(out, "{}_count{{name=\"{}\"}} {}", family, label, v.histogram.count);
        let _ = writeln!(out, "{}_sum{{name=\"{}\"}} {}", family, label, v.histogram.sum);
        let _ = writeln!(out, "{}_min{{name=\"{}\"}} {}", family, label, v.histogram.min);
        let _ = writeln!(out, "{}_max{{name=\"{}\"}} {}", family, label, v.histogram.max);
    }

    for child in &data.child_contexts {
        render(child, &format!("{}_{}", prefix, sanitize(&child.context)), out);
    }
}
