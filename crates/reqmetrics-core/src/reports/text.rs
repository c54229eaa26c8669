use std::fmt::Write;

use crate::registry::MetricsData;

/// Render a snapshot as an indented, human-readable listing.
pub fn text_report(data: &MetricsData) -> String {
    let mut out = String::new();
    render_context(data, &data.context, &mut out);
    out
}

fn render_context(data: &MetricsData, path: &str, out: &mut String) {
    if !data.is_empty() {
        let _ = writeln!(out, "# {}", path);
    }

    if !data.counters.is_empty() {
        let _ = writeln!(out, "\n## Counters");
        for c in &data.counters {
            let _ = writeln!(out, "    {} = {} {}", c.name, c.value.count, c.value.unit);
        }
    }

    if !data.meters.is_empty() {
        let _ = writeln!(out, "\n## Meters");
        for m in &data.meters {
            let v = &m.value;
            let _ = writeln!(out, "    {}", m.name);
            let _ = writeln!(out, "        Count = {} {}", v.count, v.unit);
            let _ = writeln!(out, "    Mean Rate = {:.2} {}/{}", v.mean_rate, v.unit, v.rate_unit.suffix());
        }
    }

    if !data.histograms.is_empty() {
        let _ = writeln!(out, "\n## Histograms");
        for h in &data.histograms {
            let v = &h.value;
            let _ = writeln!(out, "    {}", h.name);
            let _ = writeln!(out, "        Count = {} {}", v.count, v.unit);
            let _ = writeln!(out, "         Last = {:.2} {}", v.last, v.unit);
            let _ = writeln!(out, "          Min = {:.2} {}", v.min, v.unit);
            let _ = writeln!(out, "          Max = {:.2} {}", v.max, v.unit);
            let _ = writeln!(out, "         Mean = {:.2} {}", v.mean, v.unit);
        }
    }

    if !data.timers.is_empty() {
        let _ = writeln!(out, "\n## Timers");
        for t in &data.timers {
            let v = &t.value;
            let d = v.duration_unit.suffix();
            let _ = writeln!(out, "    {}", t.name);
            let _ = writeln!(out, "        Count = {} {}", v.rate.count, v.rate.unit);
            let _ = writeln!(
                out,
                "    Mean Rate = {:.2} {}/{}",
                v.rate.mean_rate,
                v.rate.unit,
                v.rate.rate_unit.suffix()
            );
            let _ = writeln!(out, "         Last = {:.2} {}", v.histogram.last, d);
            let _ = writeln!(out, "          Min = {:.2} {}", v.histogram.min, d);
            let _ = writeln!(out, "          Max = {:.2} {}", v.histogram.max, d);
            let _ = writeln!(out, "         Mean = {:.2} {}", v.histogram.mean, d);
        }
    }

    for child in &data.child_contexts {
        if !out.is_empty() {
            out.push('\n');
        }
        render_context(child, &format!("{} / {}", path, child.context), out);
    }
}
