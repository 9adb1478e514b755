//! Human-readable summaries.

use colored::{ColoredString, Colorize};
use dcintel_core::{Metric, RecommendationEntry, ToolId};
use dcintel_planner::AnalysisReport;

fn score_cell(metric: Metric) -> ColoredString {
    let text = format!("{:>8}", metric.to_string());
    match metric.value() {
        Some(v) if v >= 70.0 => text.green(),
        Some(v) if v >= 40.0 => text.yellow(),
        Some(_) => text.red(),
        None => text.dimmed(),
    }
}

fn flags(entry: &RecommendationEntry) -> String {
    let mut out = Vec::new();
    if entry.narrative_flags.high_risk {
        out.push("high-risk".red().to_string());
    }
    if entry.narrative_flags.incomplete_data {
        // Axes when any are missing, else the domains that never answered.
        let mut missing: Vec<String> = entry.missing_axes.iter().map(|a| a.to_string()).collect();
        if missing.is_empty() {
            missing = entry.unavailable_domains.iter().map(|d| d.to_string()).collect();
        }
        let text = if missing.is_empty() {
            "incomplete".to_string()
        } else {
            format!("incomplete ({})", missing.join(", "))
        };
        out.push(text.yellow().to_string());
    }
    out.join(" ")
}

pub fn print_report(report: &AnalysisReport) {
    println!(
        "{} {}  tier={:?}  calls {}/{} ok",
        "run".bold(),
        report.run_id,
        report.tier,
        report.successful_calls,
        report.planned_calls
    );
    if report.timed_out {
        println!(
            "{} session deadline reached, {} calls abandoned",
            "warning:".yellow().bold(),
            report.abandoned_calls
        );
    }
    println!();
    println!(
        "{:>4}  {:<7} {:>8} {:>8} {:>8} {:>9}  {}",
        "rank".bold(),
        "country".bold(),
        "score".bold(),
        "irr %".bold(),
        "adj %".bold(),
        "mw".bold(),
        "flags".bold()
    );
    for entry in &report.recommendation.entries {
        println!(
            "{:>4}  {:<7} {} {:>8} {:>8} {:>9}  {}",
            entry.rank,
            entry.entity_key.bold(),
            score_cell(entry.overall_score),
            entry.total_irr_estimate.to_string(),
            entry.risk_adjusted_return.to_string(),
            entry.capacity_mw.to_string(),
            flags(entry)
        );
        if !entry.narrative_flags.risks.is_empty() {
            let risks: Vec<&str> = entry.narrative_flags.risks.iter().map(|a| a.as_str()).collect();
            let upside: Vec<&str> = entry
                .narrative_flags
                .opportunities
                .iter()
                .map(|a| a.as_str())
                .collect();
            println!(
                "{:>14} {}  {} {}",
                "risks:".dimmed(),
                risks.join(", "),
                "strengths:".dimmed(),
                upside.join(", ")
            );
        }
    }
    if !report.excluded.is_empty() {
        println!();
        println!(
            "{} {}",
            "excluded (no usable data):".yellow(),
            report.excluded.join(", ")
        );
    }
}

pub fn print_catalog() {
    for tool in ToolId::ALL {
        let domain = tool
            .domain()
            .map(|d| format!("[{d}]"))
            .unwrap_or_default();
        println!(
            "{} {} {}",
            tool.name().bold(),
            tool.path_template().dimmed(),
            domain.cyan()
        );
        println!("    {}", tool.description());
        for spec in tool.params() {
            let mut line = format!("{} ({})", spec.name, spec.kind.name());
            if spec.required {
                line.push_str(" required");
            }
            if let Some((lo, hi)) = spec.range {
                line.push_str(&format!(" in {lo}..={hi}"));
            }
            if let Some((lo, hi)) = spec.clamp {
                line.push_str(&format!(" clamped {lo}..={hi}"));
            }
            if let Some(default) = spec.default {
                line.push_str(&format!(" default {default}"));
            }
            println!("      {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcintel_core::{Domain, NarrativeFlags, RiskAxis};

    #[test]
    fn flags_list_missing_axes() {
        let entry = RecommendationEntry {
            rank: 1,
            entity_key: "DE".into(),
            overall_score: Metric::Value(62.0),
            total_irr_estimate: Metric::Value(8.0),
            risk_adjusted_return: Metric::Value(6.1),
            capacity_mw: Metric::Unavailable,
            narrative_flags: NarrativeFlags {
                incomplete_data: true,
                ..NarrativeFlags::default()
            },
            missing_axes: [RiskAxis::WaterStress].into(),
            unavailable_domains: Default::default(),
        };
        colored::control::set_override(false);
        assert_eq!(flags(&entry), "incomplete (water_stress)");

        let entry = RecommendationEntry {
            missing_axes: Default::default(),
            unavailable_domains: [Domain::MarketReport].into(),
            ..entry
        };
        assert_eq!(flags(&entry), "incomplete (market-report)");
    }
}
