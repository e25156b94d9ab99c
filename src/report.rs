use std::fmt::Write;
use std::path::PathBuf;

use chrono::NaiveDateTime;

use crate::models::{AnalysisResult, CategoryShift, ClassroomAggregate, DescriptiveStats, Group, TicketRecord};

const RULE_WIDTH: usize = 60;

/// Multi-line verdict: banner by significance, then the per-group comparison.
pub fn generate_conclusion(result: &AnalysisResult) -> String {
    let desc = &result.descriptive_stats;
    let ttest = &result.ttest;
    let rule = "=".repeat(RULE_WIDTH);

    let mut output = String::new();
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output, "A/B TEST RESULTS");
    let _ = writeln!(output, "{rule}");
    let _ = writeln!(output);

    if ttest.significant {
        let _ = writeln!(output, "SIGNIFICANT: the new instructions changed ticket volume");
        let _ = writeln!(output, "   Ticket change: {:.1}%", desc.effect.relative_diff);
        let _ = writeln!(
            output,
            "   p-value: {:.4} (two-sided test, statistically significant)",
            ttest.p_value
        );
    } else {
        let _ = writeln!(output, "NOT SIGNIFICANT: no statistically significant effect");
        let _ = writeln!(output, "   p-value: {:.4}", ttest.p_value);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "GROUP COMPARISON:");
    let _ = writeln!(output, "   {}", group_line("Group A", &desc.group_a));
    let _ = writeln!(output, "   {}", group_line("Group B", &desc.group_b));
    let _ = writeln!(output);
    let _ = write!(output, "{rule}");

    output
}

fn group_line(name: &str, stats: &DescriptiveStats) -> String {
    format!(
        "{name}: {:.1} ± {:.1} tickets (n={})",
        stats.mean, stats.std, stats.size
    )
}

/// Test statistics echoed to the console right after the analysis.
pub fn test_statistics_lines(result: &AnalysisResult) -> Vec<String> {
    vec![
        format!("t-statistic: {:.4}", result.ttest.t_statistic),
        format!("p-value: {:.4}", result.ttest.p_value),
        format!("Statistically significant: {}", result.ttest.significant),
    ]
}

/// Operational profile of each group: volume, resolution speed, criticality.
pub fn group_profile_lines(classrooms: &[ClassroomAggregate]) -> Vec<String> {
    [Group::A, Group::B]
        .into_iter()
        .map(|group| {
            let rooms: Vec<&ClassroomAggregate> =
                classrooms.iter().filter(|c| c.group == group).collect();
            let tickets: usize = rooms.iter().map(|c| c.ticket_count).sum();
            let critical: usize = rooms.iter().map(|c| c.critical_tickets).sum();
            let times: Vec<f64> = rooms.iter().filter_map(|c| c.avg_resolution_time).collect();
            let resolution_rate = if rooms.is_empty() {
                0.0
            } else {
                rooms.iter().map(|c| c.resolution_rate).sum::<f64>() / rooms.len() as f64
            };
            let avg_time = if times.is_empty() {
                "n/a".to_string()
            } else {
                format!("{:.1} h", times.iter().sum::<f64>() / times.len() as f64)
            };
            format!(
                "Group {}: {} tickets in {} classrooms, avg resolution {avg_time}, {critical} critical, {:.0}% resolved",
                group.label(),
                tickets,
                rooms.len(),
                resolution_rate * 100.0
            )
        })
        .collect()
}

/// First and last ticket creation time, when any were parsed.
pub fn test_period(tickets: &[TicketRecord]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let mut created = tickets.iter().filter_map(|t| t.created_at);
    let first = created.next()?;
    Some(created.fold((first, first), |(lo, hi), at| (lo.min(at), hi.max(at))))
}

/// Largest decreases and increases, at most `per_side` of each, for the dashboard.
pub fn top_category_changes(categories: &[CategoryShift], per_side: usize) -> Vec<&CategoryShift> {
    let mut with_pct: Vec<&CategoryShift> = categories
        .iter()
        .filter(|c| c.change_percent.is_some())
        .collect();
    with_pct.sort_by(|a, b| {
        let pct = |c: &CategoryShift| c.change_percent.unwrap_or(0.0);
        pct(a).total_cmp(&pct(b))
    });

    let head = per_side.min(with_pct.len());
    let tail = with_pct.len().saturating_sub(per_side).max(head);
    with_pct[..head]
        .iter()
        .chain(&with_pct[tail..])
        .copied()
        .collect()
}

/// End-of-run console summary: the conclusion, then every artifact written.
pub fn build_summary(result: &AnalysisResult, artifacts: &[PathBuf]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", result.conclusion);
    if !artifacts.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "Created files:");
        for path in artifacts {
            let _ = writeln!(output, "  - {}", path.display());
        }
    }
    output
}

/// Plain-text dump written when the JSON document cannot be saved.
pub fn build_backup(result: &AnalysisResult, generated_at: NaiveDateTime) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "=== A/B TEST RESULTS ===");
    let _ = writeln!(output, "Date: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(output);
    let _ = writeln!(output, "{result:#?}");
    output
}
