use std::path::Path;

use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::models::{HostOutcome, UploadStatus};

/// Render a colored terminal report of the upload run.
pub fn render(
    outcomes: &[HostOutcome],
    appliance: &str,
    license: &Path,
    verbose: bool,
    quiet: bool,
) -> Result<()> {
    let total = outcomes.len();
    let accepted_count = outcomes.iter().filter(|o| o.upload.is_accepted()).count();
    let rejected_count = total - accepted_count;

    if quiet {
        println!(
            "Total: {}  Accepted: {}  Rejected: {}",
            total,
            accepted_count.to_string().green(),
            rejected_count.to_string().red(),
        );
        return Ok(());
    }

    println!(
        "\n {} v{}",
        "license-pushr".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Appliance: {}", appliance);
    println!(" License:   {}\n", license.display());

    // Summary box
    let rejected_statuses = summarize_rejections(outcomes);

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(" │  {:<48} │", format!("Hosts licensed     : {}", total));
    println!(
        " │  {:<48} │",
        format!("{}  Accepted        : {:>4}", "✓".green(), accepted_count)
    );
    println!(
        " │  {:<48} │",
        format!(
            "{}  Rejected        : {:>4}  {}",
            "✗".red(),
            rejected_count,
            rejected_statuses
        )
    );
    println!(" └────────────────────────────────────────────────────┘\n");

    // Rejection table
    if rejected_count > 0 {
        println!(
            " {} Hosts that rejected the license:\n",
            "[REJECTED]".red().bold()
        );
        render_table(outcomes, false);
        println!();
    }

    // Verbose: show the accepting hosts too
    if verbose && accepted_count > 0 {
        println!(
            " {} Hosts that accepted the license:\n",
            "[ACCEPTED]".green().bold()
        );
        render_table(outcomes, true);
        println!();
    }

    Ok(())
}

fn render_table(outcomes: &[HostOutcome], accepted: bool) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Host ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Result").add_attribute(Attribute::Bold),
        ]);

    for outcome in outcomes
        .iter()
        .filter(|o| o.upload.is_accepted() == accepted)
    {
        let (result_str, result_color) = match &outcome.upload {
            UploadStatus::Accepted => ("✓ accepted".to_string(), Color::Green),
            UploadStatus::Rejected { status } => {
                (format!("✗ rejected (HTTP {})", status), Color::Red)
            }
        };

        table.add_row(vec![
            Cell::new(&outcome.id),
            Cell::new(&outcome.name),
            Cell::new(result_str)
                .fg(result_color)
                .set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}

/// Most frequent rejection statuses, e.g. `[HTTP 500 (2), HTTP 409 (1)]`.
fn summarize_rejections(outcomes: &[HostOutcome]) -> String {
    let mut counts: std::collections::HashMap<u16, usize> = std::collections::HashMap::new();
    for outcome in outcomes {
        if let UploadStatus::Rejected { status } = outcome.upload {
            *counts.entry(status).or_insert(0) += 1;
        }
    }

    let mut pairs: Vec<(u16, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(status, cnt)| format!("HTTP {} ({})", status, cnt))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
