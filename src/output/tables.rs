use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::clustering::FailureCluster;

use super::styling::{bright_red, cyan, dim};

fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn print_clusters(clusters: &[FailureCluster]) {
    println!("{}", render_clusters(clusters));
}

/// Renders ranked failure clusters: a summary table followed by one
/// detail block per cluster, most-impactful first.
pub fn render_clusters(clusters: &[FailureCluster]) -> String {
    if clusters.is_empty() {
        return "No failures to cluster.\n".to_string();
    }

    let mut output = String::new();

    let mut table = create_table();
    table.set_header(vec![
        Cell::new("#").fg(TableColor::Cyan),
        Cell::new("Failure").fg(TableColor::Cyan),
        Cell::new("Type").fg(TableColor::Cyan),
        Cell::new("Count").fg(TableColor::Cyan),
        Cell::new("Machines").fg(TableColor::Cyan),
    ]);

    for (idx, cluster) in clusters.iter().enumerate() {
        table.add_row(vec![
            Cell::new(idx + 1),
            Cell::new(truncate(&cluster.reason_key, 72)),
            Cell::new(cluster.kind),
            Cell::new(cluster.deduped_entries.len()),
            Cell::new(cluster.machines.len()),
        ]);
    }
    output.push_str(&format!("{table}\n\n"));

    for cluster in clusters {
        output.push_str(&format!("{}\n", bright_red(&cluster.reason_key)));
        output.push_str(&format!(
            "  {} {}   {} {}\n",
            dim("type:"),
            cluster.kind,
            dim("count:"),
            cluster.deduped_entries.len()
        ));
        output.push_str(&format!(
            "  {} {}\n",
            dim("sources:"),
            cluster.source_labels().join(", ")
        ));
        output.push_str(&format!(
            "  {} {}\n",
            dim("machines:"),
            cluster.machines.join(", ")
        ));
        if let Some(first) = cluster.first_seen() {
            output.push_str(&format!("  {} {}\n", dim("first ci:"), cyan(first)));
        }
        if let Some(last) = cluster.last_seen() {
            output.push_str(&format!("  {} {}\n", dim("last ci:"), cyan(last)));
        }
        output.push('\n');
    }

    output
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
