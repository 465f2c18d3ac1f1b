use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use hv_data::{ColumnLayout, StructuralClass};
use hv_views::Dashboard;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

fn score(value: Option<f64>) -> Cell {
    let text = value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
    Cell::new(text).set_alignment(CellAlignment::Right)
}

pub fn print_summary(dashboard: &Dashboard) {
    let (Some(store), Some(aggregation)) = (dashboard.store(), dashboard.aggregation()) else {
        return;
    };
    println!("\nRows:       {}", store.len());
    println!("Uniques:    {}", aggregation.uniques.len());
    println!("Duplicated: {}", aggregation.duplicates.len());
    println!("Libraries:  {}", store.libraries().join(", "));
    println!(
        "Axes:       x = {}, y = {}",
        dashboard.x_metric().map(ColumnLayout::metric_name).unwrap_or("-"),
        dashboard.y_metric().map(ColumnLayout::metric_name).unwrap_or("-"),
    );
    println!("Filter:     {}", dashboard.filter());
}

/// Top entries of every library, best first
pub fn print_tops(dashboard: &Dashboard) {
    let Some(aggregation) = dashboard.aggregation() else {
        return;
    };
    let x = dashboard.x_metric().unwrap_or_default();
    let y = dashboard.y_metric().unwrap_or_default();

    let mut table = table(&[
        "Library",
        "#",
        "Compound",
        "Class",
        ColumnLayout::metric_name(x),
        ColumnLayout::metric_name(y),
        "Copies",
        "Visible",
        "Hit",
    ]);
    for (library, entries) in &aggregation.tops {
        if entries.is_empty() {
            table.add_row(vec![Cell::new(library), Cell::new("-").fg(Color::DarkGrey)]);
            continue;
        }
        for (rank, entry) in entries.iter().enumerate() {
            let row = &entry.unique.row;
            table.add_row(vec![
                Cell::new(library),
                Cell::new(rank + 1),
                Cell::new(entry.unique.title()),
                Cell::new(row.class().map_or("-", StructuralClass::trace_name)),
                score(row.metric(x)),
                score(row.metric(y)),
                Cell::new(entry.unique.copies),
                Cell::new(if entry.visible { "yes" } else { "" }),
                Cell::new(if dashboard.selection().is_hit(entry.key()) { "✓" } else { "" }),
            ]);
        }
    }
    println!("\nTop hits");
    println!("{table}");
}

/// Groups encoded by more than one row
pub fn print_duplicates(dashboard: &Dashboard) {
    let Some(aggregation) = dashboard.aggregation() else {
        return;
    };
    if aggregation.duplicates.is_empty() {
        println!("\nNo duplicate encodings");
        return;
    }

    let mut table = table(&["Key", "Library", "Copies", "Rows", "Kept"]);
    for (key, indices) in &aggregation.duplicates {
        let Some(unique) = aggregation.unique(key) else {
            continue;
        };
        let rows: Vec<String> = indices.iter().map(usize::to_string).collect();
        table.add_row(vec![
            Cell::new(key),
            Cell::new(unique.library()),
            Cell::new(indices.len()),
            Cell::new(rows.join(", ")),
            Cell::new(unique.row.index),
        ]);
    }
    println!("\nDuplicate encodings");
    println!("{table}");
}

/// Cards anchored on the single-library chart
pub fn print_cards(dashboard: &Dashboard) {
    let overlays = dashboard.overlays();
    if overlays.keys().is_empty() {
        println!("\nNo cards on screen");
        return;
    }

    let mut table = table(&["Card", "Anchor", "Position", "Details"]);
    for key in overlays.keys() {
        let Some(overlay) = overlays.get(&key) else {
            continue;
        };
        let details: Vec<String> = overlay
            .content
            .lines
            .iter()
            .map(|line| format!("{}: {}", line.label, line.value))
            .collect();
        table.add_row(vec![
            Cell::new(&overlay.content.title),
            Cell::new(format!("({:.0}, {:.0})", overlay.anchor.x, overlay.anchor.y)),
            Cell::new(format!("({:.0}, {:.0})", overlay.rect.min.x, overlay.rect.min.y)),
            Cell::new(details.join("\n")),
        ]);
    }
    println!("\nCards");
    println!("{table}");
}
