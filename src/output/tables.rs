use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Cell for a build status, colored by how good the news is.
pub fn status_cell(status: Option<&str>) -> Cell {
    match status {
        Some("SUCCESS") => Cell::new("SUCCESS").fg(TableColor::Green),
        Some("FAILURE") => Cell::new("FAILURE").fg(TableColor::Red),
        Some(other) => Cell::new(other).fg(TableColor::Yellow),
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}

/// Cell for a build duration given in milliseconds.
pub fn duration_cell(millis: Option<u64>) -> Cell {
    match millis {
        Some(millis) => {
            let minutes = millis as f64 / 60_000.0;
            Cell::new(format!("{minutes:.1}min"))
        }
        None => Cell::new("-").fg(TableColor::DarkGrey),
    }
}
