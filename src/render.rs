use crate::scale::Scale;
use crate::types::{InventoryItem, ResultSet, SolutionRecord};

pub const NO_SOLUTION: &str = "No solution found.";

/// Two-column table of the pipes a search was run against.
pub fn render_inventory(scale: Scale, items: &[InventoryItem]) -> String {
    let rows: Vec<(String, String)> = items
        .iter()
        .map(|item| (scale.format_real(item.length), item.stock.to_string()))
        .collect();

    let header = ("Pipe Length", "Number of Pipes");
    let len_w = rows
        .iter()
        .map(|(l, _)| l.len())
        .chain([header.0.len()])
        .max()
        .unwrap_or(0);

    let mut out = String::from("Available Pipes:\n");
    out.push_str(&format!("  {:<len_w$}  {}\n", header.0, header.1));
    for (length, count) in rows {
        out.push_str(&format!("  {length:>len_w$}  {count}\n"));
    }
    out
}

pub fn render_solution(index: usize, record: &SolutionRecord) -> String {
    let scale = record.scale();
    let mut out = format!("Solution {}:\n", index + 1);
    for (&units, count) in record.counts().iter().rev() {
        out.push_str(&format!(
            "  Pipe Length: {} x {}\n",
            scale.format_units(units),
            count
        ));
    }
    out.push_str(&format!(
        "  Total Length: {}\n",
        scale.format_units(record.total_units())
    ));
    out.push_str(&format!(
        "  Deviation from Desired Length: {} ({})\n",
        scale.format_units(record.abs_deviation_units()),
        record.direction()
    ));
    out
}

pub fn render_solutions(result: &ResultSet) -> String {
    if result.is_empty() {
        return format!("{NO_SOLUTION}\n");
    }
    result
        .iter()
        .enumerate()
        .map(|(i, r)| render_solution(i, r))
        .collect::<Vec<_>>()
        .join("\n")
}
