use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows parsed out of one results region.
///
/// Rows are positional: column index maps to cell text, with no semantic
/// meaning attached; the caller decides what each position means. Row order
/// is the document order and encodes statement line-item ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub rows: Vec<Vec<String>>,
    pub table_found: bool,
}

impl ExtractionResult {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// A cell value carried down from a rowspan in an earlier row.
struct Carry {
    text: String,
    remaining: u32,
}

/// Parse the markup of a results region into positional rows.
///
/// Walks row elements in document order and cell elements within each row in
/// order. Spanning cells repeat their value at every covered column position
/// so column alignment is preserved; empty cells stay as empty strings. Zero
/// row elements is a valid outcome (`table_found = false`), not an error.
pub fn extract_region(markup: &str) -> ExtractionResult {
    let document = Html::parse_fragment(markup);
    let row_selector = Selector::parse("tr").expect("static selector");

    let mut pending: BTreeMap<usize, Carry> = BTreeMap::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for row in document.select(&row_selector) {
        let mut cells: Vec<String> = Vec::new();
        let mut col = 0usize;

        for cell in row.children().filter_map(ElementRef::wrap).filter(is_cell) {
            fill_carried(&mut pending, &mut cells, &mut col);

            let text = cell_text(&cell);
            let colspan = span(&cell, "colspan");
            let rowspan = span(&cell, "rowspan");

            for _ in 0..colspan {
                if rowspan > 1 {
                    pending.insert(
                        col,
                        Carry {
                            text: text.clone(),
                            remaining: rowspan - 1,
                        },
                    );
                }
                cells.push(text.clone());
                col += 1;
            }
        }

        fill_carried(&mut pending, &mut cells, &mut col);

        if !cells.is_empty() {
            rows.push(cells);
        }
    }

    let table_found = !rows.is_empty();
    if !table_found {
        tracing::debug!("results region contains no table rows");
    }

    ExtractionResult { rows, table_found }
}

/// Consume carried rowspan values at contiguous column positions.
fn fill_carried(pending: &mut BTreeMap<usize, Carry>, cells: &mut Vec<String>, col: &mut usize) {
    while let Some(carry) = pending.get_mut(col) {
        cells.push(carry.text.clone());
        carry.remaining -= 1;
        if carry.remaining == 0 {
            pending.remove(col);
        }
        *col += 1;
    }
}

fn is_cell(element: &ElementRef) -> bool {
    matches!(element.value().name(), "td" | "th")
}

/// Whitespace-normalized visible text of a cell; empty cells yield "".
fn cell_text(cell: &ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn span(cell: &ElementRef, attr: &str) -> u32 {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_grid_preserves_order_and_positions() {
        let html = "<table>\
            <tr><td>Pos</td><td>31-12-2024</td><td>31-12-2023</td></tr>\
            <tr><td>Kas</td><td>1.204</td><td>988</td></tr>\
            <tr><td>Kredit</td><td>55.910</td><td>51.002</td></tr>\
            </table>";

        let result = extract_region(html);
        assert!(result.table_found);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0], vec!["Pos", "31-12-2024", "31-12-2023"]);
        assert_eq!(result.rows[2], vec!["Kredit", "55.910", "51.002"]);
    }

    #[test]
    fn test_colspan_repeats_value_across_covered_columns() {
        // 3x4 grid; row 2 spans columns 2-3.
        let html = "<table>\
            <tr><td>a</td><td>b</td><td>c</td><td>d</td></tr>\
            <tr><td>e</td><td colspan=\"2\">wide</td><td>f</td></tr>\
            <tr><td>g</td><td>h</td><td>i</td><td>j</td></tr>\
            </table>";

        let result = extract_region(html);
        assert_eq!(result.rows[1], vec!["e", "wide", "wide", "f"]);
        assert_eq!(result.rows[1].len(), 4);
    }

    #[test]
    fn test_rowspan_carries_value_down_in_place() {
        let html = "<table>\
            <tr><td rowspan=\"2\">Aset</td><td>Kas</td><td>10</td></tr>\
            <tr><td>Giro</td><td>20</td></tr>\
            </table>";

        let result = extract_region(html);
        assert_eq!(result.rows[0], vec!["Aset", "Kas", "10"]);
        assert_eq!(result.rows[1], vec!["Aset", "Giro", "20"]);
    }

    #[test]
    fn test_empty_cells_kept_to_preserve_alignment() {
        let html = "<table>\
            <tr><td>Total</td><td></td><td>42</td></tr>\
            </table>";

        let result = extract_region(html);
        assert_eq!(result.rows[0], vec!["Total", "", "42"]);
    }

    #[test]
    fn test_zero_rows_is_not_an_error() {
        let result = extract_region("<div class=\"grid\"></div>");
        assert!(!result.table_found);
        assert!(result.rows.is_empty());
    }

    #[test]
    fn test_header_cells_are_positional_like_any_other() {
        let html = "<table>\
            <tr><th>Pos</th><th>Nilai</th></tr>\
            <tr><td>Kas</td><td>7</td></tr>\
            </table>";

        let result = extract_region(html);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0], vec!["Pos", "Nilai"]);
    }

    #[test]
    fn test_nested_markup_inside_cell_flattens_to_text() {
        let html = "<table>\
            <tr><td><span>PT </span><b>BPR Contoh</b></td><td>1 234</td></tr>\
            </table>";

        let result = extract_region(html);
        assert_eq!(result.rows[0], vec!["PT BPR Contoh", "1 234"]);
    }
}
