//! Completeness check and integer quantization of the merged table.

use super::table::FrozenTable;
use super::types::{ColumnKey, Metric, PlantKey};
use crate::error::IncompleteResult;

/// Table with every cell present and rounded to an integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedTable {
    index: Vec<String>,
    columns: Vec<ColumnKey>,
    cells: Vec<Vec<i64>>,
}

impl QuantizedTable {
    pub fn index(&self) -> &[String] {
        &self.index
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn column(&self, metric: Metric, plant: &PlantKey) -> Option<&[i64]> {
        self.columns
            .iter()
            .position(|k| k.metric == metric && &k.plant == plant)
            .map(|i| self.cells[i].as_slice())
    }

    /// Cells of one index row, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<i64>> {
        (row < self.index.len()).then(|| self.cells.iter().map(|c| c[row]).collect())
    }
}

/// Rounds half to even and converts to an integer.
///
/// `0.5 → 0`, `1.5 → 2`, `2.5 → 2`, `-0.5 → 0`, `-1.5 → -2`.
pub fn quantize(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Checks that every column was written and has no empty cell, then rounds.
///
/// # Errors
///
/// Returns [`IncompleteResult`] listing each incomplete column together with
/// a text dump of `table`. Empty cells are never replaced by zero.
pub fn validate_and_quantize(table: &FrozenTable) -> Result<QuantizedTable, IncompleteResult> {
    let incomplete: Vec<String> = table
        .iter_columns()
        .filter(|(_, written, cells)| !written || cells.iter().any(Option::is_none))
        .map(|(key, _, _)| key.to_string())
        .collect();

    if !incomplete.is_empty() {
        tracing::warn!(columns = ?incomplete, "result table has missing values");
        return Err(IncompleteResult {
            columns: incomplete,
            table: table.render(),
        });
    }

    let (columns, cells): (Vec<ColumnKey>, Vec<Vec<i64>>) = table
        .iter_columns()
        .map(|(key, _, cells)| {
            let quantized: Vec<i64> = cells.iter().flatten().copied().map(quantize).collect();
            (key.clone(), quantized)
        })
        .unzip();

    Ok(QuantizedTable {
        index: table.index().to_vec(),
        columns,
        cells,
    })
}
