//! Multi-series table keyed by `(metric, plant)`.
//!
//! The column set is fixed up front from the resolved plant names, so the
//! response shape never depends on which plants succeeded. Cells start out
//! empty and are filled by aligning labelled series to the shared index.

use std::collections::HashMap;
use std::fmt::Write as _;

use super::types::{ColumnKey, Metric, PlantKey};
use crate::error::TableError;
use crate::plant::types::Series;

/// Metrics written per plant, in schema order.
pub const PLANT_METRICS: [Metric; 3] = [Metric::Watt, Metric::WattHours, Metric::WattHoursCumsum];

/// Metrics aggregated into `Total` columns, in schema order.
pub const TOTAL_METRICS: [Metric; 3] = [Metric::WattHours, Metric::WattHoursCumsum, Metric::Watt];

#[derive(Debug, Clone, PartialEq)]
struct Column {
    key: ColumnKey,
    written: bool,
    cells: Vec<Option<f64>>,
}

/// Table under construction.
#[derive(Debug, Clone)]
pub struct MultiSeriesTable {
    index: Vec<String>,
    rows: HashMap<String, usize>,
    columns: Vec<Column>,
}

impl MultiSeriesTable {
    /// Column schema for the given plants.
    ///
    /// Plant columns come metric by metric (`watt`, `watt_hours`,
    /// `watt_hours_cumsum`), each listing plants in the given order. With
    /// `all_mode` the `Total` columns follow as `watt_hours`,
    /// `watt_hours_cumsum`, `watt`.
    pub fn schema(plants: &[String], all_mode: bool) -> Vec<ColumnKey> {
        let mut schema: Vec<ColumnKey> = PLANT_METRICS
            .iter()
            .flat_map(|&metric| {
                plants
                    .iter()
                    .map(move |p| ColumnKey::new(metric, PlantKey::named(p.as_str())))
            })
            .collect();
        if all_mode {
            schema.extend(
                TOTAL_METRICS
                    .iter()
                    .map(|&metric| ColumnKey::new(metric, PlantKey::Total)),
            );
        }
        schema
    }

    /// Creates an empty table over `index` with a fixed column set.
    pub fn new(index: Vec<String>, schema: Vec<ColumnKey>) -> Self {
        let rows = index
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        let columns = schema
            .into_iter()
            .map(|key| Column {
                key,
                written: false,
                cells: vec![None; index.len()],
            })
            .collect();
        Self {
            index,
            rows,
            columns,
        }
    }

    /// Cells of one column, if it is part of the schema.
    pub fn column(&self, metric: Metric, plant: &PlantKey) -> Option<&[Option<f64>]> {
        self.position(metric, plant)
            .map(|i| self.columns[i].cells.as_slice())
    }

    pub fn is_written(&self, metric: Metric, plant: &PlantKey) -> bool {
        self.position(metric, plant)
            .is_some_and(|i| self.columns[i].written)
    }

    fn position(&self, metric: Metric, plant: &PlantKey) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.key.metric == metric && &c.key.plant == plant)
    }

    fn require(&self, metric: Metric, plant: &PlantKey) -> Result<usize, TableError> {
        self.position(metric, plant)
            .ok_or_else(|| TableError::UnknownColumn {
                metric: metric.to_string(),
                plant: plant.to_string(),
            })
    }

    /// Writes `series` into the `(metric, plant)` column, aligned by label.
    ///
    /// Labels missing from the series leave their cells empty, labels not in
    /// the index are ignored and non-finite values are stored as empty.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownColumn`] if the column is not in the schema.
    pub fn put(&mut self, metric: Metric, plant: &PlantKey, series: &Series) -> Result<(), TableError> {
        let col = self.require(metric, plant)?;
        let mut cells = vec![None; self.index.len()];
        for (label, value) in series.iter() {
            if let Some(&row) = self.rows.get(label) {
                cells[row] = value.is_finite().then_some(value);
            }
        }
        let column = &mut self.columns[col];
        column.cells = cells;
        column.written = true;
        Ok(())
    }

    /// Fills `watt_hours_cumsum/<plant>` with the running sum of `watt_hours/<plant>`.
    ///
    /// An empty energy cell empties the running sum from that row on. Does
    /// nothing while the energy column is unwritten.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownColumn`] if either column is not in the schema.
    pub fn compute_cumulative(&mut self, plant: &str) -> Result<(), TableError> {
        let key = PlantKey::named(plant);
        let src = self.require(Metric::WattHours, &key)?;
        let dst = self.require(Metric::WattHoursCumsum, &key)?;
        if !self.columns[src].written {
            return Ok(());
        }

        let mut acc = Some(0.0);
        let cumsum: Vec<Option<f64>> = self.columns[src]
            .cells
            .iter()
            .map(|cell| {
                acc = acc.zip(*cell).map(|(a, v)| a + v);
                acc
            })
            .collect();

        let column = &mut self.columns[dst];
        column.cells = cumsum;
        column.written = true;
        Ok(())
    }

    /// Fills `<metric>/Total` with the row-wise sum over written plant columns.
    ///
    /// Empty cells are skipped; a row with no values sums to zero. A `Total`
    /// column stays unwritten when no plant column of its metric was written.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::UnknownColumn`] if a `Total` column is not in the schema.
    pub fn aggregate_total(&mut self, metrics: &[Metric]) -> Result<(), TableError> {
        for &metric in metrics {
            let dst = self.require(metric, &PlantKey::Total)?;
            let sources: Vec<usize> = self
                .columns
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    c.written && c.key.metric == metric && matches!(c.key.plant, PlantKey::Named(_))
                })
                .map(|(i, _)| i)
                .collect();
            if sources.is_empty() {
                continue;
            }

            let totals: Vec<Option<f64>> = (0..self.index.len())
                .map(|row| {
                    Some(
                        sources
                            .iter()
                            .filter_map(|&i| self.columns[i].cells[row])
                            .sum(),
                    )
                })
                .collect();

            let column = &mut self.columns[dst];
            column.cells = totals;
            column.written = true;
        }
        Ok(())
    }

    /// Ends construction.
    pub fn freeze(self) -> FrozenTable {
        FrozenTable {
            index: self.index,
            columns: self.columns,
        }
    }
}

/// Read-only table after all plants and totals were merged.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenTable {
    index: Vec<String>,
    columns: Vec<Column>,
}

impl FrozenTable {
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// `(key, written, cells)` for every column in schema order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&ColumnKey, bool, &[Option<f64>])> {
        self.columns
            .iter()
            .map(|c| (&c.key, c.written, c.cells.as_slice()))
    }

    /// Fixed-width text dump, one row per index label. Empty cells print as `NaN`.
    pub fn render(&self) -> String {
        let headers: Vec<String> = self.columns.iter().map(|c| c.key.to_string()).collect();
        let label_width = self
            .index
            .iter()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("timestamp".len());

        let mut out = String::new();
        let _ = write!(out, "{:<label_width$}", "timestamp");
        for h in &headers {
            let _ = write!(out, "  {h:>w$}", w = h.len().max(12));
        }
        out.push('\n');

        for (row, label) in self.index.iter().enumerate() {
            let _ = write!(out, "{label:<label_width$}");
            for (col, h) in self.columns.iter().zip(&headers) {
                let cell = match col.cells.get(row).copied().flatten() {
                    Some(v) => format!("{v:.3}"),
                    None => "NaN".to_string(),
                };
                let _ = write!(out, "  {cell:>w$}", w = h.len().max(12));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t{i}")).collect()
    }

    fn series(values: &[f64]) -> Series {
        Series::new(labels(values.len()), values.to_vec())
    }

    fn plants(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn schema_order_all_mode() {
        let cols: Vec<String> = MultiSeriesTable::schema(&plants(&["A", "B"]), true)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            cols,
            vec![
                "watt/A",
                "watt/B",
                "watt_hours/A",
                "watt_hours/B",
                "watt_hours_cumsum/A",
                "watt_hours_cumsum/B",
                "watt_hours/Total",
                "watt_hours_cumsum/Total",
                "watt/Total",
            ]
        );
    }

    #[test]
    fn schema_single_mode_has_no_total() {
        let schema = MultiSeriesTable::schema(&plants(&["A"]), false);
        assert_eq!(schema.len(), 3);
        assert!(schema.iter().all(|k| k.plant != PlantKey::Total));
    }

    #[test]
    fn put_aligns_by_label_and_drops_non_finite() {
        let mut table = MultiSeriesTable::new(labels(3), MultiSeriesTable::schema(&plants(&["A"]), false));
        let s = Series::new(
            vec!["t2".into(), "t0".into(), "zz".into()],
            vec![f64::NAN, 5.0, 9.0],
        );
        table.put(Metric::Watt, &PlantKey::named("A"), &s).unwrap();
        assert_eq!(
            table.column(Metric::Watt, &PlantKey::named("A")),
            Some(&[Some(5.0), None, None][..])
        );
        assert!(table.is_written(Metric::Watt, &PlantKey::named("A")));
    }

    #[test]
    fn put_outside_schema_is_an_error() {
        let mut table = MultiSeriesTable::new(labels(1), MultiSeriesTable::schema(&plants(&["A"]), false));
        let err = table.put(Metric::Watt, &PlantKey::Total, &series(&[1.0]));
        assert_eq!(
            err,
            Err(TableError::UnknownColumn {
                metric: "watt".to_string(),
                plant: "Total".to_string()
            })
        );
        assert!(table.put(Metric::Watt, &PlantKey::named("B"), &series(&[1.0])).is_err());
    }

    #[test]
    fn cumulative_is_running_sum() {
        let mut table = MultiSeriesTable::new(labels(4), MultiSeriesTable::schema(&plants(&["A"]), false));
        let a = PlantKey::named("A");
        table.put(Metric::WattHours, &a, &series(&[1.5, 2.0, 0.0, 3.25])).unwrap();
        table.compute_cumulative("A").unwrap();
        assert_eq!(
            table.column(Metric::WattHoursCumsum, &a),
            Some(&[Some(1.5), Some(3.5), Some(3.5), Some(6.75)][..])
        );
    }

    #[test]
    fn cumulative_stops_at_first_gap() {
        let mut table = MultiSeriesTable::new(labels(3), MultiSeriesTable::schema(&plants(&["A"]), false));
        let a = PlantKey::named("A");
        table.put(Metric::WattHours, &a, &series(&[1.0, f64::NAN, 2.0])).unwrap();
        table.compute_cumulative("A").unwrap();
        assert_eq!(
            table.column(Metric::WattHoursCumsum, &a),
            Some(&[Some(1.0), None, None][..])
        );
    }

    #[test]
    fn cumulative_without_energy_leaves_column_unwritten() {
        let mut table = MultiSeriesTable::new(labels(2), MultiSeriesTable::schema(&plants(&["A"]), false));
        table.compute_cumulative("A").unwrap();
        assert!(!table.is_written(Metric::WattHoursCumsum, &PlantKey::named("A")));
    }

    #[test]
    fn total_sums_written_plants_and_skips_gaps() {
        let mut table = MultiSeriesTable::new(labels(2), MultiSeriesTable::schema(&plants(&["A", "B", "C"]), true));
        table.put(Metric::Watt, &PlantKey::named("A"), &series(&[1.0, 2.0])).unwrap();
        table.put(Metric::Watt, &PlantKey::named("B"), &series(&[10.0, f64::NAN])).unwrap();
        table.aggregate_total(&[Metric::Watt]).unwrap();
        assert_eq!(
            table.column(Metric::Watt, &PlantKey::Total),
            Some(&[Some(11.0), Some(2.0)][..])
        );
        // no energy written yet
        table.aggregate_total(&[Metric::WattHours]).unwrap();
        assert!(!table.is_written(Metric::WattHours, &PlantKey::Total));
    }

    #[test]
    fn total_requires_all_mode_schema() {
        let mut table = MultiSeriesTable::new(labels(1), MultiSeriesTable::schema(&plants(&["A"]), false));
        assert!(table.aggregate_total(&[Metric::Watt]).is_err());
    }

    #[test]
    fn render_marks_empty_cells() {
        let mut table = MultiSeriesTable::new(labels(2), MultiSeriesTable::schema(&plants(&["A"]), false));
        table.put(Metric::Watt, &PlantKey::named("A"), &series(&[1.0, 2.0])).unwrap();
        let text = table.freeze().render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp"));
        assert!(lines[0].contains("watt_hours_cumsum/A"));
        assert!(lines[1].starts_with("t0"));
        assert!(lines[1].contains("1.000"));
        assert!(lines[1].contains("NaN"));
    }
}
