//! CSV export for quantized forecast tables.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::engine::validate::QuantizedTable;

/// Name of the first CSV column.
const INDEX_HEADER: &str = "timestamp";

/// Exports a quantized table to a CSV file at the given path.
///
/// Writes a header row followed by one row per timestamp. Produces
/// deterministic output for identical inputs.
///
/// # Arguments
///
/// * `table` - Validated, quantized forecast table
/// * `path` - Output file path
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(table: &QuantizedTable, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(table, buf)
}

/// Writes a quantized table as CSV to any writer.
///
/// Header is `timestamp` followed by `<metric>/<plant>` for each column in
/// schema order.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(table: &QuantizedTable, writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    let header = std::iter::once(INDEX_HEADER.to_string())
        .chain(table.columns().iter().map(ToString::to_string));
    wtr.write_record(header)?;

    for (row, label) in table.index().iter().enumerate() {
        let cells = table.row(row).unwrap_or_default();
        let record = std::iter::once(label.clone()).chain(cells.iter().map(i64::to_string));
        wtr.write_record(record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::table::MultiSeriesTable;
    use crate::engine::types::{Metric, PlantKey};
    use crate::engine::validate::validate_and_quantize;
    use crate::plant::types::Series;

    fn make_table(rows: usize) -> QuantizedTable {
        let index: Vec<String> = (0..rows)
            .map(|h| format!("2024-06-21T{h:02}:00:00+0000"))
            .collect();
        let mut table =
            MultiSeriesTable::new(index.clone(), MultiSeriesTable::schema(&["Roof".to_string()], false));
        let key = PlantKey::named("Roof");
        let power = Series::new(index.clone(), (0..rows).map(|i| i as f64 * 100.4).collect());
        let energy = Series::new(index, (0..rows).map(|i| i as f64 * 50.5).collect());
        table.put(Metric::Watt, &key, &power).unwrap();
        table.put(Metric::WattHours, &key, &energy).unwrap();
        table.compute_cumulative("Roof").unwrap();
        validate_and_quantize(&table.freeze()).unwrap()
    }

    #[test]
    fn header_lists_columns_in_schema_order() {
        let mut buf = Vec::new();
        write_csv(&make_table(1), &mut buf).ok();
        let output = String::from_utf8(buf).ok();
        let first_line = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(
            first_line,
            "timestamp,watt/Roof,watt_hours/Roof,watt_hours_cumsum/Roof"
        );
    }

    #[test]
    fn row_count_matches_index() {
        let mut buf = Vec::new();
        write_csv(&make_table(24), &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        assert_eq!(output.lines().count(), 25);
    }

    #[test]
    fn cells_are_integers() {
        let mut buf = Vec::new();
        write_csv(&make_table(3), &mut buf).ok();
        let output = String::from_utf8(buf).unwrap_or_default();
        let lines: Vec<&str> = output.lines().collect();
        // 50.5 and 151.5 round to even
        assert_eq!(lines[2], "2024-06-21T01:00:00+0000,100,50,50");
        assert_eq!(lines[3], "2024-06-21T02:00:00+0000,201,101,152");
    }

    #[test]
    fn export_writes_file() {
        let path = std::env::temp_dir().join(format!("pvcast_export_{}.csv", std::process::id()));
        export_csv(&make_table(2), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,"));
        std::fs::remove_file(&path).ok();
    }
}
