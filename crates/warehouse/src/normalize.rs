//! JSON-safety normalisation
//!
//! Non-finite floats have no JSON representation and date/time values have no
//! native one, so every result set passes through here before it is served.

use crate::models::{Cell, Column, Record, ResultSet};
use serde_json::{Number, Value};

/// Convert a result set into ordered JSON records.
///
/// NaN and infinities become `null`, date/time cells become strings, and
/// missing values stay `null`. Row order and column order are preserved.
pub fn normalize(result: ResultSet) -> Vec<Record> {
    let ResultSet { columns, rows } = result;

    rows.into_iter()
        .map(|row| {
            columns
                .iter()
                .zip(row)
                .map(|(column, cell)| (column.name.clone(), cell_to_json(column, cell)))
                .collect()
        })
        .collect()
}

fn cell_to_json(column: &Column, cell: Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Bool(b) => Value::Bool(b),
        Cell::Int(i) => Value::Number(i.into()),
        // from_f64 refuses NaN and +/-inf
        Cell::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Cell::Text(s) if column.kind.is_temporal() && s.is_empty() => Value::Null,
        Cell::Text(s) => Value::String(s),
        Cell::Date(d) => Value::String(d.to_string()),
        Cell::Timestamp(ts) => Value::String(ts.to_string()),
        Cell::Time(t) => Value::String(t.to_string()),
    }
}
