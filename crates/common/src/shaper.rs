//! Result Shaper: pure transformations from warehouse tables to display tables.
//!
//! Every function takes a table by reference and returns a new one. An empty
//! input is reported as [`ShapeError::NoData`] instead of producing zeros.

use crate::error::ShapeError;
use crate::table::{Cell, Column, ResultTable};
use std::cmp::Ordering;

/// Header of the 1-based row number column added by [`with_display_index`].
pub const INDEX_COLUMN: &str = "#";

fn non_empty(table: &ResultTable) -> Result<(), ShapeError> {
    if table.is_empty() {
        Err(ShapeError::NoData)
    } else {
        Ok(())
    }
}

/// Rename columns; `pairs` maps current names to display labels.
pub fn rename_columns(
    table: &ResultTable,
    pairs: &[(&str, &str)],
) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let mut columns = table.columns().to_vec();
    for (from, to) in pairs {
        let i = table.require_column(from)?;
        columns[i].name = (*to).to_string();
    }
    Ok(ResultTable::new(columns, table.rows().to_vec()))
}

/// The `n` rows with the largest values in `column`, largest first.
///
/// Ties keep their original order; missing values sort last.
pub fn top_n(table: &ResultTable, column: &str, n: usize) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let values = table.numbers(column)?;
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by(|&a, &b| match (values[a], values[b]) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    let rows = order
        .into_iter()
        .take(n)
        .map(|i| table.rows()[i].clone())
        .collect();
    Ok(ResultTable::new(table.columns().to_vec(), rows))
}

/// Append `share_column`: each row's percentage of the total of `value_column`
/// over rows with the same `group_column`.
///
/// A missing value, or a group whose total is zero, gets a missing share.
pub fn group_shares(
    table: &ResultTable,
    group_column: &str,
    value_column: &str,
    share_column: &str,
) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let groups = table.texts(group_column)?;
    let values = table.numbers(value_column)?;

    let mut totals: Vec<(&str, f64)> = Vec::new();
    for (group, value) in groups.iter().zip(&values) {
        let v = value.unwrap_or(0.0);
        match totals.iter_mut().find(|(g, _)| *g == group.as_str()) {
            Some((_, total)) => *total += v,
            None => totals.push((group.as_str(), v)),
        }
    }

    let shares = groups.iter().zip(&values).map(|(group, value)| {
        let total = totals
            .iter()
            .find(|(g, _)| *g == group.as_str())
            .map(|(_, t)| *t)?;
        let v = (*value)?;
        (total != 0.0).then(|| v / total * 100.0)
    });
    Ok(append_column(table, Column::number(share_column), shares.map(Cell::from)))
}

/// Prepend a 1-based row number column. Cosmetic only.
pub fn with_display_index(table: &ResultTable) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let mut columns = vec![Column::number(INDEX_COLUMN)];
    columns.extend_from_slice(table.columns());
    let rows = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(Cell::Number((i + 1) as f64));
            out.extend_from_slice(row);
            out
        })
        .collect();
    Ok(ResultTable::new(columns, rows))
}

/// Append the running total of `column` in row order. Missing values add nothing.
pub fn cumulative_sum(
    table: &ResultTable,
    column: &str,
    new_column: &str,
) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let values = table.numbers(column)?;
    let running = values.iter().scan(0.0, |acc, v| {
        *acc += v.unwrap_or(0.0);
        Some(Cell::Number(*acc))
    });
    Ok(append_column(table, Column::number(new_column), running))
}

/// Append `numerator / denominator` per row; a zero or missing operand gives a missing value.
pub fn ratio(
    table: &ResultTable,
    numerator: &str,
    denominator: &str,
    new_column: &str,
) -> Result<ResultTable, ShapeError> {
    ratio_with(table, numerator, denominator, new_column, |r| r)
}

/// Like [`ratio`], rounded to a whole number.
pub fn rounded_ratio(
    table: &ResultTable,
    numerator: &str,
    denominator: &str,
    new_column: &str,
) -> Result<ResultTable, ShapeError> {
    ratio_with(table, numerator, denominator, new_column, f64::round)
}

fn ratio_with(
    table: &ResultTable,
    numerator: &str,
    denominator: &str,
    new_column: &str,
    finish: impl Fn(f64) -> f64,
) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let nums = table.numbers(numerator)?;
    let dens = table.numbers(denominator)?;
    let values = nums.iter().zip(&dens).map(|(n, d)| match (n, d) {
        (Some(n), Some(d)) if *d != 0.0 => Cell::Number(finish(n / d)),
        _ => Cell::Null,
    });
    Ok(append_column(table, Column::number(new_column), values))
}

/// Rows whose `column` renders exactly as `value`.
pub fn filter_eq(table: &ResultTable, column: &str, value: &str) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let i = table.require_column(column)?;
    let rows: Vec<Vec<Cell>> = table
        .rows()
        .iter()
        .filter(|r| r[i].to_string() == value)
        .cloned()
        .collect();
    let filtered = ResultTable::new(table.columns().to_vec(), rows);
    non_empty(&filtered)?;
    Ok(filtered)
}

/// Sorted distinct non-empty values of `column`.
pub fn distinct_text(table: &ResultTable, column: &str) -> Result<Vec<String>, ShapeError> {
    non_empty(table)?;
    let mut values: Vec<String> = table
        .texts(column)?
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    values.sort();
    values.dedup();
    Ok(values)
}

/// Sum of the present values, or `None` when every value is missing.
pub fn sum_column(table: &ResultTable, column: &str) -> Result<Option<f64>, ShapeError> {
    non_empty(table)?;
    let present: Vec<f64> = table.numbers(column)?.into_iter().flatten().collect();
    Ok((!present.is_empty()).then(|| present.iter().sum()))
}

/// Mean of the present values, or `None` when every value is missing.
pub fn mean_column(table: &ResultTable, column: &str) -> Result<Option<f64>, ShapeError> {
    non_empty(table)?;
    let present: Vec<f64> = table.numbers(column)?.into_iter().flatten().collect();
    Ok((!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64))
}

/// Reorder rows so `column` follows `labels`; unknown labels keep their order at the end.
pub fn order_by_labels(
    table: &ResultTable,
    column: &str,
    labels: &[&str],
) -> Result<ResultTable, ShapeError> {
    non_empty(table)?;
    let texts = table.texts(column)?;
    let rank = |s: &str| labels.iter().position(|l| *l == s).unwrap_or(labels.len());
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&i| rank(&texts[i]));
    let rows = order.into_iter().map(|i| table.rows()[i].clone()).collect();
    Ok(ResultTable::new(table.columns().to_vec(), rows))
}

fn append_column(
    table: &ResultTable,
    column: Column,
    values: impl Iterator<Item = Cell>,
) -> ResultTable {
    let (mut columns, rows) = table.clone().into_parts();
    columns.push(column);
    let rows = rows
        .into_iter()
        .zip(values)
        .map(|(mut row, cell)| {
            row.push(cell);
            row
        })
        .collect();
    ResultTable::new(columns, rows)
}
