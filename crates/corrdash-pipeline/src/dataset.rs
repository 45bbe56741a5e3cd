//! The in-memory table every transform and projection works on.
//!
//! A [`Dataset`] is an ordered set of uniquely named `f64` columns that share
//! one row count. It is backed by a polars [`DataFrame`] whose columns are all
//! `Float64`, so hosts can hand it straight to polars writers.

use crate::error::{PipelineError, Result, ResultExt};
use crate::utils::is_numeric_dtype;
use polars::prelude::*;
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Ordered, numeric, rectangular table.
///
/// Row order is meaningful (time-series semantics) and every operator
/// preserves it.
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
    /// Leading rows holding zero-fills from differencing (no history available).
    leading_fill_rows: usize,
}

impl Dataset {
    /// Build a dataset from `(name, values)` pairs.
    ///
    /// Fails with [`PipelineError::InvalidDataset`] on duplicate names or
    /// columns of different lengths.
    pub fn from_columns<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut height = None;
        let mut polars_columns: Vec<Column> = Vec::new();

        for (name, values) in columns {
            let name: String = name.into();
            if !seen.insert(name.clone()) {
                return Err(PipelineError::InvalidDataset(format!(
                    "duplicate column name '{}'",
                    name
                )));
            }
            match height {
                None => height = Some(values.len()),
                Some(expected) if expected != values.len() => {
                    return Err(PipelineError::InvalidDataset(format!(
                        "column '{}' has {} rows, expected {}",
                        name,
                        values.len(),
                        expected
                    )));
                }
                Some(_) => {}
            }
            polars_columns.push(Series::new(name.as_str().into(), values).into());
        }

        let df = if polars_columns.is_empty() {
            DataFrame::empty()
        } else {
            DataFrame::new(polars_columns)?
        };

        Ok(Self {
            df,
            leading_fill_rows: 0,
        })
    }

    /// Build a dataset from an arbitrary polars frame.
    ///
    /// Numeric columns are cast to `Float64`; other columns are skipped.
    /// Nulls are filled forward, then backward, then with zero so that every
    /// column is dense.
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let mut columns: Vec<Column> = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            if !is_numeric_dtype(column.dtype()) {
                debug!(
                    "Skipping non-numeric column '{}' ({})",
                    column.name(),
                    column.dtype()
                );
                continue;
            }

            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)
                .context(format!("casting column '{}' to Float64", column.name()))?;
            let series = if series.null_count() > 0 {
                debug!(
                    "Filling {} nulls in column '{}'",
                    series.null_count(),
                    series.name()
                );
                let filled = series.fill_null(FillNullStrategy::Forward(None))?;
                let filled = filled.fill_null(FillNullStrategy::Backward(None))?;
                filled.fill_null(FillNullStrategy::Zero)?
            } else {
                series
            };
            columns.push(series.into());
        }

        let df = if columns.is_empty() {
            DataFrame::empty()
        } else {
            DataFrame::new(columns)?
        };

        Ok(Self {
            df,
            leading_fill_rows: 0,
        })
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.df.width()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// True when the dataset has zero rows or zero columns.
    pub fn is_empty(&self) -> bool {
        self.height() == 0 || self.width() == 0
    }

    /// Fail with [`PipelineError::EmptyDataset`] if the dataset is empty.
    pub fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        Ok(())
    }

    /// Leading rows that carry zero-fills from differencing.
    pub fn leading_fill_rows(&self) -> usize {
        self.leading_fill_rows
    }

    pub(crate) fn with_leading_fill_rows(mut self, rows: usize) -> Self {
        self.leading_fill_rows = rows.min(self.height());
        self
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Whether a column with this name exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Copy of one column's values.
    pub fn values(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .df
            .column(name)
            .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
        dense_values(column)
    }

    /// Copies of all columns, in order.
    pub fn column_vectors(&self) -> Result<Vec<(String, Vec<f64>)>> {
        self.df
            .get_columns()
            .iter()
            .map(|column| Ok((column.name().to_string(), dense_values(column)?)))
            .collect()
    }

    /// Row-major copy of the table.
    pub fn rows(&self) -> Result<Vec<Vec<f64>>> {
        let n_rows = self.height();
        let n_cols = self.width();
        let mut matrix = vec![vec![0.0; n_cols]; n_rows];

        for (col_idx, column) in self.df.get_columns().iter().enumerate() {
            let values = dense_values(column)?;
            for (row, value) in matrix.iter_mut().zip(values) {
                row[col_idx] = value;
            }
        }

        Ok(matrix)
    }

    /// Rebuild a dataset with the same column order from transformed columns.
    ///
    /// Used by operators that map every column independently.
    pub(crate) fn map_columns<F>(&self, mut f: F) -> Result<Self>
    where
        F: FnMut(&str, &[f64]) -> Vec<f64>,
    {
        let columns = self
            .column_vectors()?
            .into_iter()
            .map(|(name, values)| {
                let mapped = f(&name, &values);
                (name, mapped)
            });
        Ok(Self::from_columns(columns)?.with_leading_fill_rows(self.leading_fill_rows))
    }

    /// New dataset with an extra column appended at the end.
    pub fn with_column(&self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if self.has_column(&name) {
            return Err(PipelineError::InvalidDataset(format!(
                "duplicate column name '{}'",
                name
            )));
        }
        if self.width() > 0 && values.len() != self.height() {
            return Err(PipelineError::InvalidDataset(format!(
                "column '{}' has {} rows, expected {}",
                name,
                values.len(),
                self.height()
            )));
        }

        let mut columns = self.column_vectors()?;
        columns.push((name, values));
        Ok(Self::from_columns(columns)?.with_leading_fill_rows(self.leading_fill_rows))
    }

    /// New dataset restricted to the given columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| Ok((name.to_string(), self.values(name)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_columns(columns)?.with_leading_fill_rows(self.leading_fill_rows))
    }

    /// Borrow the backing frame.
    pub fn as_dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Take the backing frame.
    pub fn into_dataframe(self) -> DataFrame {
        self.df
    }

    /// Content fingerprint over names, values and fill rows.
    ///
    /// Two datasets that compare equal have the same fingerprint. Different
    /// datasets can collide, so a matching fingerprint still needs `==`.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.height().hash(&mut hasher);
        self.leading_fill_rows.hash(&mut hasher);
        for column in self.df.get_columns() {
            column.name().as_str().hash(&mut hasher);
            if let Ok(values) = dense_values(column) {
                for value in values {
                    value.to_bits().hash(&mut hasher);
                }
            }
        }
        hasher.finish()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        if self.shape() != other.shape() || self.leading_fill_rows != other.leading_fill_rows {
            return false;
        }
        match (self.column_vectors(), other.column_vectors()) {
            (Ok(left), Ok(right)) => left.iter().zip(right.iter()).all(|(a, b)| {
                a.0 == b.0
                    && a.1
                        .iter()
                        .zip(b.1.iter())
                        .all(|(x, y)| x.to_bits() == y.to_bits())
            }),
            _ => false,
        }
    }
}

/// Serialized as `{"rows": N, "columns": [{"name": .., "values": [..]}, ..]}`.
impl Serialize for Dataset {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let columns = self.column_vectors().map_err(serde::ser::Error::custom)?;
        let mut state = serializer.serialize_struct("Dataset", 2)?;
        state.serialize_field("rows", &self.height())?;
        state.serialize_field("columns", &SerializedColumns(&columns))?;
        state.end()
    }
}

struct SerializedColumns<'a>(&'a [(String, Vec<f64>)]);

impl Serialize for SerializedColumns<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct NamedColumn<'a> {
            name: &'a str,
            values: &'a [f64],
        }

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for (name, values) in self.0 {
            seq.serialize_element(&NamedColumn { name, values })?;
        }
        seq.end()
    }
}

fn dense_values(column: &Column) -> Result<Vec<f64>> {
    let casted = column.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|value| value.unwrap_or(0.0))
        .collect();
    Ok(values)
}
