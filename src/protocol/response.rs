//! Response definitions
//!
//! Represents decoded replies from the server.

use bytes::Bytes;

use super::CommandName;

/// Row-major 2-D integer array recovered from an array reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array2 {
    rows: usize,
    cols: usize,
    values: Vec<i64>,
}

impl Array2 {
    /// Wrap `values`; returns None unless `values.len() == rows * cols`
    pub fn new(rows: usize, cols: usize, values: Vec<i64>) -> Option<Self> {
        (rows.checked_mul(cols)? == values.len()).then_some(Self { rows, cols, values })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat row-major values
    pub fn values(&self) -> &[i64] {
        &self.values
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i64> {
        if row < self.rows && col < self.cols {
            self.values.get(row * self.cols + col).copied()
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> Option<&[i64]> {
        if row >= self.rows {
            return None;
        }
        let start = row * self.cols;
        Some(&self.values[start..start + self.cols])
    }

    /// Nested rows, for printing and comparisons
    pub fn to_nested(&self) -> Vec<Vec<i64>> {
        (0..self.rows)
            .filter_map(|r| self.row(r).map(<[i64]>::to_vec))
            .collect()
    }
}

/// Typed view of a reply, one variant per decoder family
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseData {
    Bool(bool),
    Number(f64),
    Numbers(Vec<f64>),
    List(Vec<String>),
    /// Leading number plus the remaining space-separated fields
    Fields { value: f64, rest: Vec<String> },
    Array(Array2),
    Text(String),
    Raw(Bytes),
}

/// A completed reply, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Name of the command that produced it
    name: CommandName,

    /// Frame contents without the terminator
    payload: Bytes,

    /// Decoded view
    data: ResponseData,
}

impl Response {
    pub(crate) fn new(name: CommandName, payload: Bytes, data: ResponseData) -> Self {
        Self {
            name,
            payload,
            data,
        }
    }

    pub fn name(&self) -> CommandName {
        self.name
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    pub fn into_data(self) -> ResponseData {
        self.data
    }

    /// `(name, payload, data)`
    pub fn into_parts(self) -> (CommandName, Bytes, ResponseData) {
        (self.name, self.payload, self.data)
    }
}
