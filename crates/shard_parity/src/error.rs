//! Parity check errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParityError {
    #[error("{what}: expected shape {expected:?}, got {actual:?}")]
    Shape {
        what: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("expected {expected} parameter tensors, got {actual}")]
    ParameterCount { expected: usize, actual: usize },

    /// Values differ beyond tolerance; reports the first offending element.
    #[error(
        "parameter {parameter} mismatch: {mismatched}/{total} elements differ \
         (first at index {index}: expected {expected}, got {actual}; max abs diff {max_abs_diff})"
    )]
    Mismatch {
        parameter: usize,
        index: usize,
        expected: f32,
        actual: f32,
        mismatched: usize,
        total: usize,
        max_abs_diff: f32,
    },

    #[error("world size must be at least 1, got {0}")]
    WorldSize(usize),
}
