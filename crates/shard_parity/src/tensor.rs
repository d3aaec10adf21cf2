//! Dense half-precision tensors
//!
//! Storage is `f16`. Arithmetic accumulates in `f32` and rounds back to `f16` once per
//! produced element, the way half-precision kernels behave.

use half::f16;
use rand::Rng;

use crate::error::ParityError;

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f16>,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: Vec<f16>) -> Result<Self, ParityError> {
        let numel: usize = shape.iter().product();
        if numel != data.len() {
            return Err(ParityError::Shape {
                what: "tensor data".to_string(),
                expected: shape,
                actual: vec![data.len()],
            });
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let numel = shape.iter().product();
        Self {
            shape,
            data: vec![f16::ZERO; numel],
        }
    }

    pub fn full(shape: Vec<usize>, value: f32) -> Self {
        let numel = shape.iter().product();
        Self {
            shape,
            data: vec![f16::from_f32(value); numel],
        }
    }

    /// Round `values` to half precision.
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self, ParityError> {
        Self::new(shape, values.iter().copied().map(f16::from_f32).collect())
    }

    /// Sample U(low, high) in `f32`, then cast to half.
    pub fn uniform<R: Rng>(rng: &mut R, shape: Vec<usize>, low: f32, high: f32) -> Self {
        let numel: usize = shape.iter().product();
        let data = (0..numel).map(|_| f16::from_f32(rng.gen_range(low..high))).collect();
        Self { shape, data }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f16] {
        &self.data
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Element `[row, col]` of a 2-D tensor, widened to `f32`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.shape[1] + col].to_f32()
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.data.iter().map(|v| v.to_f32()).collect()
    }
}

/// `x[b, :] @ w.T + bias` for `x: [B, in]`, `w: [out, in]`, `bias: [out]`.
pub fn linear(x: &Tensor, w: &Tensor, bias: &Tensor) -> Tensor {
    let (batch, inp) = (x.shape[0], x.shape[1]);
    let out = w.shape[0];
    let mut data = Vec::with_capacity(batch * out);
    for b in 0..batch {
        for o in 0..out {
            let mut acc = bias.data[o].to_f32();
            for i in 0..inp {
                acc += x.at(b, i) * w.at(o, i);
            }
            data.push(f16::from_f32(acc));
        }
    }
    Tensor {
        shape: vec![batch, out],
        data,
    }
}

/// `a.T @ b` for `a: [B, m]`, `b: [B, n]`, giving `[m, n]`.
pub fn matmul_tn(a: &Tensor, b: &Tensor) -> Tensor {
    let (batch, m, n) = (a.shape[0], a.shape[1], b.shape[1]);
    let mut data = Vec::with_capacity(m * n);
    for r in 0..m {
        for c in 0..n {
            let acc: f32 = (0..batch).map(|k| a.at(k, r) * b.at(k, c)).sum();
            data.push(f16::from_f32(acc));
        }
    }
    Tensor {
        shape: vec![m, n],
        data,
    }
}

/// `a @ b` for `a: [B, k]`, `b: [k, n]`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Tensor {
    let (batch, k, n) = (a.shape[0], a.shape[1], b.shape[1]);
    let mut data = Vec::with_capacity(batch * n);
    for r in 0..batch {
        for c in 0..n {
            let acc: f32 = (0..k).map(|i| a.at(r, i) * b.at(i, c)).sum();
            data.push(f16::from_f32(acc));
        }
    }
    Tensor {
        shape: vec![batch, n],
        data,
    }
}

/// Column sums of a 2-D tensor.
pub fn sum_rows(a: &Tensor) -> Tensor {
    let (rows, cols) = (a.shape[0], a.shape[1]);
    let data = (0..cols)
        .map(|c| f16::from_f32((0..rows).map(|r| a.at(r, c)).sum()))
        .collect();
    Tensor {
        shape: vec![cols],
        data,
    }
}
