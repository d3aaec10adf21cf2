//! Two-layer linear network with a hand-written backward pass

use rand::Rng;

use crate::tensor::{Tensor, linear, matmul, matmul_tn, sum_rows};

/// Fully connected layer: `y = x @ weight.T + bias`.
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    /// `[out_features, in_features]`
    pub weight: Tensor,
    /// `[out_features]`
    pub bias: Tensor,
}

/// Gradients of one [`Linear`] plus the gradient flowing to its input.
pub struct LinearGrads {
    pub weight: Tensor,
    pub bias: Tensor,
    pub input: Tensor,
}

impl Linear {
    /// Initialize from U(-1/sqrt(in), 1/sqrt(in)), weight first, then bias.
    pub fn init<R: Rng>(rng: &mut R, in_features: usize, out_features: usize) -> Self {
        let bound = 1.0 / (in_features as f32).sqrt();
        let weight = Tensor::uniform(rng, vec![out_features, in_features], -bound, bound);
        let bias = Tensor::uniform(rng, vec![out_features], -bound, bound);
        Self { weight, bias }
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        linear(x, &self.weight, &self.bias)
    }

    pub fn backward(&self, x: &Tensor, grad_out: &Tensor) -> LinearGrads {
        LinearGrads {
            weight: matmul_tn(grad_out, x),
            bias: sum_rows(grad_out),
            input: matmul(grad_out, &self.weight),
        }
    }
}

/// `outer(inner(x))` with `inner: 4→4`, `outer: 4→5`.
#[derive(Debug, Clone, PartialEq)]
pub struct TwoLayer {
    pub inner: Linear,
    pub outer: Linear,
}

pub const IN_FEATURES: usize = 4;
pub const HIDDEN_FEATURES: usize = 4;
pub const OUT_FEATURES: usize = 5;

impl TwoLayer {
    pub fn init<R: Rng>(rng: &mut R) -> Self {
        let inner = Linear::init(rng, IN_FEATURES, HIDDEN_FEATURES);
        let outer = Linear::init(rng, HIDDEN_FEATURES, OUT_FEATURES);
        Self { inner, outer }
    }

    /// Rebuild from parameters in [`TwoLayer::parameters`] order.
    pub fn from_parameters(params: Vec<Tensor>) -> Option<Self> {
        let mut it = params.into_iter();
        let inner = Linear {
            weight: it.next()?,
            bias: it.next()?,
        };
        let outer = Linear {
            weight: it.next()?,
            bias: it.next()?,
        };
        Some(Self { inner, outer })
    }

    /// `[inner.weight, inner.bias, outer.weight, outer.bias]`
    pub fn parameters(&self) -> Vec<Tensor> {
        vec![
            self.inner.weight.clone(),
            self.inner.bias.clone(),
            self.outer.weight.clone(),
            self.outer.bias.clone(),
        ]
    }

    /// Gradients of `sum(forward(x))`, in parameter order.
    pub fn loss_sum_gradients(&self, x: &Tensor) -> Vec<Tensor> {
        let hidden = self.inner.forward(x);
        let out = self.outer.forward(&hidden);

        let ones = Tensor::full(out.shape().to_vec(), 1.0);
        let outer = self.outer.backward(&hidden, &ones);
        let inner = self.inner.backward(x, &outer.input);

        vec![inner.weight, inner.bias, outer.weight, outer.bias]
    }
}
