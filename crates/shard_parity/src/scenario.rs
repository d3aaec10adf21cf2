//! The half-precision equivalence scenario
//!
//! Build the model from a fixed seed, draw the input batch from the same generator, run
//! one step under each strategy and compare the resulting parameters.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::collective::LocalGroup;
use crate::error::ParityError;
use crate::model::{IN_FEATURES, TwoLayer};
use crate::strategy::{Strategy, train_step};
use crate::tensor::Tensor;

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioConfig {
    pub world_size: usize,
    pub seed: u64,
    pub batch_size: usize,
    pub lr: f32,
    /// Give each rank its own input batch instead of the shared seeded one
    pub distinct_rank_inputs: bool,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            world_size: 2,
            seed: 0,
            batch_size: 64,
            lr: 0.1,
            distinct_rank_inputs: false,
        }
    }
}

/// Absolute/relative closeness bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f32,
    pub atol: f32,
}

impl Tolerance {
    /// Default bounds for half precision.
    pub const HALF: Tolerance = Tolerance { rtol: 1e-3, atol: 1e-5 };

    pub const EXACT: Tolerance = Tolerance { rtol: 0.0, atol: 0.0 };

    /// `|actual - expected| <= atol + rtol * |expected|`; NaN never matches.
    pub fn is_close(&self, expected: f32, actual: f32) -> bool {
        (actual - expected).abs() <= self.atol + self.rtol * expected.abs()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::HALF
    }
}

/// Summary of a passing comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ParityReport {
    pub parameters: usize,
    pub elements: usize,
    pub max_abs_diff: f32,
}

/// Seeded model plus one input batch per rank.
pub fn build_inputs(config: &ScenarioConfig) -> (TwoLayer, Vec<Tensor>) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = TwoLayer::init(&mut rng);
    let shared = Tensor::uniform(&mut rng, vec![config.batch_size, IN_FEATURES], 0.0, 1.0);

    let inputs = if config.distinct_rank_inputs {
        (0..config.world_size)
            .map(|rank| {
                let mut rank_rng = StdRng::seed_from_u64(config.seed.wrapping_add(rank as u64 + 1));
                Tensor::uniform(&mut rank_rng, vec![config.batch_size, IN_FEATURES], 0.0, 1.0)
            })
            .collect()
    } else {
        vec![shared; config.world_size]
    };
    (model, inputs)
}

/// Final parameters after one step under `strategy`.
pub fn train_one_step(strategy: Strategy, config: &ScenarioConfig) -> Result<Vec<Tensor>, ParityError> {
    let group = LocalGroup::new(config.world_size)?;
    let (model, inputs) = build_inputs(config);
    let params = train_step(strategy, &model, &inputs, &group, config.lr)?;
    tracing::debug!(strategy = strategy.as_str(), world_size = config.world_size, "training step done");
    Ok(params)
}

/// Compare two parameter lists elementwise.
///
/// ## Errors
///
/// Reports the first parameter that differs, with its first offending element, the
/// number of mismatched elements and the largest absolute difference.
pub fn assert_close(expected: &[Tensor], actual: &[Tensor], tol: Tolerance) -> Result<ParityReport, ParityError> {
    if expected.len() != actual.len() {
        return Err(ParityError::ParameterCount {
            expected: expected.len(),
            actual: actual.len(),
        });
    }

    let mut elements = 0;
    let mut max_abs_diff = 0.0f32;

    for (parameter, (e, a)) in expected.iter().zip(actual).enumerate() {
        if e.shape() != a.shape() {
            return Err(ParityError::Shape {
                what: format!("parameter {}", parameter),
                expected: e.shape().to_vec(),
                actual: a.shape().to_vec(),
            });
        }

        let ev = e.to_f32_vec();
        let av = a.to_f32_vec();
        let mut first: Option<usize> = None;
        let mut mismatched = 0;
        let mut param_max = 0.0f32;

        for (i, (&x, &y)) in ev.iter().zip(&av).enumerate() {
            let diff = (y - x).abs();
            if diff.is_finite() {
                param_max = param_max.max(diff);
            }
            if !tol.is_close(x, y) {
                mismatched += 1;
                first.get_or_insert(i);
            }
        }

        if let Some(index) = first {
            return Err(ParityError::Mismatch {
                parameter,
                index,
                expected: ev[index],
                actual: av[index],
                mismatched,
                total: ev.len(),
                max_abs_diff: param_max,
            });
        }

        elements += ev.len();
        max_abs_diff = max_abs_diff.max(param_max);
    }

    Ok(ParityReport {
        parameters: expected.len(),
        elements,
        max_abs_diff,
    })
}

/// Run both strategies and require matching parameters.
pub fn check_equivalence(config: &ScenarioConfig, tol: Tolerance) -> Result<ParityReport, ParityError> {
    let replicated = train_one_step(Strategy::Replicated, config)?;
    let sharded = train_one_step(Strategy::Sharded, config)?;
    assert_close(&replicated, &sharded, tol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_reference_setup() {
        let config = ScenarioConfig::default();
        assert_eq!(config.world_size, 2);
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.lr, 0.1);
    }

    #[test]
    fn test_tolerance() {
        assert!(Tolerance::HALF.is_close(1.0, 1.0005));
        assert!(!Tolerance::HALF.is_close(1.0, 1.01));
        assert!(!Tolerance::HALF.is_close(f32::NAN, f32::NAN));
        assert!(Tolerance::EXACT.is_close(2.0, 2.0));
    }

    #[test]
    fn test_assert_close_reports_first_mismatch() {
        let a = vec![Tensor::from_f32(vec![3], &[1.0, 2.0, 3.0]).unwrap()];
        let b = vec![Tensor::from_f32(vec![3], &[1.0, 2.5, 4.0]).unwrap()];
        let err = assert_close(&a, &b, Tolerance::HALF).unwrap_err();
        assert_eq!(
            err,
            ParityError::Mismatch {
                parameter: 0,
                index: 1,
                expected: 2.0,
                actual: 2.5,
                mismatched: 2,
                total: 3,
                max_abs_diff: 1.0,
            }
        );
    }

    #[test]
    fn test_assert_close_checks_shapes_and_counts() {
        let a = vec![Tensor::zeros(vec![2, 2])];
        let b = vec![Tensor::zeros(vec![4])];
        assert!(matches!(assert_close(&a, &b, Tolerance::HALF), Err(ParityError::Shape { .. })));
        assert!(matches!(
            assert_close(&a, &[], Tolerance::HALF),
            Err(ParityError::ParameterCount { expected: 1, actual: 0 })
        ));
    }

    #[test]
    fn test_build_inputs_shared_by_default() {
        let (_, inputs) = build_inputs(&ScenarioConfig::default());
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0], inputs[1]);
    }

    #[test]
    fn test_build_inputs_distinct() {
        let config = ScenarioConfig {
            distinct_rank_inputs: true,
            ..ScenarioConfig::default()
        };
        let (_, inputs) = build_inputs(&config);
        assert_ne!(inputs[0], inputs[1]);
    }
}
