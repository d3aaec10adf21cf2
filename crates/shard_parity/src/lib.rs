#![forbid(unsafe_code)]
//! Replicated vs sharded training-step equivalence in half precision
//!
//! A two-layer linear network is trained for one SGD step on `world_size` simulated
//! ranks, once with every rank holding the full parameters (gradients all-reduced) and
//! once with parameters flattened into padded per-unit shards (gradients
//! reduce-scattered, full parameters re-gathered at the end). Both runs must produce the
//! same parameters.
//!
//! ```
//! use shard_parity::{ScenarioConfig, Tolerance, check_equivalence};
//!
//! let report = check_equivalence(&ScenarioConfig::default(), Tolerance::HALF).unwrap();
//! assert_eq!(report.parameters, 4);
//! ```

pub mod collective;
pub mod error;
pub mod model;
pub mod scenario;
pub mod strategy;
pub mod tensor;

pub use error::ParityError;
pub use scenario::{ParityReport, ScenarioConfig, Tolerance, assert_close, check_equivalence, train_one_step};
pub use strategy::Strategy;
pub use tensor::Tensor;
