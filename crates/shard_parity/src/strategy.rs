//! Replicated and sharded training steps
//!
//! Both strategies run the same forward/backward kernels on every rank; they differ only
//! in where parameters live and which collectives move gradients.
//!
//! The in-process collectives reduce in rank order with f32 accumulation, so the two
//! strategies agree bitwise. A passing check therefore covers the flatten, pad and shard
//! bookkeeping of the sharded path. It says nothing about numerical divergence between
//! real reduction orders on a device.

use half::f16;

use crate::collective::LocalGroup;
use crate::error::ParityError;
use crate::model::TwoLayer;
use crate::tensor::Tensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every rank holds all parameters; gradients are all-reduced.
    Replicated,
    /// Parameters are flattened per unit and sharded; gradients are reduce-scattered.
    Sharded,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::Replicated => "replicated",
            Strategy::Sharded => "sharded",
        }
    }
}

/// Parameter index ranges forming one flat unit: the wrapped inner layer, then the root.
const UNITS: [std::ops::Range<usize>; 2] = [0..2, 2..4];

/// One SGD step of `sum(model(x))` on each rank's input; returns the final parameters.
pub fn train_step(
    strategy: Strategy,
    model: &TwoLayer,
    inputs: &[Tensor],
    group: &LocalGroup,
    lr: f32,
) -> Result<Vec<Tensor>, ParityError> {
    if inputs.len() != group.world_size() {
        return Err(ParityError::Shape {
            what: "rank inputs".to_string(),
            expected: vec![group.world_size()],
            actual: vec![inputs.len()],
        });
    }
    match strategy {
        Strategy::Replicated => train_replicated(model, inputs, group, lr),
        Strategy::Sharded => train_sharded(model, inputs, group, lr),
    }
}

fn train_replicated(
    model: &TwoLayer,
    inputs: &[Tensor],
    group: &LocalGroup,
    lr: f32,
) -> Result<Vec<Tensor>, ParityError> {
    let params = model.parameters();
    let shapes = shapes_of(&params);

    let local_grads: Vec<Vec<f16>> = inputs.iter().map(|x| flatten(&model.loss_sum_gradients(x))).collect();
    let reduced = group.all_reduce_mean(&local_grads);

    let mut flat = flatten(&params);
    sgd_step(&mut flat, &reduced[0], lr);
    unflatten(&flat, &shapes)
}

/// A flattened, padded group of parameters.
struct FlatUnit {
    shapes: Vec<Vec<usize>>,
    numel: usize,
    padded: usize,
}

impl FlatUnit {
    fn new(params: &[Tensor], world_size: usize) -> Self {
        let numel = params.iter().map(Tensor::numel).sum();
        Self {
            shapes: shapes_of(params),
            numel,
            padded: numel.div_ceil(world_size) * world_size,
        }
    }

    fn pad(&self, mut flat: Vec<f16>) -> Vec<f16> {
        flat.resize(self.padded, f16::ZERO);
        flat
    }

    fn shard(&self, flat: Vec<f16>, world_size: usize) -> Vec<Vec<f16>> {
        let padded = self.pad(flat);
        let chunk = self.padded / world_size;
        padded.chunks(chunk.max(1)).map(<[f16]>::to_vec).collect()
    }

    fn unflatten(&self, full: &[f16]) -> Result<Vec<Tensor>, ParityError> {
        unflatten(&full[..self.numel], &self.shapes)
    }
}

fn train_sharded(
    model: &TwoLayer,
    inputs: &[Tensor],
    group: &LocalGroup,
    lr: f32,
) -> Result<Vec<Tensor>, ParityError> {
    let world = group.world_size();
    let params = model.parameters();

    let units: Vec<FlatUnit> = UNITS.iter().map(|r| FlatUnit::new(&params[r.clone()], world)).collect();
    // shards[unit][rank]
    let mut shards: Vec<Vec<Vec<f16>>> = UNITS
        .iter()
        .zip(&units)
        .map(|(r, unit)| unit.shard(flatten(&params[r.clone()]), world))
        .collect();

    // Forward/backward needs the full parameters; gather once, identical on every rank.
    let mut full_params = Vec::with_capacity(params.len());
    for (unit, unit_shards) in units.iter().zip(&shards) {
        full_params.extend(unit.unflatten(&group.all_gather(unit_shards))?);
    }
    let gathered_count = full_params.len();
    let gathered = TwoLayer::from_parameters(full_params).ok_or(ParityError::ParameterCount {
        expected: params.len(),
        actual: gathered_count,
    })?;

    let rank_grads: Vec<Vec<Tensor>> = inputs.iter().map(|x| gathered.loss_sum_gradients(x)).collect();

    for ((range, unit), unit_shards) in UNITS.iter().zip(&units).zip(shards.iter_mut()) {
        let padded: Vec<Vec<f16>> = rank_grads
            .iter()
            .map(|grads| unit.pad(flatten(&grads[range.clone()])))
            .collect();
        let grad_shards = group.reduce_scatter_mean(&padded);
        for (shard, grad) in unit_shards.iter_mut().zip(&grad_shards) {
            sgd_step(shard, grad, lr);
        }
    }

    let mut out = Vec::with_capacity(params.len());
    for (unit, unit_shards) in units.iter().zip(&shards) {
        out.extend(unit.unflatten(&group.all_gather(unit_shards))?);
    }
    Ok(out)
}

/// `p -= lr * g`, computed in `f32` and rounded per element.
fn sgd_step(params: &mut [f16], grads: &[f16], lr: f32) {
    for (p, g) in params.iter_mut().zip(grads) {
        *p = f16::from_f32(p.to_f32() - lr * g.to_f32());
    }
}

fn shapes_of(tensors: &[Tensor]) -> Vec<Vec<usize>> {
    tensors.iter().map(|t| t.shape().to_vec()).collect()
}

fn flatten(tensors: &[Tensor]) -> Vec<f16> {
    tensors.iter().flat_map(|t| t.data().iter().copied()).collect()
}

fn unflatten(flat: &[f16], shapes: &[Vec<usize>]) -> Result<Vec<Tensor>, ParityError> {
    let mut offset = 0;
    let mut out = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let n: usize = shape.iter().product();
        let end = offset + n;
        if end > flat.len() {
            return Err(ParityError::Shape {
                what: "flat parameter buffer".to_string(),
                expected: vec![end],
                actual: vec![flat.len()],
            });
        }
        out.push(Tensor::new(shape.clone(), flat[offset..end].to_vec())?);
        offset = end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IN_FEATURES;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn setup(world: usize) -> (TwoLayer, Vec<Tensor>, LocalGroup) {
        let mut rng = StdRng::seed_from_u64(0);
        let model = TwoLayer::init(&mut rng);
        let x = Tensor::uniform(&mut rng, vec![16, IN_FEATURES], 0.0, 1.0);
        (model, vec![x; world], LocalGroup::new(world).unwrap())
    }

    #[test]
    fn test_flat_unit_padding() {
        let (model, _, _) = setup(3);
        let params = model.parameters();
        // inner: 16 + 4 = 20 elements, padded to 21 for three ranks
        let unit = FlatUnit::new(&params[0..2], 3);
        assert_eq!(unit.numel, 20);
        assert_eq!(unit.padded, 21);
        let shards = unit.shard(flatten(&params[0..2]), 3);
        assert!(shards.iter().all(|s| s.len() == 7));
    }

    #[test]
    fn test_unflatten_rejects_short_buffer() {
        let err = unflatten(&[f16::ZERO; 3], &[vec![2, 2]]).unwrap_err();
        assert!(matches!(err, ParityError::Shape { .. }));
    }

    #[test]
    fn test_step_changes_parameters() {
        let (model, inputs, group) = setup(2);
        let after = train_step(Strategy::Replicated, &model, &inputs, &group, 0.1).unwrap();
        assert_ne!(after, model.parameters());
    }

    #[test]
    fn test_rank_input_count_checked() {
        let (model, inputs, _) = setup(2);
        let group = LocalGroup::new(3).unwrap();
        assert!(train_step(Strategy::Sharded, &model, &inputs, &group, 0.1).is_err());
    }

    #[test]
    fn test_strategies_agree_bitwise() {
        for world in [1, 2, 3, 4] {
            let (model, inputs, group) = setup(world);
            let replicated = train_step(Strategy::Replicated, &model, &inputs, &group, 0.1).unwrap();
            let sharded = train_step(Strategy::Sharded, &model, &inputs, &group, 0.1).unwrap();
            assert_eq!(replicated, sharded, "world size {world}");
        }
    }
}
