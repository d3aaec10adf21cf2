//! In-process collectives over a fixed set of ranks
//!
//! Every collective sees all ranks' buffers at once. Reductions sum in rank order in `f32`
//! and round once, so the result does not depend on which collective produced it.

use half::f16;

use crate::error::ParityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalGroup {
    world_size: usize,
}

impl LocalGroup {
    pub fn new(world_size: usize) -> Result<Self, ParityError> {
        if world_size == 0 {
            return Err(ParityError::WorldSize(world_size));
        }
        Ok(Self { world_size })
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Elementwise mean of every rank's buffer, delivered to every rank.
    pub fn all_reduce_mean(&self, buffers: &[Vec<f16>]) -> Vec<Vec<f16>> {
        let reduced = self.mean(buffers);
        vec![reduced; self.world_size]
    }

    /// Concatenation of every rank's shard in rank order.
    pub fn all_gather(&self, shards: &[Vec<f16>]) -> Vec<f16> {
        shards.iter().flat_map(|s| s.iter().copied()).collect()
    }

    /// Elementwise mean, split so rank `r` receives chunk `r`.
    ///
    /// Buffer length must be a multiple of the world size.
    pub fn reduce_scatter_mean(&self, buffers: &[Vec<f16>]) -> Vec<Vec<f16>> {
        let reduced = self.mean(buffers);
        let chunk = reduced.len() / self.world_size;
        reduced.chunks(chunk.max(1)).map(<[f16]>::to_vec).collect()
    }

    fn mean(&self, buffers: &[Vec<f16>]) -> Vec<f16> {
        let len = buffers.first().map_or(0, Vec::len);
        let divisor = self.world_size as f32;
        (0..len)
            .map(|i| {
                let sum: f32 = buffers.iter().map(|b| b[i].to_f32()).sum();
                f16::from_f32(sum / divisor)
            })
            .collect()
    }
}
