//! Observation types and preprocessing
//!
//! Environments produce [`GridObs`] values; the preprocessor turns a slice
//! of them into a [`BatchedObs`] tensor structure that the policy and
//! curiosity networks consume.

use anyhow::{ensure, Result};
use tch::{Device, Kind, Tensor};

/// A single raw gridworld observation
///
/// The image is stored row-major as `height * width * channels` floats,
/// matching the `[H, W, C]` layout the networks expect after batching.
#[derive(Debug, Clone, PartialEq)]
pub struct GridObs {
    /// Flattened image data
    pub image: Vec<f32>,
}

impl GridObs {
    /// Create an observation from flattened image data
    pub fn new(image: Vec<f32>) -> Self {
        Self { image }
    }
}

/// A batch of preprocessed observations
///
/// Holds an image tensor of shape `[batch, height, width, channels]`.
#[derive(Debug)]
pub struct BatchedObs {
    /// Image tensor `[batch, H, W, C]`
    pub image: Tensor,
}

impl BatchedObs {
    /// Number of observations in the batch
    pub fn len(&self) -> i64 {
        self.image.size()[0]
    }

    /// Check if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Select a sub-batch by index tensor
    pub fn index_select(&self, indexes: &Tensor) -> BatchedObs {
        BatchedObs { image: self.image.index_select(0, &indexes.to_device(self.image.device())) }
    }
}

/// Converts raw observations into batched tensors
///
/// Carries the image dimensions so flattened observations can be reshaped
/// into `[batch, H, W, C]` on the requested device.
#[derive(Debug, Clone, Copy)]
pub struct ObsPreprocessor {
    height: i64,
    width: i64,
    channels: i64,
}

impl ObsPreprocessor {
    /// Create a preprocessor for images of the given dimensions
    pub fn new(height: i64, width: i64, channels: i64) -> Self {
        Self { height, width, channels }
    }

    /// Per-observation image length in floats
    pub fn obs_len(&self) -> usize {
        (self.height * self.width * self.channels) as usize
    }

    /// Image dimensions as (height, width, channels)
    pub fn shape(&self) -> (i64, i64, i64) {
        (self.height, self.width, self.channels)
    }

    /// Batch a slice of observations onto the given device
    pub fn preprocess(&self, observations: &[GridObs], device: Device) -> Result<BatchedObs> {
        let obs_len = self.obs_len();
        let mut flat = Vec::with_capacity(observations.len() * obs_len);
        for obs in observations {
            ensure!(
                obs.image.len() == obs_len,
                "observation has {} values, expected {}",
                obs.image.len(),
                obs_len
            );
            flat.extend_from_slice(&obs.image);
        }

        let image = Tensor::from_slice(&flat)
            .view([observations.len() as i64, self.height, self.width, self.channels])
            .to_kind(Kind::Float)
            .to_device(device);
        Ok(BatchedObs { image })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_of(value: f32, len: usize) -> GridObs {
        GridObs::new(vec![value; len])
    }

    #[test]
    fn test_preprocess_shape() {
        let prep = ObsPreprocessor::new(7, 7, 3);
        let batch = prep
            .preprocess(&[obs_of(0.0, prep.obs_len()), obs_of(1.0, prep.obs_len())], Device::Cpu)
            .unwrap();

        assert_eq!(batch.image.size(), vec![2, 7, 7, 3]);
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_preprocess_rejects_wrong_length() {
        let prep = ObsPreprocessor::new(7, 7, 3);
        let result = prep.preprocess(&[GridObs::new(vec![0.0; 10])], Device::Cpu);
        assert!(result.is_err());
    }

    #[test]
    fn test_index_select() {
        let prep = ObsPreprocessor::new(2, 2, 1);
        let batch = prep
            .preprocess(
                &[obs_of(0.0, 4), obs_of(1.0, 4), obs_of(2.0, 4)],
                Device::Cpu,
            )
            .unwrap();

        let sub = batch.index_select(&Tensor::from_slice(&[2i64, 0]));
        assert_eq!(sub.image.size(), vec![2, 2, 2, 1]);
        let first: f64 = sub.image.get(0).sum(Kind::Float).double_value(&[]);
        assert_eq!(first, 8.0); // four 2.0 entries
    }
}
