//! Categorical action distribution

use tch::{Kind, Tensor};

/// Categorical distribution over discrete actions
///
/// Built from raw logits; stores log-probabilities for numerical
/// stability. All methods operate batch-wise on `[batch, num_actions]`
/// inputs.
#[derive(Debug)]
pub struct Categorical {
    log_probs: Tensor,
}

impl Categorical {
    /// Build a distribution from unnormalized logits
    pub fn from_logits(logits: &Tensor) -> Self {
        Self { log_probs: logits.log_softmax(-1, Kind::Float) }
    }

    /// Sample one action per batch entry
    pub fn sample(&self) -> Tensor {
        self.log_probs.exp().multinomial(1, true).squeeze_dim(-1)
    }

    /// Log probability of the given actions, shape `[batch]`
    pub fn log_prob(&self, actions: &Tensor) -> Tensor {
        self.log_probs.gather(-1, &actions.unsqueeze(-1), false).squeeze_dim(-1)
    }

    /// Entropy per batch entry, shape `[batch]`
    pub fn entropy(&self) -> Tensor {
        -(self.log_probs.exp() * &self.log_probs).sum_dim_intlist(-1, false, Kind::Float)
    }

    /// Number of actions in the distribution
    pub fn num_actions(&self) -> i64 {
        *self.log_probs.size().last().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tch::Device;

    #[test]
    fn test_sample_in_range() {
        let logits = Tensor::randn([8, 3], (Kind::Float, Device::Cpu));
        let dist = Categorical::from_logits(&logits);

        let actions = dist.sample();
        assert_eq!(actions.size(), vec![8]);

        let actions: Vec<i64> = Vec::try_from(actions).unwrap();
        for a in actions {
            assert!((0..3).contains(&a));
        }
    }

    #[test]
    fn test_log_prob_matches_uniform() {
        let logits = Tensor::zeros([4, 2], (Kind::Float, Device::Cpu));
        let dist = Categorical::from_logits(&logits);

        let actions = Tensor::from_slice(&[0i64, 1, 0, 1]);
        let log_probs: Vec<f32> = Vec::try_from(dist.log_prob(&actions)).unwrap();
        for lp in log_probs {
            assert!((lp - 0.5f32.ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_entropy_of_uniform() {
        let logits = Tensor::zeros([2, 4], (Kind::Float, Device::Cpu));
        let dist = Categorical::from_logits(&logits);

        let entropy: Vec<f32> = Vec::try_from(dist.entropy()).unwrap();
        for h in entropy {
            assert!((h - 4.0f32.ln()).abs() < 1e-5);
        }
    }

    #[test]
    fn test_entropy_nonnegative() {
        let logits = Tensor::randn([16, 5], (Kind::Float, Device::Cpu));
        let dist = Categorical::from_logits(&logits);

        let entropy: Vec<f32> = Vec::try_from(dist.entropy()).unwrap();
        for h in entropy {
            assert!(h >= 0.0);
        }
    }
}
