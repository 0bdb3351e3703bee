//! Intrinsic curiosity module
//!
//! Encodes observations into a latent vector through the grid conv stack
//! and a fully-connected encoder. An inverse model predicts the action
//! taken between two consecutive latents (supervising the encoder); a
//! forward model predicts the next latent from the current one plus the
//! action, and its prediction error is the intrinsic reward.

use tch::{
    nn,
    nn::{Init, Module},
    Device, Kind, Reduction, Tensor,
};

use crate::obs::BatchedObs;
use crate::policy::grid_policy::{embed_image, image_conv};

/// Architecture options for [`Icm`]
#[derive(Debug, Clone, Copy)]
pub struct IcmConfig {
    /// Latent embedding width
    pub encoding_size: i64,

    /// Number of fully-connected encoder layers
    pub num_layers: i64,

    /// Hidden width of the inverse and forward models
    pub hidden_dim: i64,
}

impl Default for IcmConfig {
    fn default() -> Self {
        Self { encoding_size: 256, num_layers: 2, hidden_dim: 256 }
    }
}

fn scaled_linear(p: nn::Path, in_dim: i64, out_dim: i64) -> nn::Linear {
    // Encoder weights drawn at scale 1/sqrt(fan-in).
    let config = nn::LinearConfig {
        ws_init: Init::Randn { mean: 0.0, stdev: (1.0 / in_dim as f64).sqrt() },
        ..Default::default()
    };
    nn::linear(p, in_dim, out_dim, config)
}

/// Intrinsic curiosity module: encoder + inverse model + forward model
pub struct Icm {
    vs: nn::VarStore,
    conv: nn::Sequential,
    encoder: nn::Sequential,
    inverse: nn::Sequential,
    forward_net: nn::Sequential,
    act_dim: i64,
}

impl Icm {
    /// Create a curiosity module
    ///
    /// # Arguments
    ///
    /// * `state_dim` - Flat size of the conv embedding feeding the encoder
    ///   (the policy's `semi_memory_size`)
    /// * `channels` - Observation image channels
    /// * `act_dim` - Number of discrete actions
    /// * `config` - Architecture options
    /// * `device` - Device to allocate parameters on
    pub fn new(
        state_dim: i64,
        channels: i64,
        act_dim: i64,
        config: IcmConfig,
        device: Device,
    ) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let conv = image_conv(&(&root / "image_conv"), channels);

        let enc = config.encoding_size;
        let mut encoder = nn::seq()
            .add(scaled_linear(&root / "encoder" / "fc0", state_dim, enc))
            .add_fn(|x| x.relu());
        for i in 1..config.num_layers {
            encoder = encoder
                .add(scaled_linear(&root / "encoder" / format!("fc{i}"), enc, enc))
                .add_fn(|x| x.relu());
        }

        let inverse = nn::seq()
            .add(nn::linear(&root / "inverse" / "fc1", enc * 2, config.hidden_dim, Default::default()))
            .add_fn(|x| x.relu())
            .add(nn::linear(&root / "inverse" / "fc2", config.hidden_dim, act_dim, Default::default()));

        let forward_net = nn::seq()
            .add(nn::linear(
                &root / "forward" / "fc1",
                enc + act_dim,
                config.hidden_dim,
                Default::default(),
            ))
            .add_fn(|x| x.relu())
            .add(nn::linear(&root / "forward" / "fc2", config.hidden_dim, enc, Default::default()));

        Self { vs, conv, encoder, inverse, forward_net, act_dim }
    }

    /// Encode a batch of observations into latent vectors
    fn encode(&self, obs: &BatchedObs) -> Tensor {
        self.encoder.forward(&embed_image(&self.conv, &obs.image))
    }

    /// Evaluate the module on a batch of transitions
    ///
    /// # Arguments
    ///
    /// * `actions` - Actions taken, `[batch]` int64
    /// * `curr_obs` / `next_obs` - Consecutive observation pairs
    /// * `mask` - Transition validity, `[batch]`, 1 inside an episode and 0
    ///   across an episode boundary
    ///
    /// # Returns
    ///
    /// `(intrinsic_reward, inverse_loss, forward_loss)` where the
    /// intrinsic reward is the per-transition masked latent prediction
    /// error `[batch]`, unclamped.
    pub fn forward(
        &self,
        actions: &Tensor,
        curr_obs: &BatchedObs,
        next_obs: &BatchedObs,
        mask: &Tensor,
    ) -> (Tensor, Tensor, Tensor) {
        let curr_enc = self.encode(curr_obs);
        let next_enc = self.encode(next_obs);

        let pred_act = self.inverse.forward(&Tensor::cat(&[&curr_enc, &next_enc], -1));
        let ce = pred_act.cross_entropy_loss::<Tensor>(actions, None, Reduction::None, -100, 0.0);
        let valid = mask.sum(Kind::Float).clamp_min(1.0);
        let inv_loss = (ce * mask).sum(Kind::Float) / valid;

        let one_hot = actions.one_hot(self.act_dim).to_kind(Kind::Float);
        let pred_next_enc = self.forward_net.forward(&Tensor::cat(&[&one_hot, &curr_enc], -1));

        let intr_reward = (pred_next_enc - next_enc)
            .square()
            .mean_dim(-1, false, Kind::Float)
            * mask;
        let forw_loss = intr_reward.mean(Kind::Float);

        (intr_reward, inv_loss, forw_loss)
    }

    /// Combined training loss, weighted toward the inverse term
    pub fn training_loss(inv_loss: &Tensor, forw_loss: &Tensor) -> Tensor {
        (forw_loss * 0.2 + inv_loss * 0.8) * 10.0
    }

    /// Variable store holding the module parameters
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }
}
