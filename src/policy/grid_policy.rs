//! Actor-critic policy for gridworld observations
//!
//! A convolutional embedding over the grid image feeds tanh MLP actor and
//! critic heads. With memory enabled, an LSTM sits between the embedding
//! and the heads; the memory vector passed between steps is the
//! concatenated hidden and cell state.

use tch::{
    nn,
    nn::{Module, RNN},
    Device, Kind, Tensor,
};

use crate::obs::BatchedObs;
use crate::policy::{ActorCritic, Categorical};

/// Build the grid image embedding: two-by-two convolutions with a pooling
/// stage, producing a flat feature vector per observation
pub(crate) fn image_conv(p: &nn::Path, channels: i64) -> nn::Sequential {
    nn::seq()
        .add(nn::conv2d(p / "conv1", channels, 16, 2, Default::default()))
        .add_fn(|x| x.relu().max_pool2d_default(2))
        .add(nn::conv2d(p / "conv2", 16, 32, 2, Default::default()))
        .add_fn(|x| x.relu())
        .add(nn::conv2d(p / "conv3", 32, 64, 2, Default::default()))
        .add_fn(|x| x.relu())
}

/// Flat size of the [`image_conv`] output for a given grid
///
/// # Panics
///
/// Panics if the grid is too small for the convolution stack (under 7x7).
pub fn conv_embedding_size(height: i64, width: i64) -> i64 {
    let h = (height - 1) / 2 - 2;
    let w = (width - 1) / 2 - 2;
    assert!(h > 0 && w > 0, "grid {height}x{width} too small for the conv stack, need at least 7x7");
    64 * h * w
}

/// Run the conv stack over a `[B, H, W, C]` image batch
pub(crate) fn embed_image(conv: &nn::Sequential, image: &Tensor) -> Tensor {
    let x = image.permute([0, 3, 1, 2]);
    let x = conv.forward(&x);
    let batch = x.size()[0];
    x.reshape([batch, -1])
}

/// Configuration for [`GridPolicy`]
#[derive(Debug, Clone, Copy)]
pub struct GridPolicyConfig {
    /// Whether to thread LSTM memory between steps
    pub use_memory: bool,

    /// Hidden width of the actor and critic heads
    pub hidden_dim: i64,
}

impl Default for GridPolicyConfig {
    fn default() -> Self {
        Self { use_memory: false, hidden_dim: 64 }
    }
}

/// Convolutional actor-critic for gridworld observations
pub struct GridPolicy {
    vs: nn::VarStore,
    conv: nn::Sequential,
    memory_rnn: Option<nn::LSTM>,
    actor: nn::Sequential,
    critic: nn::Sequential,
    image_embedding_size: i64,
    device: Device,
}

impl GridPolicy {
    /// Create a policy for grids of the given dimensions
    ///
    /// # Arguments
    ///
    /// * `height`, `width`, `channels` - Observation image dimensions
    /// * `num_actions` - Number of discrete actions
    /// * `config` - Architecture options
    /// * `device` - Device to allocate parameters on
    pub fn new(
        height: i64,
        width: i64,
        channels: i64,
        num_actions: i64,
        config: GridPolicyConfig,
        device: Device,
    ) -> Self {
        let vs = nn::VarStore::new(device);
        let root = vs.root();

        let image_embedding_size = conv_embedding_size(height, width);
        let conv = image_conv(&(&root / "image_conv"), channels);

        let memory_rnn = config.use_memory.then(|| {
            nn::lstm(
                &root / "memory_rnn",
                image_embedding_size,
                image_embedding_size,
                nn::RNNConfig { batch_first: true, ..Default::default() },
            )
        });

        let actor = nn::seq()
            .add(nn::linear(
                &root / "actor" / "fc1",
                image_embedding_size,
                config.hidden_dim,
                Default::default(),
            ))
            .add_fn(|x| x.tanh())
            .add(nn::linear(&root / "actor" / "fc2", config.hidden_dim, num_actions, Default::default()));

        let critic = nn::seq()
            .add(nn::linear(
                &root / "critic" / "fc1",
                image_embedding_size,
                config.hidden_dim,
                Default::default(),
            ))
            .add_fn(|x| x.tanh())
            .add(nn::linear(&root / "critic" / "fc2", config.hidden_dim, 1, Default::default()));

        Self { vs, conv, memory_rnn, actor, critic, image_embedding_size, device }
    }

    /// Device this policy lives on
    pub fn device(&self) -> Device {
        self.device
    }

    /// Zero-filled memory for a batch, shaped `[batch, memory_size]`
    pub fn initial_memory(&self, batch_size: i64) -> Tensor {
        Tensor::zeros([batch_size, self.memory_size().max(1)], (Kind::Float, self.device))
    }

    fn heads(&self, embedding: &Tensor) -> (Categorical, Tensor) {
        let logits = self.actor.forward(embedding);
        let value = self.critic.forward(embedding).squeeze_dim(-1);
        (Categorical::from_logits(&logits), value)
    }
}

impl ActorCritic for GridPolicy {
    fn recurrent(&self) -> bool {
        self.memory_rnn.is_some()
    }

    fn memory_size(&self) -> i64 {
        if self.recurrent() {
            2 * self.image_embedding_size
        } else {
            0
        }
    }

    fn semi_memory_size(&self) -> i64 {
        self.image_embedding_size
    }

    fn forward(&self, obs: &BatchedObs) -> (Categorical, Tensor) {
        let embedding = embed_image(&self.conv, &obs.image);
        self.heads(&embedding)
    }

    fn forward_recurrent(
        &self,
        obs: &BatchedObs,
        memory: &Tensor,
    ) -> (Categorical, Tensor, Tensor) {
        let rnn = self.memory_rnn.as_ref().expect("forward_recurrent on a memoryless policy");
        let embedding = embed_image(&self.conv, &obs.image);

        let semi = self.image_embedding_size;
        let h = memory.narrow(1, 0, semi).unsqueeze(0).contiguous();
        let c = memory.narrow(1, semi, semi).unsqueeze(0).contiguous();

        let (_, state) = rnn.seq_init(&embedding.unsqueeze(1), &nn::LSTMState((h, c)));
        let (new_h, new_c) = (state.0 .0, state.0 .1);

        let hidden = new_h.squeeze_dim(0);
        let (dist, value) = self.heads(&hidden);
        let memory = Tensor::cat(&[hidden, new_c.squeeze_dim(0)], 1);
        (dist, value, memory)
    }

    fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }
}
