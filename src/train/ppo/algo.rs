//! The curiosity-driven PPO algorithm
//!
//! [`IcmPpoAlgo`] owns the environment pool, the actor-critic model, the
//! curiosity module, and their two independent Adam optimizers. Each cycle
//! is `collect_experiences()` followed by `update_parameters(&mut exps)`.

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::thread_rng;
use tch::{nn, nn::OptimizerConfig, Device, Kind, Tensor};

use crate::buffer::gae;
use crate::buffer::rollout::{env_major, ExperienceBatch, RolloutBuffer};
use crate::curiosity::{Icm, IcmConfig};
use crate::env::pool::EnvPool;
use crate::env::Environment;
use crate::obs::{BatchedObs, GridObs, ObsPreprocessor};
use crate::policy::ActorCritic;
use crate::train::ppo::config::IcmPpoConfig;
use crate::train::ppo::indexing::batch_starting_indexes;
use crate::train::ppo::stats::{EpisodeTracker, RolloutLogs, UpdateLogs};

/// Optional reward reshaping hook: (next observation, action, reward, done)
pub type RewardReshaper = Box<dyn Fn(&GridObs, i64, f32, bool) -> f32 + Send>;

/// PPO with intrinsic curiosity bonuses
///
/// Collects fixed-horizon rollouts from a pool of environments, scores
/// transitions with the curiosity module, trains the curiosity module on
/// its own epoch/batch schedule, and runs recurrence-aware clipped PPO
/// updates on the policy. The policy and curiosity module have disjoint
/// parameter sets and independent optimizers; they only share the
/// transition data of the current cycle.
pub struct IcmPpoAlgo<E: Environment, A: ActorCritic> {
    config: IcmPpoConfig,
    device: Device,

    envs: EnvPool<E>,
    acmodel: A,
    preprocessor: ObsPreprocessor,
    reshape_reward: Option<RewardReshaper>,

    icm: Icm,
    optimizer: nn::Optimizer,
    optimizer_icm: nn::Optimizer,

    buffer: RolloutBuffer,
    obs: Vec<GridObs>,
    memory: Tensor,
    mask: Tensor,
    tracker: EpisodeTracker,
    batch_num: usize,
}

impl<E: Environment, A: ActorCritic> IcmPpoAlgo<E, A> {
    /// Create the algorithm and reset the environment pool
    ///
    /// Fails fast on invalid configuration, in particular when
    /// `batch_size` is not divisible by `recurrence`.
    pub fn new(
        mut envs: EnvPool<E>,
        acmodel: A,
        preprocessor: ObsPreprocessor,
        config: IcmPpoConfig,
        device: Device,
        reshape_reward: Option<RewardReshaper>,
        seed: Option<u64>,
    ) -> Result<Self> {
        config.validate()?;

        let act_dim = envs
            .action_space()
            .discrete_n()
            .ok_or_else(|| anyhow!("curiosity-driven PPO requires a discrete action space"))?
            as i64;

        let num_envs = envs.num_envs() as i64;
        let obs = envs.reset(seed)?;

        let optimizer = nn::Adam::default()
            .eps(config.adam_eps)
            .build(acmodel.var_store(), config.lr)?;

        let (_, _, channels) = preprocessor.shape();
        let icm = Icm::new(
            acmodel.semi_memory_size(),
            channels,
            act_dim,
            IcmConfig::default(),
            device,
        );
        let optimizer_icm = nn::Adam::default()
            .eps(config.adam_eps)
            .build(icm.var_store(), config.lr)?;

        let buffer = RolloutBuffer::new(
            config.num_frames_per_proc,
            num_envs,
            acmodel.memory_size(),
            device,
        );
        let memory =
            Tensor::zeros([num_envs, acmodel.memory_size().max(1)], (Kind::Float, device));
        let mask = Tensor::ones([num_envs], (Kind::Float, device));
        let tracker = EpisodeTracker::new(num_envs as usize);

        Ok(Self {
            config,
            device,
            envs,
            acmodel,
            preprocessor,
            reshape_reward,
            icm,
            optimizer,
            optimizer_icm,
            buffer,
            obs,
            memory,
            mask,
            tracker,
            batch_num: 0,
        })
    }

    /// The algorithm configuration
    pub fn config(&self) -> &IcmPpoConfig {
        &self.config
    }

    /// The actor-critic model
    pub fn acmodel(&self) -> &A {
        &self.acmodel
    }

    /// The curiosity module
    pub fn icm(&self) -> &Icm {
        &self.icm
    }

    /// Total frames per collection cycle
    pub fn num_frames(&self) -> i64 {
        self.buffer.num_frames()
    }

    /// Collect one horizon of experience and compute advantages
    ///
    /// Runs all environments for `num_frames_per_proc` steps, computes
    /// clamped intrinsic rewards over consecutive observation pairs,
    /// trains the curiosity module, and flattens everything into an
    /// env-major experience batch.
    pub fn collect_experiences(&mut self) -> Result<(ExperienceBatch, RolloutLogs)> {
        let recurrent = self.acmodel.recurrent();
        let num_steps = self.config.num_frames_per_proc;
        let num_envs = self.envs.num_envs() as i64;

        for step in 0..num_steps {
            let preprocessed = self.preprocessor.preprocess(&self.obs, self.device)?;

            let (action, value, log_prob, next_memory) = tch::no_grad(|| {
                if recurrent {
                    let masked = &self.memory * &self.mask.unsqueeze(1);
                    let (dist, value, memory) =
                        self.acmodel.forward_recurrent(&preprocessed, &masked);
                    let action = dist.sample();
                    let log_prob = dist.log_prob(&action);
                    (action, value, log_prob, Some(memory))
                } else {
                    let (dist, value) = self.acmodel.forward(&preprocessed);
                    let action = dist.sample();
                    let log_prob = dist.log_prob(&action);
                    (action, value, log_prob, None)
                }
            });

            let actions_vec: Vec<i64> = Vec::try_from(&action.to_device(Device::Cpu))
                .map_err(|e| anyhow!("failed to read actions: {e:?}"))?;
            let result = self.envs.step(&actions_vec)?;

            let done: Vec<bool> = result
                .terminated
                .iter()
                .zip(&result.truncated)
                .map(|(&t, &tr)| t || tr)
                .collect();

            let shaped_rewards: Vec<f32> = match &self.reshape_reward {
                Some(reshape) => result
                    .observations
                    .iter()
                    .zip(&actions_vec)
                    .zip(&result.rewards)
                    .zip(&done)
                    .map(|(((obs, &action), &reward), &done)| reshape(obs, action, reward, done))
                    .collect(),
                None => result.rewards.clone(),
            };

            let reward = Tensor::from_slice(&shaped_rewards).to_device(self.device);
            self.buffer.write_step(
                step,
                &self.obs,
                recurrent.then_some(&self.memory),
                &self.mask,
                &action,
                &value,
                &reward,
                &log_prob,
            );

            self.obs = result.observations;
            if let Some(memory) = next_memory {
                self.memory = memory;
            }
            let mask_values: Vec<f32> =
                done.iter().map(|&d| if d { 0.0 } else { 1.0 }).collect();
            self.mask = Tensor::from_slice(&mask_values).to_device(self.device);

            self.tracker.record_step(&result.rewards, &shaped_rewards, &done);
        }

        // Bootstrap value for the post-horizon observation.
        let preprocessed = self.preprocessor.preprocess(&self.obs, self.device)?;
        let next_value = tch::no_grad(|| {
            if recurrent {
                let masked = &self.memory * &self.mask.unsqueeze(1);
                self.acmodel.forward_recurrent(&preprocessed, &masked).1
            } else {
                self.acmodel.forward(&preprocessed).1
            }
        });

        // Consecutive observation pairs, env-major, with per-env actions
        // and masks trimmed of each block's final frame to match.
        let (curr, next) = self.buffer.transition_pairs();
        let curr_states = self.preprocessor.preprocess(&curr, self.device)?;
        let next_states = self.preprocessor.preprocess(&next, self.device)?;

        let drop_block_final = |grid: &Tensor| {
            env_major(grid)
                .reshape([num_envs, num_steps])
                .narrow(1, 0, num_steps - 1)
                .reshape([-1])
        };
        let trans_actions = drop_block_final(&self.buffer.actions);
        let trans_mask = drop_block_final(&self.buffer.masks);

        let intrinsic = tch::no_grad(|| {
            let (intrinsic, _, _) =
                self.icm.forward(&trans_actions, &curr_states, &next_states, &trans_mask);
            intrinsic
                .clamp(0.0, self.config.intr_range)
                .reshape([num_envs, num_steps - 1])
                .transpose(0, 1)
        });

        self.update_curiosity(&curr_states, &next_states, &trans_actions, &trans_mask);

        gae::compute_advantages(
            &mut self.buffer,
            &intrinsic,
            &next_value,
            &self.mask,
            self.config.discount,
            self.config.gae_lambda,
        );

        let obs_batch = self.preprocessor.preprocess(&self.buffer.flat_obs(), self.device)?;
        let exps = self.buffer.flatten(obs_batch, recurrent);
        let logs = self.tracker.finish_cycle(self.buffer.num_frames());

        Ok((exps, logs))
    }

    /// Train the curiosity module on the cycle's transitions
    ///
    /// Runs `icm_epochs` passes of shuffled `icm_batch_size` chunks; each
    /// chunk takes one optimizer step on the curiosity parameters only.
    fn update_curiosity(
        &mut self,
        curr_states: &BatchedObs,
        next_states: &BatchedObs,
        actions: &Tensor,
        mask: &Tensor,
    ) {
        let num_transitions = actions.size()[0];
        if num_transitions == 0 {
            return;
        }

        for epoch in 0..self.config.icm_epochs {
            let mut indexes: Vec<i64> = (0..num_transitions).collect();
            indexes.shuffle(&mut thread_rng());

            let mut epoch_forw_loss = 0.0;
            let mut epoch_inv_loss = 0.0;
            for chunk in indexes.chunks(self.config.icm_batch_size) {
                let chunk = Tensor::from_slice(chunk).to_device(self.device);
                let (_, inv_loss, forw_loss) = self.icm.forward(
                    &actions.index_select(0, &chunk),
                    &curr_states.index_select(&chunk),
                    &next_states.index_select(&chunk),
                    &mask.index_select(0, &chunk),
                );
                epoch_forw_loss += forw_loss.double_value(&[]);
                epoch_inv_loss += inv_loss.double_value(&[]);

                let loss = Icm::training_loss(&inv_loss, &forw_loss);
                self.optimizer_icm.zero_grad();
                loss.backward();
                self.optimizer_icm.step();
            }
            tracing::debug!(
                epoch,
                forward_loss = epoch_forw_loss,
                inverse_loss = epoch_inv_loss,
                "curiosity update"
            );
        }
    }

    /// Run the clipped PPO update epochs over an experience batch
    ///
    /// For recurrent policies the batch's memory field is rewritten with
    /// each sub-step's detached next memory, so later epochs start their
    /// sequences from refreshed states.
    pub fn update_parameters(&mut self, exps: &mut ExperienceBatch) -> Result<UpdateLogs> {
        let recurrence = self.config.recurrence;
        let recurrent = self.acmodel.recurrent();

        let mut log_entropies = Vec::new();
        let mut log_values = Vec::new();
        let mut log_policy_losses = Vec::new();
        let mut log_value_losses = Vec::new();
        let mut log_grad_norms = Vec::new();

        for _ in 0..self.config.epochs {
            let batches = batch_starting_indexes(
                exps.len(),
                self.config.num_frames_per_proc,
                recurrence,
                self.config.batch_size,
                self.batch_num,
            );
            self.batch_num += 1;

            for starts in batches {
                let starts = Tensor::from_slice(&starts).to_device(self.device);

                let mut batch_entropy = 0.0;
                let mut batch_value = 0.0;
                let mut batch_policy_loss = 0.0;
                let mut batch_value_loss = 0.0;
                let mut sub_losses = Vec::with_capacity(recurrence as usize);

                let mut memory =
                    exps.memory.as_ref().map(|memory| memory.index_select(0, &starts));

                for i in 0..recurrence {
                    let sb = exps.index(&(&starts + i));

                    let (dist, value) = if recurrent {
                        let masked = memory.as_ref().unwrap() * &sb.mask;
                        let (dist, value, next_memory) =
                            self.acmodel.forward_recurrent(&sb.obs, &masked);
                        if i < recurrence - 1 {
                            if let Some(stored) = exps.memory.as_mut() {
                                let _ = stored.index_put_(
                                    &[Some(&starts + (i + 1))],
                                    &next_memory.detach(),
                                    false,
                                );
                            }
                        }
                        memory = Some(next_memory);
                        (dist, value)
                    } else {
                        self.acmodel.forward(&sb.obs)
                    };

                    let entropy = dist.entropy().mean(Kind::Float);

                    let ratio = (dist.log_prob(&sb.action) - &sb.log_prob).exp();
                    let surr1 = &ratio * &sb.advantage;
                    let surr2 = ratio.clamp(1.0 - self.config.clip_eps, 1.0 + self.config.clip_eps)
                        * &sb.advantage;
                    let policy_loss = -surr1.minimum(&surr2).mean(Kind::Float);

                    let value_clipped = &sb.value
                        + (&value - &sb.value).clamp(-self.config.clip_eps, self.config.clip_eps);
                    let surr1 = (&value - &sb.returns).square();
                    let surr2 = (value_clipped - &sb.returns).square();
                    let value_loss = surr1.maximum(&surr2).mean(Kind::Float);

                    let loss = &policy_loss - self.config.entropy_coef * &entropy
                        + self.config.value_loss_coef * &value_loss;

                    batch_entropy += entropy.double_value(&[]);
                    batch_value += value.mean(Kind::Float).double_value(&[]);
                    batch_policy_loss += policy_loss.double_value(&[]);
                    batch_value_loss += value_loss.double_value(&[]);
                    sub_losses.push(loss);
                }

                let batch_loss = Tensor::stack(&sub_losses, 0).mean(Kind::Float);

                self.optimizer.zero_grad();
                batch_loss.backward();
                let grad_norm = global_grad_norm(self.acmodel.var_store());
                self.optimizer.clip_grad_norm(self.config.max_grad_norm);
                self.optimizer.step();

                let scale = recurrence as f64;
                log_entropies.push(batch_entropy / scale);
                log_values.push(batch_value / scale);
                log_policy_losses.push(batch_policy_loss / scale);
                log_value_losses.push(batch_value_loss / scale);
                log_grad_norms.push(grad_norm);
            }
        }

        Ok(UpdateLogs {
            entropy: mean(&log_entropies),
            value: mean(&log_values),
            policy_loss: mean(&log_policy_losses),
            value_loss: mean(&log_value_losses),
            grad_norm: mean(&log_grad_norms),
        })
    }
}

/// Pre-clip global gradient norm over a var store's trainable parameters
fn global_grad_norm(vs: &nn::VarStore) -> f64 {
    vs.trainable_variables()
        .iter()
        .map(|t| {
            let grad = t.grad();
            if grad.defined() {
                grad.norm().double_value(&[]).powi(2)
            } else {
                0.0
            }
        })
        .sum::<f64>()
        .sqrt()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
