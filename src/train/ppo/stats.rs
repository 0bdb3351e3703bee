//! Rollout and update statistics
//!
//! [`EpisodeTracker`] accumulates per-env episode returns and frame counts
//! during collection and produces rolling logs of recently completed
//! episodes; [`RolloutLogs`] and [`UpdateLogs`] are the log payloads the
//! two training-loop entry points return.

use serde::Serialize;

/// Per-cycle rollout statistics
#[derive(Debug, Clone, Serialize)]
pub struct RolloutLogs {
    /// Raw returns of recently completed episodes
    pub return_per_episode: Vec<f32>,

    /// Reshaped returns of recently completed episodes
    pub reshaped_return_per_episode: Vec<f32>,

    /// Lengths of recently completed episodes, in frames
    pub num_frames_per_episode: Vec<f32>,

    /// Total frames collected this cycle
    pub num_frames: i64,
}

/// Averaged statistics from one `update_parameters` call
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UpdateLogs {
    /// Mean policy entropy
    pub entropy: f64,

    /// Mean value estimate
    pub value: f64,

    /// Mean clipped-surrogate policy loss
    pub policy_loss: f64,

    /// Mean clipped value loss
    pub value_loss: f64,

    /// Mean pre-clip gradient norm
    pub grad_norm: f64,
}

/// Running per-env episode accumulators with rolling completion logs
///
/// Accumulators reset to zero the moment their episode completes; the
/// rolling logs keep enough completed episodes to report
/// `max(done_count, num_envs)` of them per cycle.
#[derive(Debug)]
pub struct EpisodeTracker {
    num_envs: usize,

    episode_return: Vec<f32>,
    episode_reshaped_return: Vec<f32>,
    episode_frames: Vec<f32>,

    done_counter: usize,
    log_return: Vec<f32>,
    log_reshaped_return: Vec<f32>,
    log_frames: Vec<f32>,
}

impl EpisodeTracker {
    /// Create a tracker for `num_envs` environments
    pub fn new(num_envs: usize) -> Self {
        Self {
            num_envs,
            episode_return: vec![0.0; num_envs],
            episode_reshaped_return: vec![0.0; num_envs],
            episode_frames: vec![0.0; num_envs],
            done_counter: 0,
            log_return: vec![0.0; num_envs],
            log_reshaped_return: vec![0.0; num_envs],
            log_frames: vec![0.0; num_envs],
        }
    }

    /// Advance the accumulators by one collection step
    ///
    /// Environments whose episode just completed have their statistics
    /// snapshotted into the rolling logs and their accumulators zeroed.
    pub fn record_step(&mut self, raw_rewards: &[f32], shaped_rewards: &[f32], done: &[bool]) {
        debug_assert_eq!(raw_rewards.len(), self.num_envs);
        debug_assert_eq!(shaped_rewards.len(), self.num_envs);
        debug_assert_eq!(done.len(), self.num_envs);

        for env in 0..self.num_envs {
            self.episode_return[env] += raw_rewards[env];
            self.episode_reshaped_return[env] += shaped_rewards[env];
            self.episode_frames[env] += 1.0;

            if done[env] {
                self.done_counter += 1;
                self.log_return.push(self.episode_return[env]);
                self.log_reshaped_return.push(self.episode_reshaped_return[env]);
                self.log_frames.push(self.episode_frames[env]);

                self.episode_return[env] = 0.0;
                self.episode_reshaped_return[env] = 0.0;
                self.episode_frames[env] = 0.0;
            }
        }
    }

    /// Close out a collection cycle and produce its logs
    ///
    /// Reports the last `max(done_count, num_envs)` completed episodes,
    /// then retains only the last `num_envs` entries and resets the done
    /// counter for the next cycle.
    pub fn finish_cycle(&mut self, num_frames: i64) -> RolloutLogs {
        let keep = self.done_counter.max(self.num_envs);

        let tail = |log: &[f32]| log[log.len().saturating_sub(keep)..].to_vec();
        let logs = RolloutLogs {
            return_per_episode: tail(&self.log_return),
            reshaped_return_per_episode: tail(&self.log_reshaped_return),
            num_frames_per_episode: tail(&self.log_frames),
            num_frames,
        };

        let trim = |log: &mut Vec<f32>, n: usize| {
            let start = log.len().saturating_sub(n);
            log.drain(..start);
        };
        trim(&mut self.log_return, self.num_envs);
        trim(&mut self.log_reshaped_return, self.num_envs);
        trim(&mut self.log_frames, self.num_envs);
        self.done_counter = 0;

        logs
    }

    /// Current in-progress episode returns, one per env
    pub fn current_returns(&self) -> &[f32] {
        &self.episode_return
    }

    /// Current in-progress episode frame counts, one per env
    pub fn current_frames(&self) -> &[f32] {
        &self.episode_frames
    }
}
