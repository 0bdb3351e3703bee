//! Train curiosity-driven PPO on the go-to-object gridworld
//!
//! # Usage
//!
//! ```bash
//! cargo run --example train_goto --release
//! ```

use anyhow::Result;
use curio_rl::env::{goto::GoToEnv, pool::EnvPool};
use curio_rl::obs::ObsPreprocessor;
use curio_rl::policy::{GridPolicy, GridPolicyConfig};
use curio_rl::train::{IcmPpoAlgo, IcmPpoConfig};
use tch::Device;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    const GRID: i64 = 7;
    const NUM_ENVS: usize = 16;
    const NUM_DISTRACTORS: usize = 3;
    const NUM_ACTIONS: i64 = 3;
    const TOTAL_FRAMES: i64 = 500_000;

    let device = Device::cuda_if_available();
    tracing::info!(?device, "starting go-to-object training");

    let envs = EnvPool::new(|| GoToEnv::go_to_obj(GRID, NUM_DISTRACTORS), NUM_ENVS);
    let policy = GridPolicy::new(
        GRID,
        GRID,
        3,
        NUM_ACTIONS,
        GridPolicyConfig { use_memory: true, ..Default::default() },
        device,
    );
    let preprocessor = ObsPreprocessor::new(GRID, GRID, 3);

    let config = IcmPpoConfig::default();
    let mut algo =
        IcmPpoAlgo::new(envs, policy, preprocessor, config, device, None, Some(1))?;

    let start = std::time::Instant::now();
    let mut frames = 0i64;
    let mut updates = 0usize;

    while frames < TOTAL_FRAMES {
        let (mut exps, rollout_logs) = algo.collect_experiences()?;
        let update_logs = algo.update_parameters(&mut exps)?;

        frames += rollout_logs.num_frames;
        updates += 1;

        if updates % 10 == 0 {
            let episodes = rollout_logs.return_per_episode.len().max(1) as f32;
            let mean_return: f32 =
                rollout_logs.return_per_episode.iter().sum::<f32>() / episodes;
            let mean_length: f32 =
                rollout_logs.num_frames_per_episode.iter().sum::<f32>() / episodes;
            let fps = frames as f64 / start.elapsed().as_secs_f64();

            tracing::info!(
                updates,
                frames,
                fps = format!("{fps:.0}"),
                mean_return = format!("{mean_return:.3}"),
                mean_length = format!("{mean_length:.1}"),
                entropy = format!("{:.3}", update_logs.entropy),
                policy_loss = format!("{:.4}", update_logs.policy_loss),
                value_loss = format!("{:.4}", update_logs.value_loss),
                grad_norm = format!("{:.3}", update_logs.grad_norm),
                "progress"
            );
        }
    }

    tracing::info!(frames, elapsed = ?start.elapsed(), "training finished");
    Ok(())
}
