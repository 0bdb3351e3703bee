//! Advantage estimation over a collected horizon
//!
//! Backward GAE recursion blending the extrinsic reward with the curiosity
//! bonus. Boundary handling: the final step bootstraps from the
//! post-horizon value and mask, and receives no intrinsic bonus (there is
//! no next observation pair inside the horizon for it).

use tch::{Kind, Tensor};

use crate::buffer::rollout::RolloutBuffer;

/// Compute GAE advantages in place over the buffer's horizon
///
/// # Arguments
///
/// * `buffer` - Filled rollout grids; advantages are written back into it
/// * `intrinsic` - Clamped intrinsic rewards `[T - 1, P]`
/// * `next_value` - Bootstrap values for the post-horizon observation `[P]`
/// * `next_mask` - Episode liveness after the final step `[P]`
/// * `discount` - Discount factor gamma
/// * `gae_lambda` - GAE lambda
pub fn compute_advantages(
    buffer: &mut RolloutBuffer,
    intrinsic: &Tensor,
    next_value: &Tensor,
    next_mask: &Tensor,
    discount: f64,
    gae_lambda: f64,
) {
    let num_steps = buffer.num_steps;
    debug_assert_eq!(
        intrinsic.size(),
        vec![num_steps - 1, buffer.num_envs],
        "intrinsic reward grid shape mismatch"
    );

    let zeros = Tensor::zeros([buffer.num_envs], (Kind::Float, next_value.device()));

    for i in (0..num_steps).rev() {
        let (step_next_value, step_next_mask, next_advantage) = if i < num_steps - 1 {
            (buffer.values.get(i + 1), buffer.masks.get(i + 1), buffer.advantages.get(i + 1))
        } else {
            (next_value.shallow_clone(), next_mask.shallow_clone(), zeros.shallow_clone())
        };

        let in_reward =
            if i < num_steps - 1 { intrinsic.get(i) } else { zeros.shallow_clone() };

        // The intrinsic bonus enters the td error at double weight.
        let delta = (buffer.rewards.get(i) + &in_reward) + &in_reward
            + discount * step_next_value * &step_next_mask
            - buffer.values.get(i);
        let advantage = delta + discount * gae_lambda * next_advantage * &step_next_mask;
        buffer.advantages.get(i).copy_(&advantage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obs::GridObs;
    use tch::Device;

    fn buffer_with(
        rewards: &[&[f32]],
        values: &[&[f32]],
        masks: &[&[f32]],
    ) -> RolloutBuffer {
        let t = rewards.len() as i64;
        let p = rewards[0].len() as i64;
        let mut buffer = RolloutBuffer::new(t, p, 0, Device::Cpu);
        for step in 0..t as usize {
            let obs = vec![GridObs::new(vec![0.0]); p as usize];
            buffer.write_step(
                step as i64,
                &obs,
                None,
                &Tensor::from_slice(masks[step]),
                &Tensor::zeros([p], (tch::Kind::Int64, Device::Cpu)),
                &Tensor::from_slice(values[step]),
                &Tensor::from_slice(rewards[step]),
                &Tensor::zeros([p], (tch::Kind::Float, Device::Cpu)),
            );
        }
        buffer
    }

    fn advantages_of(buffer: &RolloutBuffer) -> Vec<Vec<f32>> {
        (0..buffer.num_steps)
            .map(|i| Vec::try_from(buffer.advantages.get(i)).unwrap())
            .collect()
    }

    #[test]
    fn test_single_step_bootstrap() {
        // T = 1: delta = r + gamma * V' * m' - V, no intrinsic term.
        let mut buffer = buffer_with(&[&[1.0]], &[&[0.5]], &[&[1.0]]);
        let intrinsic = Tensor::zeros([0, 1], (tch::Kind::Float, Device::Cpu));

        compute_advantages(
            &mut buffer,
            &intrinsic,
            &Tensor::from_slice(&[2.0f32]),
            &Tensor::from_slice(&[1.0f32]),
            0.5,
            1.0,
        );

        let adv = advantages_of(&buffer);
        assert!((adv[0][0] - (1.0 + 0.5 * 2.0 - 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_intrinsic_counts_twice_and_skips_last_step() {
        // Two steps, zero values and extrinsic rewards, lambda 0 isolates
        // the per-step delta: step 0 sees 2 * intrinsic, step 1 none.
        let mut buffer =
            buffer_with(&[&[0.0], &[0.0]], &[&[0.0], &[0.0]], &[&[1.0], &[1.0]]);
        let intrinsic = Tensor::from_slice(&[0.25f32]).view([1, 1]);

        compute_advantages(
            &mut buffer,
            &intrinsic,
            &Tensor::from_slice(&[0.0f32]),
            &Tensor::from_slice(&[1.0f32]),
            0.99,
            0.0,
        );

        let adv = advantages_of(&buffer);
        assert!((adv[0][0] - 0.5).abs() < 1e-6);
        assert!((adv[1][0] - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_mask_blocks_propagation() {
        // Env terminates after step 0 (mask at step 1 is 0): the step 1
        // reward must not leak into step 0's advantage.
        let mut buffer =
            buffer_with(&[&[0.0], &[5.0]], &[&[0.0], &[0.0]], &[&[1.0], &[0.0]]);
        let intrinsic = Tensor::zeros([1, 1], (tch::Kind::Float, Device::Cpu));

        compute_advantages(
            &mut buffer,
            &intrinsic,
            &Tensor::from_slice(&[3.0f32]),
            &Tensor::from_slice(&[1.0f32]),
            0.99,
            0.95,
        );

        let adv = advantages_of(&buffer);
        assert!((adv[0][0] - 0.0).abs() < 1e-6);
        // Step 1 still bootstraps from the post-horizon value.
        assert!((adv[1][0] - (5.0 + 0.99 * 3.0)).abs() < 1e-5);
    }

    #[test]
    fn test_lambda_recursion_accumulates() {
        let mut buffer = buffer_with(
            &[&[1.0], &[1.0], &[1.0]],
            &[&[0.0], &[0.0], &[0.0]],
            &[&[1.0], &[1.0], &[1.0]],
        );
        let intrinsic = Tensor::zeros([2, 1], (tch::Kind::Float, Device::Cpu));

        compute_advantages(
            &mut buffer,
            &intrinsic,
            &Tensor::from_slice(&[0.0f32]),
            &Tensor::from_slice(&[1.0f32]),
            1.0,
            1.0,
        );

        let adv = advantages_of(&buffer);
        // With gamma = lambda = 1 and zero values this is a plain
        // reward-to-go sum.
        assert!((adv[0][0] - 3.0).abs() < 1e-6);
        assert!((adv[1][0] - 2.0).abs() < 1e-6);
        assert!((adv[2][0] - 1.0).abs() < 1e-6);
    }
}
