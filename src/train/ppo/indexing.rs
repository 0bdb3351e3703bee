//! Recurrence-aware minibatch indexing
//!
//! Minibatches for the policy trainer are built from *starting* offsets:
//! each start plus its `recurrence` consecutive frames forms one recurrent
//! sub-sequence. Starts are every `recurrence`-th frame, permuted. On
//! odd-numbered calls the starts whose sub-sequence would run into the
//! next environment's block are dropped and the remainder shifted by half
//! a recurrence, so sequence alignment varies between passes.

use rand::seq::SliceRandom;
use rand::thread_rng;

/// Generate minibatch starting offsets for one pass over the experience
/// batch
///
/// # Arguments
///
/// * `num_frames` - Total frames in the batch (`num_envs * horizon`)
/// * `num_frames_per_proc` - Horizon, i.e. frames per environment block
/// * `recurrence` - Length of each recurrent sub-sequence
/// * `batch_size` - Frames per minibatch; each minibatch gets
///   `batch_size / recurrence` starting offsets
/// * `batch_num` - Call counter; odd calls drop block-final starts and
///   shift by `recurrence / 2`
///
/// # Returns
///
/// Starting offsets grouped per minibatch.
pub fn batch_starting_indexes(
    num_frames: i64,
    num_frames_per_proc: i64,
    recurrence: i64,
    batch_size: i64,
    batch_num: usize,
) -> Vec<Vec<i64>> {
    let mut indexes: Vec<i64> = (0..num_frames).step_by(recurrence as usize).collect();
    indexes.shuffle(&mut thread_rng());

    if batch_num % 2 == 1 {
        indexes.retain(|&i| (i + recurrence) % num_frames_per_proc != 0);
        for index in &mut indexes {
            *index += recurrence / 2;
        }
    }

    let num_indexes = (batch_size / recurrence).max(1) as usize;
    indexes.chunks(num_indexes).map(|chunk| chunk.to_vec()).collect()
}
