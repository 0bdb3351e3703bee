//! End-to-end collect/update cycle tests
//!
//! Drives full training cycles on tiny configurations and checks the
//! contract of the experience batch and the returned log payloads.

use curio_rl::env::{goto::GoToEnv, pool::EnvPool};
use curio_rl::obs::ObsPreprocessor;
use curio_rl::policy::{ActorCritic, GridPolicy, GridPolicyConfig};
use curio_rl::train::{IcmPpoAlgo, IcmPpoConfig};
use tch::{Device, Kind, Tensor};

const GRID: i64 = 7;
const CHANNELS: i64 = 3;
const ACTIONS: i64 = 3;

fn tiny_config() -> IcmPpoConfig {
    IcmPpoConfig::new()
        .num_frames_per_proc(4)
        .recurrence(2)
        .batch_size(4)
        .epochs(2)
        .icm_epochs(1)
        .icm_batch_size(4)
}

fn make_algo(
    config: IcmPpoConfig,
    use_memory: bool,
) -> IcmPpoAlgo<GoToEnv, GridPolicy> {
    let device = Device::Cpu;
    let envs = EnvPool::new(|| GoToEnv::go_to_obj(GRID, 2), 2);
    let policy = GridPolicy::new(
        GRID,
        GRID,
        CHANNELS,
        ACTIONS,
        GridPolicyConfig { use_memory, ..Default::default() },
        device,
    );
    let preprocessor = ObsPreprocessor::new(GRID, GRID, CHANNELS);
    IcmPpoAlgo::new(envs, policy, preprocessor, config, device, None, Some(7)).unwrap()
}

fn snapshot(vs: &tch::nn::VarStore) -> Vec<Tensor> {
    vs.trainable_variables()
        .iter()
        .map(|t| {
            let mut copy = t.zeros_like();
            copy.copy_(t);
            copy
        })
        .collect()
}

fn max_abs_diff(a: &[Tensor], b: &[Tensor]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs().max().double_value(&[]))
        .fold(0.0, f64::max)
}

#[test]
fn test_construction_rejects_indivisible_batch_size() {
    let device = Device::Cpu;
    let envs = EnvPool::new(|| GoToEnv::go_to_obj(GRID, 2), 2);
    let policy =
        GridPolicy::new(GRID, GRID, CHANNELS, ACTIONS, GridPolicyConfig::default(), device);
    let preprocessor = ObsPreprocessor::new(GRID, GRID, CHANNELS);

    let config = tiny_config().batch_size(5);
    let result = IcmPpoAlgo::new(envs, policy, preprocessor, config, device, None, None);
    assert!(result.is_err());
}

#[test]
fn test_experience_batch_contract() {
    let mut algo = make_algo(tiny_config(), false);
    let (exps, logs) = algo.collect_experiences().unwrap();

    // Every field has exactly num_envs * horizon entries.
    let n = 2 * 4;
    assert_eq!(exps.len(), n);
    assert_eq!(exps.obs.image.size()[0], n);
    assert_eq!(exps.mask.size(), vec![n, 1]);
    assert_eq!(exps.action.size(), vec![n]);
    assert_eq!(exps.value.size(), vec![n]);
    assert_eq!(exps.reward.size(), vec![n]);
    assert_eq!(exps.advantage.size(), vec![n]);
    assert_eq!(exps.returns.size(), vec![n]);
    assert_eq!(exps.log_prob.size(), vec![n]);
    assert!(exps.memory.is_none());

    // Masks only ever hold 0 or 1, and each env block starts alive.
    let masks: Vec<f32> = Vec::try_from(exps.mask.reshape([-1])).unwrap();
    for &m in &masks {
        assert!(m == 0.0 || m == 1.0);
    }
    assert_eq!(masks[0], 1.0);
    assert_eq!(masks[4], 1.0);

    // returns = value + advantage, elementwise.
    let diff: f64 = (&exps.returns - (&exps.value + &exps.advantage))
        .abs()
        .max()
        .double_value(&[]);
    assert!(diff < 1e-6);

    assert_eq!(logs.num_frames, n);
    assert!(!logs.return_per_episode.is_empty());
    assert_eq!(logs.return_per_episode.len(), logs.num_frames_per_episode.len());
}

#[test]
fn test_full_cycle_produces_finite_update_logs() {
    let mut algo = make_algo(tiny_config(), false);

    let (mut exps, _) = algo.collect_experiences().unwrap();
    let logs = algo.update_parameters(&mut exps).unwrap();

    assert!(logs.entropy.is_finite());
    assert!(logs.value.is_finite());
    assert!(logs.policy_loss.is_finite());
    assert!(logs.value_loss.is_finite());
    assert!(logs.grad_norm.is_finite());
    assert!(logs.grad_norm >= 0.0);
}

#[test]
fn test_recurrent_full_cycle() {
    let mut algo = make_algo(tiny_config(), true);

    let (mut exps, _) = algo.collect_experiences().unwrap();
    let memory = exps.memory.as_ref().expect("recurrent batch carries memory");
    assert_eq!(memory.size(), vec![8, 128]);

    let logs = algo.update_parameters(&mut exps).unwrap();
    assert!(logs.entropy.is_finite());
    assert!(logs.grad_norm.is_finite());

    // A second cycle keeps working with the carried-over memory and mask.
    let (mut exps, _) = algo.collect_experiences().unwrap();
    let logs = algo.update_parameters(&mut exps).unwrap();
    assert!(logs.policy_loss.is_finite());
}

#[test]
fn test_consecutive_cycles_accumulate_logs() {
    let mut algo = make_algo(tiny_config(), false);

    for _ in 0..3 {
        let (mut exps, rollout_logs) = algo.collect_experiences().unwrap();
        assert_eq!(rollout_logs.num_frames, 8);
        algo.update_parameters(&mut exps).unwrap();
    }
}

#[test]
fn test_icm_epochs_zero_leaves_curiosity_unchanged() {
    let mut algo = make_algo(tiny_config().icm_epochs(0), false);

    let before = snapshot(algo.icm().var_store());
    let (exps, _) = algo.collect_experiences().unwrap();
    let after = snapshot(algo.icm().var_store());

    // No curiosity updates ran, but advantages were still computed from
    // the pre-update model.
    assert_eq!(max_abs_diff(&before, &after), 0.0);
    let adv: Vec<f32> = Vec::try_from(exps.advantage).unwrap();
    assert!(adv.iter().all(|a| a.is_finite()));
}

#[test]
fn test_icm_training_moves_parameters() {
    let mut algo = make_algo(tiny_config(), false);

    let before = snapshot(algo.icm().var_store());
    algo.collect_experiences().unwrap();
    let after = snapshot(algo.icm().var_store());

    assert!(max_abs_diff(&before, &after) > 0.0);
}

#[test]
fn test_policy_update_leaves_curiosity_untouched() {
    let mut algo = make_algo(tiny_config(), false);
    let (mut exps, _) = algo.collect_experiences().unwrap();

    let icm_before = snapshot(algo.icm().var_store());
    let policy_before = snapshot(algo.acmodel().var_store());
    algo.update_parameters(&mut exps).unwrap();

    assert_eq!(max_abs_diff(&icm_before, &snapshot(algo.icm().var_store())), 0.0);
    assert!(max_abs_diff(&policy_before, &snapshot(algo.acmodel().var_store())) > 0.0);
}

#[test]
fn test_intrinsic_rewards_stay_within_clamp_range() {
    let algo = make_algo(tiny_config(), false);
    let prep = ObsPreprocessor::new(GRID, GRID, CHANNELS);
    let intr_range = algo.config().intr_range;

    // Score a batch of synthetic transitions with the algorithm's own
    // curiosity module and apply the training clamp.
    let obs_len = prep.obs_len();
    let curr: Vec<_> = (0..6)
        .map(|i| curio_rl::obs::GridObs::new(vec![i as f32; obs_len]))
        .collect();
    let next: Vec<_> = (0..6)
        .map(|i| curio_rl::obs::GridObs::new(vec![(i + 1) as f32; obs_len]))
        .collect();
    let actions = Tensor::from_slice(&[0i64, 1, 2, 0, 1, 2]);
    let mask = Tensor::from_slice(&[1.0f32, 1.0, 0.0, 1.0, 1.0, 1.0]);

    let (intrinsic, _, _) = algo.icm().forward(
        &actions,
        &prep.preprocess(&curr, Device::Cpu).unwrap(),
        &prep.preprocess(&next, Device::Cpu).unwrap(),
        &mask,
    );
    let clamped: Vec<f32> =
        Vec::try_from(intrinsic.clamp(0.0, intr_range).to_kind(Kind::Float)).unwrap();

    for r in clamped {
        assert!(r >= 0.0 && r <= intr_range as f32);
    }
}
