//! Experiment drivers.
//!
//! [`ExperimentRunner`] wires one interactive episode together end to end:
//! config resolution, device selection, policy construction, environment
//! setup, the step loop and observer fan-out. [`compare`] evaluates a list
//! of policies over seeded episode batches against the reactive crowd.

use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::{EnvConfig, PolicyConfig, load_json, resolve_paths};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::metrics::{EpisodeRecord, Summary, summarize};
use crate::observers::{Observer, Plotter, Video, notify};
use crate::policies::{InteractivePolicy, Policy, PolicyKind, PolicyRegistry};
use crate::simulation::{CrowdSim, Phase, Scenario, Status};

/// Step cap for interactive episodes, matching the default time budget of
/// one hundred quarter-second steps.
pub const DEFAULT_MAX_STEPS: u64 = 100;

/// Everything one interactive evaluation episode needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub env_config: PathBuf,
    pub policy_config: PathBuf,
    pub policy: String,
    pub model_dir: Option<PathBuf>,
    /// Load the imitation-learning checkpoint instead of the RL one.
    pub il: bool,
    pub gpu: bool,
    pub visualize: bool,
    pub phase: Phase,
    pub test_case: Option<u64>,
    pub square: bool,
    pub circle: bool,
    pub video_file: Option<PathBuf>,
    pub plot_file: Option<PathBuf>,
    /// Command script for the teleoperated human.
    pub teleop: Option<PathBuf>,
    pub max_steps: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            env_config: PathBuf::from("configs/env.json"),
            policy_config: PathBuf::from("configs/policy.json"),
            policy: "weaver".into(),
            model_dir: None,
            il: false,
            gpu: false,
            visualize: false,
            phase: Phase::Test,
            test_case: None,
            square: false,
            circle: false,
            video_file: None,
            plot_file: None,
            teleop: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// How an interactive episode ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOutcome {
    /// Status of the last step taken; `None` when the tracked human began
    /// on its goal and the loop never ran.
    pub status: Option<Status>,
    pub global_time: f64,
    pub steps: u64,
}

pub struct ExperimentRunner {
    options: RunOptions,
}

impl ExperimentRunner {
    pub fn new(options: RunOptions) -> Self {
        ExperimentRunner { options }
    }

    /// Runs one episode against a single externally driven human.
    ///
    /// The loop keeps stepping until that human reaches its destination or
    /// the step cap trips, so the robot's own success, collision or timeout
    /// does not cut the interaction short.
    pub fn run(&self) -> Result<RunOutcome> {
        let options = &self.options;
        let kind: PolicyKind = options.policy.parse()?;
        if kind.trainable() && options.model_dir.is_none() {
            return Err(Error::MissingModelDir(kind));
        }

        let paths = resolve_paths(
            &options.env_config,
            &options.policy_config,
            options.model_dir.as_deref(),
            options.il,
        );
        let device = Device::pick(options.gpu);
        info!("Using device: {device}");

        let registry = PolicyRegistry::global();
        let mut robot_policy = registry
            .create(kind)
            .ok_or_else(|| Error::UnknownPolicy(options.policy.clone()))?;
        let policy_config: PolicyConfig = load_json(&paths.policy_config)?;
        robot_policy.configure(&policy_config)?;
        if robot_policy.trainable() {
            if let Some(weights) = &paths.weights {
                info!("Loading policy weights from {}", weights.display());
                robot_policy.load_weights(weights)?;
            }
        }

        let env_config: EnvConfig = load_json(&paths.env_config)?;
        let mut env = CrowdSim::new(env_config);
        // Interactive evaluation is one on one.
        env.set_human_count(1);

        let human_policy: Box<dyn Policy> = match &options.teleop {
            Some(script) => Box::new(InteractivePolicy::from_script(script)?),
            None => registry
                .create(PolicyKind::Interactive)
                .ok_or_else(|| Error::UnknownPolicy(PolicyKind::Interactive.name().into()))?,
        };
        env.human_mut(0).set_policy(human_policy);
        env.robot_mut().set_policy(robot_policy);

        if options.square {
            env.set_test_scenario(Scenario::SquareCrossing);
        }
        if options.circle {
            env.set_test_scenario(Scenario::CircleCrossing);
        }

        let view = env.view();
        if let Some(policy) = env.robot_mut().policy_mut() {
            policy.set_phase(options.phase);
            policy.set_device(device);
            policy.set_env(view);
            if let Some(safety) = policy.safety_space_mut() {
                *safety = 0.0;
                info!("Reactive safety space zeroed for the non-cooperative crowd");
            }
        }
        env.robot().log_summary();

        let mut observers: Vec<Box<dyn Observer>> = Vec::new();
        if let Some(path) = &options.plot_file {
            observers.push(Box::new(Plotter::new(path)));
        }
        if let Some(path) = &options.video_file {
            observers.push(Box::new(Video::new(path)));
        }

        let mut ob = env.reset(options.phase, options.test_case)?;
        env.set_interactive_human();

        let mut last_position = env.robot().position;
        let mut status: Option<Status> = None;
        let mut steps: u64 = 0;
        while !env.humans()[0].reached_destination() && steps < options.max_steps {
            let action = env.robot_mut().act(&ob);
            let result = env.step(action);
            ob = result.observation;
            status = Some(result.status);
            notify(&mut observers, &env.state())?;
            if options.visualize {
                env.render();
            }
            let position = env.robot().position;
            debug!(
                "Robot speed: {:.2} m/s",
                position.distance(last_position) / view.time_step
            );
            last_position = position;
            steps += 1;
        }

        for observer in observers.iter_mut() {
            observer.finalize()?;
        }

        match status {
            Some(status) => info!(
                "It takes {:.2} seconds to finish. Final status is {status}",
                env.global_time()
            ),
            None => info!("The tracked human started on its destination; no steps were taken"),
        }
        if env.robot().visible && status == Some(Status::ReachGoal) {
            let times = env.human_times();
            let average = times.iter().sum::<f64>() / times.len().max(1) as f64;
            info!("Average time for humans to reach goal: {average:.2}");
        }

        Ok(RunOutcome {
            status,
            global_time: env.global_time(),
            steps,
        })
    }
}

/// Batch evaluation settings.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub env_config: PathBuf,
    pub policy_config: PathBuf,
    pub model_dir: Option<PathBuf>,
    pub il: bool,
    pub gpu: bool,
    pub policies: Vec<String>,
    pub episodes: u64,
    pub max_steps: u64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        CompareOptions {
            env_config: PathBuf::from("configs/env.json"),
            policy_config: PathBuf::from("configs/policy.json"),
            model_dir: None,
            il: false,
            gpu: false,
            policies: vec!["linear".into(), "social_force".into()],
            episodes: 100,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompareOutcome {
    pub records: Vec<EpisodeRecord>,
    pub summaries: Vec<Summary>,
}

/// Evaluates each policy over the same seeded test cases against the full
/// reactive crowd. Episodes here end at the robot's own terminal status,
/// which is what the aggregate rates are about.
pub fn compare(options: &CompareOptions) -> Result<CompareOutcome> {
    let device = Device::pick(options.gpu);
    info!("Using device: {device}");

    let mut records = Vec::new();
    let mut summaries = Vec::new();
    for name in &options.policies {
        let kind: PolicyKind = name.parse()?;
        if kind.trainable() && options.model_dir.is_none() {
            return Err(Error::MissingModelDir(kind));
        }
        let paths = resolve_paths(
            &options.env_config,
            &options.policy_config,
            options.model_dir.as_deref(),
            options.il,
        );
        let policy_config: PolicyConfig = load_json(&paths.policy_config)?;
        let env_config: EnvConfig = load_json(&paths.env_config)?;
        let time_limit = env_config.env.time_limit;

        let registry = PolicyRegistry::global();
        let mut robot_policy = registry
            .create(kind)
            .ok_or_else(|| Error::UnknownPolicy(name.clone()))?;
        robot_policy.configure(&policy_config)?;
        if robot_policy.trainable() {
            if let Some(weights) = &paths.weights {
                robot_policy.load_weights(weights)?;
            }
        }

        let mut env = CrowdSim::new(env_config);
        let view = env.view();
        robot_policy.set_phase(Phase::Test);
        robot_policy.set_device(device);
        robot_policy.set_env(view);
        env.robot_mut().set_policy(robot_policy);
        for index in 0..env.humans().len() {
            let mut crowd_policy = registry
                .create(PolicyKind::SocialForce)
                .ok_or_else(|| Error::UnknownPolicy(PolicyKind::SocialForce.name().into()))?;
            crowd_policy.configure(&policy_config)?;
            crowd_policy.set_env(view);
            env.human_mut(index).set_policy(crowd_policy);
        }

        info!("Evaluating {kind} over {} episodes", options.episodes);
        let pb = ProgressBar::new(options.episodes);
        let style = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style.progress_chars("█▓░"));

        let mut policy_records = Vec::with_capacity(options.episodes as usize);
        for case in 0..options.episodes {
            let mut ob = env.reset(Phase::Test, Some(case))?;
            let mut cumulative_reward = 0.0;
            let mut steps: u64 = 0;
            let status = loop {
                let action = env.robot_mut().act(&ob);
                let result = env.step(action);
                ob = result.observation;
                cumulative_reward += result.reward;
                steps += 1;
                if result.done || steps >= options.max_steps {
                    break result.status;
                }
            };
            policy_records.push(EpisodeRecord {
                policy: name.clone(),
                case_id: case,
                status: status.to_string(),
                nav_time: env.global_time(),
                steps,
                cumulative_reward,
                min_separation: env.min_separation(),
            });
            pb.inc(1);
        }
        pb.finish_with_message(format!("{kind} done"));

        let summary = summarize(name, time_limit, &policy_records);
        info!(
            "{}: success {:.0}%, collision {:.0}%, timeout {:.0}%, avg nav time {:.2}s",
            summary.policy,
            summary.success_rate * 100.0,
            summary.collision_rate * 100.0,
            summary.timeout_rate * 100.0,
            summary.avg_nav_time
        );
        summaries.push(summary);
        records.extend(policy_records);
    }

    Ok(CompareOutcome { records, summaries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainable_policies_demand_a_model_dir_before_anything_else() {
        // Config paths that do not exist: the precondition must fire before
        // any file is touched.
        let options = RunOptions {
            env_config: PathBuf::from("/nonexistent/env.json"),
            policy_config: PathBuf::from("/nonexistent/policy.json"),
            policy: "sarl".into(),
            ..RunOptions::default()
        };
        let err = ExperimentRunner::new(options).run().unwrap_err();
        assert!(matches!(err, Error::MissingModelDir(PolicyKind::Sarl)));
    }

    #[test]
    fn unknown_policy_names_fail_fast() {
        let options = RunOptions {
            policy: "teleport".into(),
            ..RunOptions::default()
        };
        let err = ExperimentRunner::new(options).run().unwrap_err();
        assert!(matches!(err, Error::UnknownPolicy(name) if name == "teleport"));
    }

    #[test]
    fn compare_applies_the_same_precondition() {
        let options = CompareOptions {
            policies: vec!["cadrl".into()],
            ..CompareOptions::default()
        };
        let err = compare(&options).unwrap_err();
        assert!(matches!(err, Error::MissingModelDir(PolicyKind::Cadrl)));
    }
}
