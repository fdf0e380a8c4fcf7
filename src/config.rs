//! Experiment configuration.
//!
//! Two JSON documents drive an experiment: the environment config (world,
//! reward shaping, crowd makeup) and the policy config (discount, action
//! space, network shapes). Trained runs keep copies of both inside the
//! model directory, next to the serialized weights.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::simulation::Scenario;

/// Weights written at the end of imitation learning.
pub const IL_WEIGHTS: &str = "il_model.json";
/// Weights written when a run was resumed and refined.
pub const RESUMED_RL_WEIGHTS: &str = "resumed_rl_model.json";
/// Weights written at the end of reinforcement learning.
pub const RL_WEIGHTS: &str = "rl_model.json";

/// Reads and parses one JSON config document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub env: EnvSection,
    pub reward: RewardSection,
    pub sim: SimSection,
    pub robot: AgentSection,
    pub humans: AgentSection,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            env: EnvSection::default(),
            reward: RewardSection::default(),
            sim: SimSection::default(),
            // The robot is invisible to the crowd unless configured otherwise.
            robot: AgentSection {
                visible: false,
                ..AgentSection::default()
            },
            humans: AgentSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvSection {
    /// Wall-clock budget for one episode, in seconds.
    pub time_limit: f64,
    /// Simulation step, in seconds.
    pub time_step: f64,
    /// Re-sample human radii and preferred speeds on every reset.
    pub randomize_attributes: bool,
}

impl Default for EnvSection {
    fn default() -> Self {
        EnvSection {
            time_limit: 25.0,
            time_step: 0.25,
            randomize_attributes: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSection {
    pub success_reward: f64,
    pub collision_penalty: f64,
    /// Separation below which the robot is considered uncomfortably close.
    pub discomfort_dist: f64,
    pub discomfort_penalty_factor: f64,
}

impl Default for RewardSection {
    fn default() -> Self {
        RewardSection {
            success_reward: 1.0,
            collision_penalty: -0.25,
            discomfort_dist: 0.2,
            discomfort_penalty_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSection {
    pub train_val_sim: Scenario,
    pub test_sim: Scenario,
    /// Side length of the square crossing area, in metres.
    pub square_width: f64,
    /// Radius of the circle crossing layout, in metres.
    pub circle_radius: f64,
    pub human_num: usize,
}

impl Default for SimSection {
    fn default() -> Self {
        SimSection {
            train_val_sim: Scenario::CircleCrossing,
            test_sim: Scenario::CircleCrossing,
            square_width: 10.0,
            circle_radius: 4.0,
            human_num: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    /// Whether other agents can observe this one.
    pub visible: bool,
    pub radius: f64,
    pub v_pref: f64,
}

impl Default for AgentSection {
    fn default() -> Self {
        AgentSection {
            visible: true,
            radius: 0.3,
            v_pref: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub rl: RlSection,
    pub action_space: ActionSpaceSection,
    pub cadrl: MlpSection,
    pub lstm_rl: LstmSection,
    pub sarl: AttentionSection,
    pub weaver: AttentionSection,
    pub social_force: SocialForceSection,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            rl: RlSection::default(),
            action_space: ActionSpaceSection::default(),
            cadrl: MlpSection::default(),
            lstm_rl: LstmSection::default(),
            sarl: AttentionSection::default(),
            weaver: AttentionSection::weaver_default(),
            social_force: SocialForceSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RlSection {
    /// Discount factor applied per second of preferred-speed travel.
    pub gamma: f64,
    /// Random-action probability during the train phase.
    pub epsilon: f64,
}

impl Default for RlSection {
    fn default() -> Self {
        RlSection {
            gamma: 0.9,
            epsilon: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpaceSection {
    pub speed_samples: usize,
    pub rotation_samples: usize,
}

impl Default for ActionSpaceSection {
    fn default() -> Self {
        ActionSpaceSection {
            speed_samples: 5,
            rotation_samples: 16,
        }
    }
}

/// Hidden and output widths of a plain value network. The input width is
/// fixed by the featurization, so it is not listed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpSection {
    pub mlp_dims: Vec<usize>,
}

impl Default for MlpSection {
    fn default() -> Self {
        MlpSection {
            mlp_dims: vec![150, 100, 100, 1],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LstmSection {
    pub hidden_dim: usize,
    pub mlp_dims: Vec<usize>,
}

impl Default for LstmSection {
    fn default() -> Self {
        LstmSection {
            hidden_dim: 50,
            mlp_dims: vec![150, 100, 100, 1],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionSection {
    pub mlp1_dims: Vec<usize>,
    pub mlp2_dims: Vec<usize>,
    pub attention_dims: Vec<usize>,
    pub mlp3_dims: Vec<usize>,
    /// Feed the mean pairwise embedding into the attention scorer.
    pub with_global_state: bool,
}

impl Default for AttentionSection {
    fn default() -> Self {
        AttentionSection {
            mlp1_dims: vec![150, 100],
            mlp2_dims: vec![100, 50],
            attention_dims: vec![100, 100, 1],
            mlp3_dims: vec![150, 100, 100, 1],
            with_global_state: false,
        }
    }
}

impl AttentionSection {
    fn weaver_default() -> Self {
        AttentionSection {
            with_global_state: true,
            ..AttentionSection::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialForceSection {
    /// Repulsion strength, in m/s per neighbor.
    pub a: f64,
    /// Repulsion falloff length, in metres.
    pub b: f64,
    /// Extra clearance kept around bodies. Zeroed for non-cooperative runs.
    pub safety_space: f64,
    /// Neighbors beyond this range are ignored.
    pub neighbor_dist: f64,
}

impl Default for SocialForceSection {
    fn default() -> Self {
        SocialForceSection {
            a: 2.0,
            b: 0.3,
            safety_space: 0.15,
            neighbor_dist: 10.0,
        }
    }
}

/// Where the configs and weights for a run actually live after accounting
/// for an optional model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub env_config: PathBuf,
    pub policy_config: PathBuf,
    /// Present only when a model directory was given.
    pub weights: Option<PathBuf>,
}

/// Resolves config and weight locations.
///
/// With a model directory, the config basenames are looked up inside it and
/// a weight file is chosen: the imitation checkpoint when `il` is set,
/// otherwise the resumed checkpoint when one exists, otherwise the final
/// one. Without a model directory the given config paths are used as-is and
/// there are no weights.
pub fn resolve_paths(
    env_config: &Path,
    policy_config: &Path,
    model_dir: Option<&Path>,
    il: bool,
) -> ResolvedPaths {
    match model_dir {
        Some(dir) => {
            let weights = if il {
                dir.join(IL_WEIGHTS)
            } else {
                let resumed = dir.join(RESUMED_RL_WEIGHTS);
                if resumed.exists() {
                    resumed
                } else {
                    dir.join(RL_WEIGHTS)
                }
            };
            ResolvedPaths {
                env_config: in_dir(dir, env_config),
                policy_config: in_dir(dir, policy_config),
                weights: Some(weights),
            }
        }
        None => ResolvedPaths {
            env_config: env_config.to_path_buf(),
            policy_config: policy_config.to_path_buf(),
            weights: None,
        },
    }
}

fn in_dir(dir: &Path, path: &Path) -> PathBuf {
    match path.file_name() {
        Some(name) => dir.join(name),
        None => dir.to_path_buf(),
    }
}
