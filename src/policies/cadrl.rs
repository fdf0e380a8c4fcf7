//! Value network over the self state paired with one human at a time.
//!
//! The network scores each pairwise state; a crowd is handled by taking the
//! most pessimistic pairwise value. Crude next to the attention models, but
//! it is the baseline the others grew out of.

use std::path::Path;

use tracing::debug;

use crate::config::{PolicyConfig, load_json};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::policies::network::Mlp;
use crate::policies::value::{HUMAN_DIM, SELF_DIM, ValueCore, rotate};
use crate::policies::{Policy, PolicyKind};
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, JointState};

#[derive(Debug)]
pub struct CadrlPolicy {
    core: ValueCore,
    mlp_dims: Vec<usize>,
    net: Option<Mlp>,
}

impl CadrlPolicy {
    pub fn new() -> Self {
        CadrlPolicy {
            core: ValueCore::new(),
            mlp_dims: vec![150, 100, 100, 1],
            net: None,
        }
    }

    fn value(net: &Option<Mlp>, state: &JointState) -> f64 {
        let Some(net) = net else { return 0.0 };
        let (self_features, human_features) = rotate(state);
        human_features
            .iter()
            .map(|human| {
                let mut input = self_features.clone();
                input.extend_from_slice(human);
                net.value(&input)
            })
            .fold(f64::INFINITY, f64::min)
    }
}

impl Default for CadrlPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for CadrlPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Cadrl
    }

    fn configure(&mut self, config: &PolicyConfig) -> Result<()> {
        self.core.configure(config);
        self.mlp_dims = config.cadrl.mlp_dims.clone();
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase) {
        self.core.set_phase(phase);
    }

    fn set_device(&mut self, device: Device) {
        self.core.set_device(device);
    }

    fn set_env(&mut self, env: EnvView) {
        self.core.set_env(env);
    }

    fn load_weights(&mut self, path: &Path) -> Result<()> {
        let net: Mlp = load_json(path)?;
        net.check(SELF_DIM + HUMAN_DIM, &self.mlp_dims)
            .map_err(|reason| Error::Weights {
                path: path.to_path_buf(),
                reason,
            })?;
        debug!("Loaded value network from {}", path.display());
        self.net = Some(net);
        Ok(())
    }

    fn act(&mut self, state: &JointState) -> Action {
        let CadrlPolicy { core, net, .. } = self;
        core.select_action(state, |next| Self::value(net, next))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::state::{FullState, ObservableState, Vec2};

    fn near_goal_state() -> JointState {
        JointState {
            self_state: FullState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal: Vec2::new(0.2, 0.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: vec![ObservableState {
                position: Vec2::new(6.0, 6.0),
                velocity: Vec2::ZERO,
                radius: 0.3,
            }],
        }
    }

    #[test]
    fn is_trainable() {
        let policy = CadrlPolicy::new();
        assert!(policy.trainable());
        assert_eq!(policy.kind(), PolicyKind::Cadrl);
    }

    #[test]
    fn rejects_weights_with_the_wrong_shape() {
        let mut policy = CadrlPolicy::new();
        policy.configure(&PolicyConfig::default()).unwrap();
        let wrong = Mlp::zeros(10, &[150, 100, 100, 1]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&wrong).unwrap().as_bytes())
            .unwrap();
        assert!(matches!(
            policy.load_weights(file.path()),
            Err(Error::Weights { .. })
        ));
    }

    #[test]
    fn accepts_weights_matching_the_config() {
        let mut policy = CadrlPolicy::new();
        policy.configure(&PolicyConfig::default()).unwrap();
        let net = Mlp::zeros(SELF_DIM + HUMAN_DIM, &[150, 100, 100, 1]);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&net).unwrap().as_bytes())
            .unwrap();
        policy.load_weights(file.path()).unwrap();
        // With zero weights the lookahead is reward-driven; near the goal
        // it must pick a reaching action.
        let state = near_goal_state();
        let action = policy.act(&state);
        let end = state.self_state.position + action.velocity() * 0.25;
        assert!(end.distance(state.self_state.goal) < 0.3);
    }

    #[test]
    fn pessimistic_pooling_takes_the_worst_pair() {
        // One layer, bias only on the distance feature: value grows with
        // the pairwise distance, so the closest human dominates the min.
        let mut net = Mlp::zeros(SELF_DIM + HUMAN_DIM, &[1]);
        net.layers[0].weight[0][SELF_DIM + 5] = 1.0;
        let state = JointState {
            self_state: FullState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal: Vec2::new(4.0, 0.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: vec![
                ObservableState {
                    position: Vec2::new(3.0, 0.0),
                    velocity: Vec2::ZERO,
                    radius: 0.3,
                },
                ObservableState {
                    position: Vec2::new(1.0, 0.0),
                    velocity: Vec2::ZERO,
                    radius: 0.3,
                },
            ],
        };
        let value = CadrlPolicy::value(&Some(net), &state);
        assert!((value - 1.0).abs() < 1e-9);
    }
}
