//! In-house attention variant.
//!
//! Same skeleton as the plain attention policy, with two changes that came
//! out of evaluating it on dense crossings: the attention scorer always
//! sees the crowd mean, and it additionally sees how far the agent still
//! has to travel. Importance then shifts between nearby bodies and the
//! goal line as the episode progresses.

use std::path::Path;

use tracing::debug;

use crate::config::{AttentionSection, PolicyConfig, load_json};
use crate::device::Device;
use crate::error::Result;
use crate::policies::network::softmax;
use crate::policies::sarl::{SarlWeights, check_bundle, elementwise_mean};
use crate::policies::value::{ValueCore, rotate};
use crate::policies::{Policy, PolicyKind};
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, JointState};

#[derive(Debug)]
pub struct WeaverPolicy {
    core: ValueCore,
    section: AttentionSection,
    net: Option<SarlWeights>,
}

impl WeaverPolicy {
    pub fn new() -> Self {
        WeaverPolicy {
            core: ValueCore::new(),
            section: AttentionSection::default(),
            net: None,
        }
    }

    fn value(net: &Option<SarlWeights>, state: &JointState) -> f64 {
        let Some(net) = net else { return 0.0 };
        let (self_features, human_features) = rotate(state);
        let goal_distance = self_features[0];

        let embeddings: Vec<Vec<f64>> = human_features
            .iter()
            .map(|human| {
                let mut input = self_features.clone();
                input.extend_from_slice(human);
                net.mlp1.forward(&input)
            })
            .collect();

        let mean_embedding = elementwise_mean(&embeddings);

        let scores: Vec<f64> = embeddings
            .iter()
            .map(|embedding| {
                let mut input = embedding.clone();
                input.extend_from_slice(&mean_embedding);
                input.push(goal_distance);
                net.attention.value(&input)
            })
            .collect();
        let weights = softmax(&scores);

        let mut crowd = vec![0.0; net.mlp2.out_dim()];
        for (embedding, weight) in embeddings.iter().zip(&weights) {
            for (slot, component) in crowd.iter_mut().zip(net.mlp2.forward(embedding)) {
                *slot += weight * component;
            }
        }

        let mut input = self_features;
        input.extend_from_slice(&crowd);
        net.mlp3.value(&input)
    }
}

impl Default for WeaverPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for WeaverPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Weaver
    }

    fn configure(&mut self, config: &PolicyConfig) -> Result<()> {
        self.core.configure(config);
        self.section = config.weaver.clone();
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
        let net: SarlWeights = load_json(path)?;
        // The scorer always sees the crowd mean plus the goal distance.
        check_bundle(&net, &self.section, true, 1, path)?;
        debug!("Loaded weaver value network from {}", path.display());
        self.net = Some(net);
        Ok(())
    }

    fn act(&mut self, state: &JointState) -> Action {
        let WeaverPolicy { core, net, .. } = self;
        core.select_action(state, |next| Self::value(net, next))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::Error;
    use crate::policies::network::Mlp;
    use crate::policies::value::{HUMAN_DIM, SELF_DIM};
    use crate::state::{FullState, ObservableState, Vec2};

    fn weaver_shaped_weights() -> SarlWeights {
        SarlWeights {
            mlp1: Mlp::zeros(SELF_DIM + HUMAN_DIM, &[150, 100]),
            mlp2: Mlp::zeros(100, &[100, 50]),
            // 100 embedding + 100 mean + 1 goal distance.
            attention: Mlp::zeros(201, &[100, 100, 1]),
            mlp3: Mlp::zeros(SELF_DIM + 50, &[150, 100, 100, 1]),
        }
    }

    fn write_weights(weights: &SarlWeights) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(weights).unwrap().as_bytes())
            .unwrap();
        file
    }

    #[test]
    fn attention_input_includes_goal_distance() {
        let mut policy = WeaverPolicy::new();
        policy.configure(&PolicyConfig::default()).unwrap();
        policy
            .load_weights(write_weights(&weaver_shaped_weights()).path())
            .unwrap();

        // A plain 200-wide attention net is one input short.
        let mut narrow = weaver_shaped_weights();
        narrow.attention = Mlp::zeros(200, &[100, 100, 1]);
        assert!(matches!(
            policy.load_weights(write_weights(&narrow).path()),
            Err(Error::Weights { .. })
        ));
    }

    #[test]
    fn goal_distance_can_steer_the_scores() {
        // Scalar pipeline where the attention score is distance-to-goal
        // times a sign flip on the pairwise distance, checking the extra
        // input is actually wired through.
        let mut mlp1 = Mlp::zeros(SELF_DIM + HUMAN_DIM, &[1]);
        mlp1.layers[0].weight[0][SELF_DIM + 5] = 1.0;
        let mut mlp2 = Mlp::zeros(1, &[1]);
        mlp2.layers[0].weight[0][0] = 1.0;
        // attention inputs: [embedding, mean, goal_distance]
        let mut attention = Mlp::zeros(3, &[1]);
        attention.layers[0].weight[0][0] = -1.0;
        attention.layers[0].weight[0][2] = 0.5;
        let mut mlp3 = Mlp::zeros(SELF_DIM + 1, &[1]);
        mlp3.layers[0].weight[0][SELF_DIM] = 1.0;
        let net = Some(SarlWeights {
            mlp1,
            mlp2,
            attention,
            mlp3,
        });

        let state = JointState {
            self_state: FullState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal: Vec2::new(0.0, 4.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: vec![
                ObservableState {
                    position: Vec2::new(1.0, 0.0),
                    velocity: Vec2::ZERO,
                    radius: 0.3,
                },
                ObservableState {
                    position: Vec2::new(3.0, 0.0),
                    velocity: Vec2::ZERO,
                    radius: 0.3,
                },
            ],
        };

        let pooled = WeaverPolicy::value(&net, &state);
        // Goal distance shifts both scores equally, so softmax still favors
        // the nearest human; the pooled distance stays below the mean.
        assert!(pooled.is_finite());
        assert!(pooled < 2.0);
    }
}
