//! Value network with attention pooling over the crowd.
//!
//! Each human is embedded pairwise with the self state, scored for
//! importance, and the embeddings are blended with softmax weights into a
//! fixed-size crowd summary. The value head then sees the self features
//! plus that summary, no matter how many humans are present.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AttentionSection, PolicyConfig, load_json};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::policies::network::{Mlp, softmax};
use crate::policies::value::{HUMAN_DIM, SELF_DIM, ValueCore, rotate};
use crate::policies::{Policy, PolicyKind};
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, JointState};

/// On-disk parameter bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SarlWeights {
    pub mlp1: Mlp,
    pub mlp2: Mlp,
    pub attention: Mlp,
    pub mlp3: Mlp,
}

#[derive(Debug)]
pub struct SarlPolicy {
    core: ValueCore,
    section: AttentionSection,
    net: Option<SarlWeights>,
}

impl SarlPolicy {
    pub fn new() -> Self {
        SarlPolicy {
            core: ValueCore::new(),
            section: AttentionSection::default(),
            net: None,
        }
    }

    fn value(net: &Option<SarlWeights>, section: &AttentionSection, state: &JointState) -> f64 {
        let Some(net) = net else { return 0.0 };
        let (self_features, human_features) = rotate(state);

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
                if section.with_global_state {
                    input.extend_from_slice(&mean_embedding);
                }
                net.attention.value(&input)
            })
            .collect();
        let weights = softmax(&scores);

        let crowd_dim = net.mlp2.out_dim();
        let mut crowd = vec![0.0; crowd_dim];
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

pub(crate) fn elementwise_mean(vectors: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut mean = vec![0.0; first.len()];
    for vector in vectors {
        for (slot, value) in mean.iter_mut().zip(vector) {
            *slot += value;
        }
    }
    let count = vectors.len() as f64;
    for slot in &mut mean {
        *slot /= count;
    }
    mean
}

/// Validates one attention-style bundle against its config section.
/// Shared with the weaver variant, which widens the attention input by
/// `extra_attention_inputs`.
pub(crate) fn check_bundle(
    net: &SarlWeights,
    section: &AttentionSection,
    with_global_state: bool,
    extra_attention_inputs: usize,
    path: &Path,
) -> Result<()> {
    let shape_error = |reason: String| Error::Weights {
        path: path.to_path_buf(),
        reason,
    };
    net.mlp1
        .check(SELF_DIM + HUMAN_DIM, &section.mlp1_dims)
        .map_err(|reason| shape_error(format!("mlp1: {reason}")))?;

    let embedding_dim = net.mlp1.out_dim();
    net.mlp2
        .check(embedding_dim, &section.mlp2_dims)
        .map_err(|reason| shape_error(format!("mlp2: {reason}")))?;

    let attention_in = if with_global_state {
        embedding_dim * 2 + extra_attention_inputs
    } else {
        embedding_dim + extra_attention_inputs
    };
    net.attention
        .check(attention_in, &section.attention_dims)
        .map_err(|reason| shape_error(format!("attention: {reason}")))?;
    if net.attention.out_dim() != 1 {
        return Err(shape_error("attention head must be scalar".into()));
    }

    net.mlp3
        .check(SELF_DIM + net.mlp2.out_dim(), &section.mlp3_dims)
        .map_err(|reason| shape_error(format!("mlp3: {reason}")))
}

impl Default for SarlPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for SarlPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Sarl
    }

    fn configure(&mut self, config: &PolicyConfig) -> Result<()> {
        self.core.configure(config);
        self.section = config.sarl.clone();
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
        check_bundle(&net, &self.section, self.section.with_global_state, 0, path)?;
        debug!("Loaded attention value network from {}", path.display());
        self.net = Some(net);
        Ok(())
    }

    fn act(&mut self, state: &JointState) -> Action {
        let SarlPolicy { core, section, net } = self;
        core.select_action(state, |next| Self::value(net, section, next))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::state::{FullState, ObservableState, Vec2};

    fn default_shaped_weights() -> SarlWeights {
        SarlWeights {
            mlp1: Mlp::zeros(SELF_DIM + HUMAN_DIM, &[150, 100]),
            mlp2: Mlp::zeros(100, &[100, 50]),
            attention: Mlp::zeros(100, &[100, 100, 1]),
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
    fn default_shapes_load_cleanly() {
        let mut policy = SarlPolicy::new();
        policy.configure(&PolicyConfig::default()).unwrap();
        policy
            .load_weights(write_weights(&default_shaped_weights()).path())
            .unwrap();
    }

    #[test]
    fn global_state_widens_the_attention_input() {
        let mut config = PolicyConfig::default();
        config.sarl.with_global_state = true;
        let mut policy = SarlPolicy::new();
        policy.configure(&config).unwrap();
        // The plain bundle's 100-wide attention no longer fits.
        assert!(matches!(
            policy.load_weights(write_weights(&default_shaped_weights()).path()),
            Err(Error::Weights { .. })
        ));
        let mut widened = default_shaped_weights();
        widened.attention = Mlp::zeros(200, &[100, 100, 1]);
        policy.load_weights(write_weights(&widened).path()).unwrap();
    }

    #[test]
    fn attention_concentrates_on_the_nearest_human() {
        // Scalar pipeline: embeddings carry the pairwise distance, the
        // attention head negates it, and the value head reads the pooled
        // distance back out.
        let mut mlp1 = Mlp::zeros(SELF_DIM + HUMAN_DIM, &[1]);
        mlp1.layers[0].weight[0][SELF_DIM + 5] = 1.0;
        let mut mlp2 = Mlp::zeros(1, &[1]);
        mlp2.layers[0].weight[0][0] = 1.0;
        let mut attention = Mlp::zeros(1, &[1]);
        attention.layers[0].weight[0][0] = -1.0;
        let mut mlp3 = Mlp::zeros(SELF_DIM + 1, &[1]);
        mlp3.layers[0].weight[0][SELF_DIM] = 1.0;
        let net = Some(SarlWeights {
            mlp1,
            mlp2,
            attention,
            mlp3,
        });

        let human = |x: f64| ObservableState {
            position: Vec2::new(x, 0.0),
            velocity: Vec2::ZERO,
            radius: 0.3,
        };
        let state = JointState {
            self_state: FullState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal: Vec2::new(0.0, 4.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: vec![human(1.0), human(3.0)],
        };

        let section = AttentionSection::default();
        let pooled = SarlPolicy::value(&net, &section, &state);
        // Nearest-human weight e^-1 / (e^-1 + e^-3) dominates.
        let expected = {
            let w1 = (-1.0_f64).exp() / ((-1.0_f64).exp() + (-3.0_f64).exp());
            w1 * 1.0 + (1.0 - w1) * 3.0
        };
        assert!((pooled - expected).abs() < 1e-9);
        assert!(pooled < 2.0);
    }
}
