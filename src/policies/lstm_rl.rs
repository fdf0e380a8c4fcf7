//! Value network with a recurrent crowd encoder.
//!
//! Humans are folded one at a time into an LSTM hidden state, ordered
//! farthest first so the nearest human has the freshest influence on the
//! summary. The final hidden state joins the self features in front of a
//! value head, which makes the policy indifferent to crowd size.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{PolicyConfig, load_json};
use crate::device::Device;
use crate::error::{Error, Result};
use crate::policies::network::{LstmCell, Mlp};
use crate::policies::value::{HUMAN_DIM, SELF_DIM, ValueCore, rotate};
use crate::policies::{Policy, PolicyKind};
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, JointState};

/// On-disk parameter bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmRlWeights {
    pub lstm: LstmCell,
    pub mlp: Mlp,
}

#[derive(Debug)]
pub struct LstmRlPolicy {
    core: ValueCore,
    hidden_dim: usize,
    mlp_dims: Vec<usize>,
    net: Option<LstmRlWeights>,
}

impl LstmRlPolicy {
    pub fn new() -> Self {
        LstmRlPolicy {
            core: ValueCore::new(),
            hidden_dim: 50,
            mlp_dims: vec![150, 100, 100, 1],
            net: None,
        }
    }

    fn value(net: &Option<LstmRlWeights>, hidden_dim: usize, state: &JointState) -> f64 {
        let Some(net) = net else { return 0.0 };
        let (self_features, mut human_features) = rotate(state);

        // Farthest first; the rotated feature at index 5 is the distance
        // to the deciding agent.
        human_features.sort_by(|a, b| b[5].total_cmp(&a[5]));

        let mut hidden = vec![0.0; hidden_dim];
        let mut cell = vec![0.0; hidden_dim];
        for human in &human_features {
            (hidden, cell) = net.lstm.step(human, &hidden, &cell);
        }

        let mut input = self_features;
        input.extend_from_slice(&hidden);
        net.mlp.value(&input)
    }
}

impl Default for LstmRlPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LstmRlPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::LstmRl
    }

    fn configure(&mut self, config: &PolicyConfig) -> Result<()> {
        self.core.configure(config);
        self.hidden_dim = config.lstm_rl.hidden_dim;
        self.mlp_dims = config.lstm_rl.mlp_dims.clone();
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
        let net: LstmRlWeights = load_json(path)?;
        let shape_error = |reason: String| Error::Weights {
            path: path.to_path_buf(),
            reason,
        };
        net.lstm
            .check(HUMAN_DIM, self.hidden_dim)
            .map_err(|reason| shape_error(format!("lstm: {reason}")))?;
        net.mlp
            .check(SELF_DIM + self.hidden_dim, &self.mlp_dims)
            .map_err(|reason| shape_error(format!("mlp: {reason}")))?;
        debug!("Loaded recurrent value network from {}", path.display());
        self.net = Some(net);
        Ok(())
    }

    fn act(&mut self, state: &JointState) -> Action {
        let LstmRlPolicy {
            core,
            hidden_dim,
            net,
            ..
        } = self;
        core.select_action(state, |next| Self::value(net, *hidden_dim, next))
    }
}
