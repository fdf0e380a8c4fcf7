pub mod agent;
pub mod config;
pub mod device;
pub mod error;
pub mod metrics;
pub mod observers;
pub mod policies;
pub mod runner;
pub mod simulation;
pub mod state;

pub use agent::Agent;
pub use error::{Error, Result};
pub use policies::{Policy, PolicyKind, PolicyRegistry};
pub use runner::{ExperimentRunner, RunOptions};
pub use simulation::{CrowdSim, Phase, Status};

pub mod prelude {
    pub use crate::agent::Agent;
    pub use crate::config::{EnvConfig, PolicyConfig};
    pub use crate::error::{Error, Result};
    pub use crate::observers::Observer;
    pub use crate::policies::{Policy, PolicyKind, PolicyRegistry};
    pub use crate::runner::{ExperimentRunner, RunOptions, RunOutcome};
    pub use crate::simulation::{CrowdSim, Phase, Status};
    pub use crate::state::{Action, Frame, JointState};
}
