//! Navigation policies and the registry that creates them by name.

pub mod cadrl;
pub mod interactive;
pub mod linear;
pub mod lstm_rl;
pub mod network;
pub mod sarl;
pub mod social_force;
pub mod value;
pub mod weaver;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::config::PolicyConfig;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, JointState};

pub use cadrl::CadrlPolicy;
pub use interactive::InteractivePolicy;
pub use linear::LinearPolicy;
pub use lstm_rl::LstmRlPolicy;
pub use sarl::SarlPolicy;
pub use social_force::SocialForcePolicy;
pub use weaver::WeaverPolicy;

/// A navigation policy maps what an agent knows to a velocity command.
///
/// Policies are configured once from the policy config, told about the
/// evaluation context (phase, device, environment timing), and then queried
/// every step through [`Policy::act`].
pub trait Policy: Send + Sync + fmt::Debug {
    fn kind(&self) -> PolicyKind;

    /// Applies the relevant sections of the policy config.
    fn configure(&mut self, config: &PolicyConfig) -> Result<()>;

    /// Picks the next velocity command for the deciding agent.
    fn act(&mut self, state: &JointState) -> Action;

    fn set_phase(&mut self, _phase: Phase) {}

    fn set_device(&mut self, _device: Device) {}

    /// Receives the environment timing the policy will be stepped under.
    fn set_env(&mut self, _env: EnvView) {}

    fn trainable(&self) -> bool {
        self.kind().trainable()
    }

    /// Loads serialized parameters. Only meaningful for trainable policies.
    fn load_weights(&mut self, _path: &Path) -> Result<()> {
        Err(Error::NotTrainable(self.kind()))
    }

    /// Reactive policies that keep extra clearance expose it here so the
    /// driver can zero it for non-cooperative evaluation.
    fn safety_space_mut(&mut self) -> Option<&mut f64> {
        None
    }
}

/// Every policy the crate knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Linear,
    SocialForce,
    Cadrl,
    LstmRl,
    Sarl,
    Weaver,
    Interactive,
}

impl PolicyKind {
    pub const ALL: [PolicyKind; 7] = [
        PolicyKind::Linear,
        PolicyKind::SocialForce,
        PolicyKind::Cadrl,
        PolicyKind::LstmRl,
        PolicyKind::Sarl,
        PolicyKind::Weaver,
        PolicyKind::Interactive,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PolicyKind::Linear => "linear",
            PolicyKind::SocialForce => "social_force",
            PolicyKind::Cadrl => "cadrl",
            PolicyKind::LstmRl => "lstm_rl",
            PolicyKind::Sarl => "sarl",
            PolicyKind::Weaver => "weaver",
            PolicyKind::Interactive => "interactive",
        }
    }

    /// Whether the policy carries learned parameters that must be loaded
    /// before it can run.
    pub fn trainable(self) -> bool {
        matches!(
            self,
            PolicyKind::Cadrl | PolicyKind::LstmRl | PolicyKind::Sarl | PolicyKind::Weaver
        )
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(PolicyKind::Linear),
            "social_force" | "social-force" | "sfm" => Ok(PolicyKind::SocialForce),
            "cadrl" => Ok(PolicyKind::Cadrl),
            "lstm_rl" | "lstm-rl" => Ok(PolicyKind::LstmRl),
            "sarl" => Ok(PolicyKind::Sarl),
            "weaver" => Ok(PolicyKind::Weaver),
            "interactive" => Ok(PolicyKind::Interactive),
            _ => Err(Error::UnknownPolicy(s.to_string())),
        }
    }
}

type PolicyFactory = Box<dyn Fn() -> Box<dyn Policy> + Send + Sync>;

/// Maps policy kinds to factories. Built once with every built-in policy
/// registered; later registrations for the same kind replace earlier ones.
pub struct PolicyRegistry {
    factories: HashMap<PolicyKind, PolicyFactory>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        let mut registry = PolicyRegistry {
            factories: HashMap::new(),
        };
        registry.register_builtin();
        registry
    }

    fn register_builtin(&mut self) {
        self.register(PolicyKind::Linear, || Box::new(LinearPolicy::new()));
        self.register(PolicyKind::SocialForce, || {
            Box::new(SocialForcePolicy::new())
        });
        self.register(PolicyKind::Cadrl, || Box::new(CadrlPolicy::new()));
        self.register(PolicyKind::LstmRl, || Box::new(LstmRlPolicy::new()));
        self.register(PolicyKind::Sarl, || Box::new(SarlPolicy::new()));
        self.register(PolicyKind::Weaver, || Box::new(WeaverPolicy::new()));
        self.register(PolicyKind::Interactive, || {
            Box::new(InteractivePolicy::new())
        });
    }

    pub fn register<F>(&mut self, kind: PolicyKind, factory: F)
    where
        F: Fn() -> Box<dyn Policy> + Send + Sync + 'static,
    {
        self.factories.insert(kind, Box::new(factory));
    }

    /// Builds a fresh, unconfigured policy of the given kind.
    pub fn create(&self, kind: PolicyKind) -> Option<Box<dyn Policy>> {
        self.factories.get(&kind).map(|factory| factory())
    }

    /// Parses a user-supplied name and builds the policy it names.
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Policy>> {
        let kind = name.parse()?;
        self.create(kind)
            .ok_or_else(|| Error::UnknownPolicy(name.to_string()))
    }

    pub fn list(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().map(|kind| kind.name()).collect();
        names.sort_unstable();
        names
    }

    /// Shared process-wide registry. Immutable once built, so every caller
    /// sees the same set of policies.
    pub fn global() -> &'static PolicyRegistry {
        static REGISTRY: OnceLock<PolicyRegistry> = OnceLock::new();
        REGISTRY.get_or_init(PolicyRegistry::new)
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_parses_back_from_its_name() {
        for kind in PolicyKind::ALL {
            let parsed: PolicyKind = kind.name().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn aliases_and_case_are_accepted() {
        assert_eq!("SFM".parse::<PolicyKind>().unwrap(), PolicyKind::SocialForce);
        assert_eq!("lstm-rl".parse::<PolicyKind>().unwrap(), PolicyKind::LstmRl);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = "orca2".parse::<PolicyKind>().unwrap_err();
        assert!(matches!(err, Error::UnknownPolicy(name) if name == "orca2"));
    }

    #[test]
    fn registry_builds_every_builtin() {
        let registry = PolicyRegistry::new();
        for kind in PolicyKind::ALL {
            let policy = registry.create(kind).unwrap();
            assert_eq!(policy.kind(), kind);
        }
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let registry = PolicyRegistry::new();
        assert!(matches!(
            registry.resolve("nonexistent"),
            Err(Error::UnknownPolicy(_))
        ));
    }

    #[test]
    fn later_registration_wins() {
        let mut registry = PolicyRegistry::new();
        // Rebind "linear" to a different implementation; the newest factory
        // must be the one used.
        registry.register(PolicyKind::Linear, || Box::new(InteractivePolicy::new()));
        let policy = registry.create(PolicyKind::Linear).unwrap();
        assert_eq!(policy.kind(), PolicyKind::Interactive);
    }

    #[test]
    fn list_is_sorted_and_complete() {
        let registry = PolicyRegistry::new();
        let names = registry.list();
        assert_eq!(names.len(), PolicyKind::ALL.len());
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        assert!(names.contains(&"weaver"));
    }

    #[test]
    fn trainable_split_matches_weight_needs() {
        assert!(PolicyKind::Cadrl.trainable());
        assert!(PolicyKind::Weaver.trainable());
        assert!(!PolicyKind::Linear.trainable());
        assert!(!PolicyKind::Interactive.trainable());
        assert!(!PolicyKind::SocialForce.trainable());
    }
}
