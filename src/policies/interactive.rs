//! Externally driven policy.
//!
//! Commands are fed in ahead of time, either programmatically or from a
//! JSON script, and consumed one per step. With the queue empty the agent
//! stands still, which keeps an un-scripted run well defined.

use std::collections::VecDeque;
use std::path::Path;

use crate::config::{PolicyConfig, load_json};
use crate::error::Result;
use crate::policies::{Policy, PolicyKind};
use crate::state::{Action, JointState};

#[derive(Debug, Default)]
pub struct InteractivePolicy {
    commands: VecDeque<Action>,
}

impl InteractivePolicy {
    pub fn new() -> Self {
        InteractivePolicy {
            commands: VecDeque::new(),
        }
    }

    /// Loads a command script: a JSON array of `{"vx": .., "vy": ..}`
    /// entries, one per step.
    pub fn from_script(path: &Path) -> Result<Self> {
        let commands: Vec<Action> = load_json(path)?;
        Ok(InteractivePolicy {
            commands: commands.into(),
        })
    }

    pub fn push_command(&mut self, action: Action) {
        self.commands.push_back(action);
    }

    pub fn pending(&self) -> usize {
        self.commands.len()
    }
}

impl Policy for InteractivePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Interactive
    }

    fn configure(&mut self, _config: &PolicyConfig) -> Result<()> {
        Ok(())
    }

    fn act(&mut self, state: &JointState) -> Action {
        match self.commands.pop_front() {
            Some(command) => {
                Action::from(command.velocity().clamp_length(state.self_state.v_pref))
            }
            None => Action::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::state::{FullState, Vec2};

    fn idle_state() -> JointState {
        JointState {
            self_state: FullState {
                position: Vec2::ZERO,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal: Vec2::new(4.0, 0.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: Vec::new(),
        }
    }

    #[test]
    fn commands_are_consumed_in_order() {
        let mut policy = InteractivePolicy::new();
        policy.push_command(Action::new(0.5, 0.0));
        policy.push_command(Action::new(0.0, 0.5));
        let state = idle_state();
        assert_eq!(policy.act(&state), Action::new(0.5, 0.0));
        assert_eq!(policy.act(&state), Action::new(0.0, 0.5));
        assert_eq!(policy.pending(), 0);
    }

    #[test]
    fn empty_queue_means_standing_still() {
        let mut policy = InteractivePolicy::new();
        assert_eq!(policy.act(&idle_state()), Action::ZERO);
    }

    #[test]
    fn commands_are_clamped_to_preferred_speed() {
        let mut policy = InteractivePolicy::new();
        policy.push_command(Action::new(3.0, 4.0));
        let action = policy.act(&idle_state());
        assert!((action.speed() - 1.0).abs() < 1e-9);
        // Direction is preserved.
        assert!((action.vx - 0.6).abs() < 1e-9);
        assert!((action.vy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn scripts_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"vx": 1.0, "vy": 0.0}}, {{"vx": 0.0, "vy": -1.0}}]"#).unwrap();
        let mut policy = InteractivePolicy::from_script(file.path()).unwrap();
        assert_eq!(policy.pending(), 2);
        assert_eq!(policy.act(&idle_state()), Action::new(1.0, 0.0));
    }

    #[test]
    fn bad_scripts_surface_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(InteractivePolicy::from_script(file.path()).is_err());
    }
}
