//! Straight-line baseline: head for the goal at preferred speed and
//! ignore the crowd entirely.

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::policies::{Policy, PolicyKind, value};
use crate::simulation::EnvView;
use crate::state::{Action, JointState};

#[derive(Debug)]
pub struct LinearPolicy {
    time_step: f64,
}

impl LinearPolicy {
    pub fn new() -> Self {
        LinearPolicy { time_step: 0.25 }
    }
}

impl Default for LinearPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for LinearPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Linear
    }

    fn configure(&mut self, _config: &PolicyConfig) -> Result<()> {
        Ok(())
    }

    fn set_env(&mut self, env: EnvView) {
        self.time_step = env.time_step;
    }

    fn act(&mut self, state: &JointState) -> Action {
        value::goal_directed(&state.self_state, self.time_step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FullState, Vec2};

    fn state_at(position: Vec2, goal: Vec2) -> JointState {
        JointState {
            self_state: FullState {
                position,
                velocity: Vec2::ZERO,
                radius: 0.3,
                goal,
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: Vec::new(),
        }
    }

    #[test]
    fn heads_straight_for_the_goal() {
        let mut policy = LinearPolicy::new();
        let action = policy.act(&state_at(Vec2::ZERO, Vec2::new(3.0, 4.0)));
        assert!((action.speed() - 1.0).abs() < 1e-9);
        assert!((action.vx - 0.6).abs() < 1e-9);
        assert!((action.vy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn slows_down_on_final_approach() {
        let mut policy = LinearPolicy::new();
        let action = policy.act(&state_at(Vec2::ZERO, Vec2::new(0.05, 0.0)));
        assert!((action.vx - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stands_still_at_the_goal() {
        let mut policy = LinearPolicy::new();
        let goal = Vec2::new(1.0, 1.0);
        assert_eq!(policy.act(&state_at(goal, goal)), Action::ZERO);
    }
}
