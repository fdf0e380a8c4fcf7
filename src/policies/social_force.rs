//! Reactive navigation: steer for the goal, repelled by nearby bodies.
//!
//! Each neighbor contributes a push directed away from it whose strength
//! decays exponentially with surface separation. This is what the simulated
//! crowd runs, so humans give way to each other without any learning.

use crate::config::PolicyConfig;
use crate::error::Result;
use crate::policies::{Policy, PolicyKind, value};
use crate::simulation::EnvView;
use crate::state::{Action, JointState};

#[derive(Debug)]
pub struct SocialForcePolicy {
    a: f64,
    b: f64,
    safety_space: f64,
    neighbor_dist: f64,
    time_step: f64,
}

impl SocialForcePolicy {
    pub fn new() -> Self {
        SocialForcePolicy {
            a: 2.0,
            b: 0.3,
            safety_space: 0.15,
            neighbor_dist: 10.0,
            time_step: 0.25,
        }
    }
}

impl Default for SocialForcePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for SocialForcePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::SocialForce
    }

    fn configure(&mut self, config: &PolicyConfig) -> Result<()> {
        let section = &config.social_force;
        self.a = section.a;
        self.b = section.b;
        self.safety_space = section.safety_space;
        self.neighbor_dist = section.neighbor_dist;
        Ok(())
    }

    fn set_env(&mut self, env: EnvView) {
        self.time_step = env.time_step;
    }

    fn act(&mut self, state: &JointState) -> Action {
        let me = &state.self_state;
        let mut velocity = value::goal_directed(me, self.time_step).velocity();

        for human in &state.humans {
            let away = me.position - human.position;
            let distance = away.length();
            if distance > self.neighbor_dist {
                continue;
            }
            let contact = me.radius + human.radius + self.safety_space;
            let strength = self.a * ((contact - distance) / self.b).exp();
            velocity += away.normalized_or_zero() * strength;
        }

        Action::from(velocity.clamp_length(me.v_pref))
    }

    fn safety_space_mut(&mut self) -> Option<&mut f64> {
        Some(&mut self.safety_space)
    }
}
