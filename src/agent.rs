//! Simulated agents: the navigating robot and the crowd around it.

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::info;

use crate::config::AgentSection;
use crate::policies::Policy;
use crate::state::{Action, FullState, JointState, ObservableState, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Robot,
    Human,
}

/// One body in the simulation. Robots and humans share the same kinematics;
/// they differ in visibility defaults and in which policy drives them.
#[derive(Debug)]
pub struct Agent {
    pub kind: AgentKind,
    pub visible: bool,
    pub radius: f64,
    pub v_pref: f64,
    pub time_step: f64,
    pub position: Vec2,
    pub velocity: Vec2,
    pub goal: Vec2,
    /// Heading in radians, kept for featurization even though the
    /// kinematics are holonomic.
    pub theta: f64,
    policy: Option<Box<dyn Policy>>,
}

impl Agent {
    pub fn from_config(kind: AgentKind, section: &AgentSection, time_step: f64) -> Self {
        Agent {
            kind,
            visible: section.visible,
            radius: section.radius,
            v_pref: section.v_pref,
            time_step,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            goal: Vec2::ZERO,
            theta: 0.0,
            policy: None,
        }
    }

    pub fn set_policy(&mut self, policy: Box<dyn Policy>) {
        self.policy = Some(policy);
    }

    pub fn policy(&self) -> Option<&dyn Policy> {
        self.policy.as_deref()
    }

    pub fn policy_mut(&mut self) -> Option<&mut (dyn Policy + 'static)> {
        self.policy.as_deref_mut()
    }

    /// Places the agent at `position` heading for `goal`, at rest.
    pub fn place(&mut self, position: Vec2, goal: Vec2) {
        self.position = position;
        self.goal = goal;
        self.velocity = Vec2::ZERO;
        let to_goal = goal - position;
        self.theta = to_goal.y.atan2(to_goal.x);
    }

    /// Re-samples radius and preferred speed around the configured values.
    /// Keeps the crowd heterogeneous across episodes.
    pub fn randomize_attributes(&mut self, section: &AgentSection, rng: &mut StdRng) {
        let v_pref = Normal::new(section.v_pref, 0.2)
            .map(|dist| dist.sample(rng))
            .unwrap_or(section.v_pref);
        let radius = Normal::new(section.radius, 0.05)
            .map(|dist| dist.sample(rng))
            .unwrap_or(section.radius);
        self.v_pref = v_pref.clamp(0.3, 2.0);
        self.radius = radius.clamp(0.2, 0.6);
    }

    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
        }
    }

    pub fn full_state(&self) -> FullState {
        FullState {
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
            goal: self.goal,
            v_pref: self.v_pref,
            theta: self.theta,
        }
    }

    /// Queries the attached policy for the next velocity command. An agent
    /// without a policy holds still.
    pub fn act(&mut self, humans: &[ObservableState]) -> Action {
        let state = JointState {
            self_state: self.full_state(),
            humans: humans.to_vec(),
        };
        match self.policy.as_deref_mut() {
            Some(policy) => policy.act(&state),
            None => Action::ZERO,
        }
    }

    /// Advances the agent by one step under `action`.
    pub fn step(&mut self, action: Action, dt: f64) {
        self.position += action.velocity() * dt;
        self.velocity = action.velocity();
        if action.speed() > 1e-9 {
            self.theta = action.vy.atan2(action.vx);
        }
    }

    pub fn distance_to_goal(&self) -> f64 {
        self.position.distance(self.goal)
    }

    /// An agent has arrived once its center is within its own radius of
    /// the goal point.
    pub fn reached_destination(&self) -> bool {
        self.distance_to_goal() < self.radius
    }

    pub fn log_summary(&self) {
        let kind = match self.kind {
            AgentKind::Robot => "Robot",
            AgentKind::Human => "Human",
        };
        let visibility = if self.visible { "visible" } else { "invisible" };
        let policy = self.policy.as_ref().map_or("none", |p| p.kind().name());
        info!("{kind} is {visibility}, driven by the {policy} policy");
    }
}
