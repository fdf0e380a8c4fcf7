//! Shared machinery for value-network navigation.
//!
//! The learned policies all follow the same recipe: build a fixed action
//! space from the agent's preferred speed, roll every candidate action one
//! step forward under constant-velocity assumptions, and pick the action
//! maximizing immediate reward plus the discounted value of the successor
//! state. Only the value network differs between them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{PolicyConfig, RewardSection};
use crate::device::Device;
use crate::simulation::{EnvView, Phase};
use crate::state::{Action, FullState, JointState, ObservableState};

/// Width of the rotated self-state features.
pub const SELF_DIM: usize = 6;
/// Width of the rotated per-human features.
pub const HUMAN_DIM: usize = 7;

/// State, discounting and action-space plumbing shared by every
/// value-network policy.
#[derive(Debug)]
pub struct ValueCore {
    pub gamma: f64,
    pub epsilon: f64,
    pub phase: Phase,
    pub device: Device,
    pub time_step: f64,
    speed_samples: usize,
    rotation_samples: usize,
    /// Estimated shaping, kept identical to the simulator's defaults so
    /// one-step lookahead scores like the environment does.
    reward: RewardSection,
    actions: Vec<Action>,
    actions_v_pref: Option<f64>,
    rng: StdRng,
}

impl ValueCore {
    pub fn new() -> Self {
        ValueCore {
            gamma: 0.9,
            epsilon: 0.0,
            phase: Phase::Test,
            device: Device::Cpu,
            time_step: 0.25,
            speed_samples: 5,
            rotation_samples: 16,
            reward: RewardSection::default(),
            actions: Vec::new(),
            actions_v_pref: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn configure(&mut self, config: &PolicyConfig) {
        self.gamma = config.rl.gamma;
        self.epsilon = config.rl.epsilon;
        self.speed_samples = config.action_space.speed_samples;
        self.rotation_samples = config.action_space.rotation_samples;
        self.actions.clear();
        self.actions_v_pref = None;
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn set_device(&mut self, device: Device) {
        self.device = device;
    }

    pub fn set_env(&mut self, env: EnvView) {
        self.time_step = env.time_step;
        self.actions.clear();
        self.actions_v_pref = None;
    }

    /// The discrete action set for an agent with the given preferred
    /// speed: a stop action plus an exponentially spaced speed grid swept
    /// around the compass.
    pub fn action_space(&mut self, v_pref: f64) -> &[Action] {
        if self.actions_v_pref != Some(v_pref) {
            let mut actions = vec![Action::ZERO];
            for s in 1..=self.speed_samples {
                let unit = ((s as f64 / self.speed_samples as f64).exp() - 1.0)
                    / (1.0_f64.exp() - 1.0);
                let speed = unit * v_pref;
                for r in 0..self.rotation_samples {
                    let angle = std::f64::consts::TAU * r as f64 / self.rotation_samples as f64;
                    actions.push(Action::new(speed * angle.cos(), speed * angle.sin()));
                }
            }
            self.actions = actions;
            self.actions_v_pref = Some(v_pref);
        }
        &self.actions
    }

    /// Picks the best action under one-step lookahead, scoring successor
    /// states with `value`. Exploration only happens in the train phase.
    pub fn select_action(
        &mut self,
        state: &JointState,
        mut value: impl FnMut(&JointState) -> f64,
    ) -> Action {
        if state.humans.is_empty() {
            return goal_directed(&state.self_state, self.time_step);
        }

        let actions = self.action_space(state.self_state.v_pref).to_vec();
        if self.phase == Phase::Train
            && self.epsilon > 0.0
            && self.rng.gen_bool(self.epsilon.clamp(0.0, 1.0))
        {
            return actions[self.rng.gen_range(0..actions.len())];
        }

        let discount = self.gamma.powf(self.time_step * state.self_state.v_pref);
        let mut best = Action::ZERO;
        let mut best_score = f64::NEG_INFINITY;
        for action in actions {
            let reward = self.estimate_reward(state, action);
            let next = self.lookahead(state, action);
            let score = reward + discount * value(&next);
            if score > best_score {
                best_score = score;
                best = action;
            }
        }
        best
    }

    /// Successor state under `action`, assuming humans keep their current
    /// velocities.
    pub fn lookahead(&self, state: &JointState, action: Action) -> JointState {
        JointState {
            self_state: propagate_self(&state.self_state, action, self.time_step),
            humans: state
                .humans
                .iter()
                .map(|human| propagate(human, self.time_step))
                .collect(),
        }
    }

    /// Endpoint estimate of the environment's shaped reward. The simulator
    /// sweeps the whole step interval; this only looks at where everyone
    /// ends up, which is what the lookahead can afford per candidate.
    pub fn estimate_reward(&self, state: &JointState, action: Action) -> f64 {
        let dt = self.time_step;
        let next_position = state.self_state.position + action.velocity() * dt;

        let mut dmin = f64::INFINITY;
        let mut collision = false;
        for human in &state.humans {
            let human_next = human.position + human.velocity * dt;
            let separation =
                next_position.distance(human_next) - human.radius - state.self_state.radius;
            if separation < 0.0 {
                collision = true;
            } else if separation < dmin {
                dmin = separation;
            }
        }
        let reaching = next_position.distance(state.self_state.goal) < state.self_state.radius;

        if collision {
            self.reward.collision_penalty
        } else if reaching {
            self.reward.success_reward
        } else if dmin < self.reward.discomfort_dist {
            (dmin - self.reward.discomfort_dist) * self.reward.discomfort_penalty_factor * dt
        } else {
            0.0
        }
    }
}

impl Default for ValueCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-speed move toward the goal, clamped so the agent does not overshoot
/// within one step.
pub fn goal_directed(state: &FullState, time_step: f64) -> Action {
    let to_goal = state.goal - state.position;
    let distance = to_goal.length();
    if distance < 1e-9 {
        return Action::ZERO;
    }
    let speed = state.v_pref.min(distance / time_step);
    Action::from(to_goal.normalized_or_zero() * speed)
}

fn propagate(human: &ObservableState, dt: f64) -> ObservableState {
    ObservableState {
        position: human.position + human.velocity * dt,
        velocity: human.velocity,
        radius: human.radius,
    }
}

fn propagate_self(state: &FullState, action: Action, dt: f64) -> FullState {
    FullState {
        position: state.position + action.velocity() * dt,
        velocity: action.velocity(),
        ..*state
    }
}

/// Rewrites the scene in the agent's goal-centric frame: x axis pointing
/// at the goal, origin at the agent. Learned values become invariant to
/// where in the world the episode happens.
pub fn rotate(state: &JointState) -> (Vec<f64>, Vec<Vec<f64>>) {
    let s = &state.self_state;
    let to_goal = s.goal - s.position;
    let rot = to_goal.y.atan2(to_goal.x);
    let (sin, cos) = rot.sin_cos();

    let self_features = vec![
        to_goal.length(),
        s.v_pref,
        // Heading is meaningless under holonomic kinematics.
        0.0,
        s.radius,
        s.velocity.x * cos + s.velocity.y * sin,
        s.velocity.y * cos - s.velocity.x * sin,
    ];

    let human_features = state
        .humans
        .iter()
        .map(|human| {
            let rel = human.position - s.position;
            vec![
                rel.x * cos + rel.y * sin,
                rel.y * cos - rel.x * sin,
                human.velocity.x * cos + human.velocity.y * sin,
                human.velocity.y * cos - human.velocity.x * sin,
                human.radius,
                rel.length(),
                s.radius + human.radius,
            ]
        })
        .collect();

    (self_features, human_features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Vec2;

    fn self_state(position: Vec2, goal: Vec2) -> FullState {
        FullState {
            position,
            velocity: Vec2::ZERO,
            radius: 0.3,
            goal,
            v_pref: 1.0,
            theta: 0.0,
        }
    }

    fn human(position: Vec2, velocity: Vec2) -> ObservableState {
        ObservableState {
            position,
            velocity,
            radius: 0.3,
        }
    }

    #[test]
    fn action_space_has_stop_plus_speed_grid() {
        let mut core = ValueCore::new();
        let actions = core.action_space(1.0).to_vec();
        assert_eq!(actions.len(), 5 * 16 + 1);
        assert_eq!(actions[0], Action::ZERO);
        for action in &actions {
            assert!(action.speed() <= 1.0 + 1e-9);
        }
        // The grid tops out at the preferred speed.
        let max = actions.iter().map(|a| a.speed()).fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-9);
    }

    #[test]
    fn action_space_rescales_with_v_pref() {
        let mut core = ValueCore::new();
        core.action_space(1.0);
        let max = core
            .action_space(2.0)
            .iter()
            .map(|a| a.speed())
            .fold(0.0, f64::max);
        assert!((max - 2.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_points_the_x_axis_at_the_goal() {
        let state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(0.0, 4.0)),
            humans: vec![human(Vec2::new(1.0, 0.0), Vec2::ZERO)],
        };
        let (self_features, human_features) = rotate(&state);
        assert_eq!(self_features.len(), SELF_DIM);
        assert_eq!(human_features[0].len(), HUMAN_DIM);
        assert!((self_features[0] - 4.0).abs() < 1e-9);
        // A human to the world-east sits at (0, -1) in the goal frame.
        assert!(human_features[0][0].abs() < 1e-9);
        assert!((human_features[0][1] - -1.0).abs() < 1e-9);
        assert!((human_features[0][5] - 1.0).abs() < 1e-9);
        assert!((human_features[0][6] - 0.6).abs() < 1e-9);
    }

    #[test]
    fn features_are_invariant_to_world_placement() {
        let base = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(4.0, 0.0)),
            humans: vec![human(Vec2::new(2.0, 1.0), Vec2::new(-1.0, 0.0))],
        };
        // Same scene shifted and rotated a quarter turn.
        let moved = JointState {
            self_state: self_state(Vec2::new(10.0, 10.0), Vec2::new(10.0, 14.0)),
            humans: vec![human(Vec2::new(9.0, 12.0), Vec2::new(0.0, -1.0))],
        };
        let (a_self, a_humans) = rotate(&base);
        let (b_self, b_humans) = rotate(&moved);
        for (a, b) in a_self.iter().zip(&b_self) {
            assert!((a - b).abs() < 1e-9);
        }
        for (a, b) in a_humans[0].iter().zip(&b_humans[0]) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn reward_estimate_flags_collisions_and_success() {
        let core = ValueCore::new();
        let collision_state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(4.0, 0.0)),
            humans: vec![human(Vec2::new(0.7, 0.0), Vec2::ZERO)],
        };
        let reward = core.estimate_reward(&collision_state, Action::new(1.0, 0.0));
        assert!((reward - -0.25).abs() < 1e-12);

        let near_goal = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(0.4, 0.0)),
            humans: vec![human(Vec2::new(5.0, 5.0), Vec2::ZERO)],
        };
        let reward = core.estimate_reward(&near_goal, Action::new(1.0, 0.0));
        assert!((reward - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_crowd_falls_back_to_goal_seeking() {
        let mut core = ValueCore::new();
        let state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(0.0, 4.0)),
            humans: Vec::new(),
        };
        let action = core.select_action(&state, |_| 0.0);
        assert!(action.vx.abs() < 1e-9);
        assert!((action.vy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn goal_seeking_does_not_overshoot() {
        let state = self_state(Vec2::ZERO, Vec2::new(0.1, 0.0));
        let action = goal_directed(&state, 0.25);
        assert!((action.vx - 0.4).abs() < 1e-9);
        assert!(action.vy.abs() < 1e-12);
    }

    #[test]
    fn lookahead_picks_a_reaching_action_near_the_goal() {
        let mut core = ValueCore::new();
        let state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(0.2, 0.0)),
            humans: vec![human(Vec2::new(6.0, 6.0), Vec2::ZERO)],
        };
        let action = core.select_action(&state, |_| 0.0);
        let end = state.self_state.position + action.velocity() * core.time_step;
        assert!(end.distance(state.self_state.goal) < state.self_state.radius);
    }

    #[test]
    fn train_phase_exploration_stays_inside_the_action_space() {
        let mut core = ValueCore::new();
        core.set_phase(Phase::Train);
        core.epsilon = 1.0;
        let state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(4.0, 0.0)),
            humans: vec![human(Vec2::new(2.0, 2.0), Vec2::ZERO)],
        };
        for _ in 0..16 {
            let action = core.select_action(&state, |_| 0.0);
            assert!(action.speed() <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn test_phase_never_explores() {
        let mut core = ValueCore::new();
        core.epsilon = 1.0;
        // Test phase ignores epsilon; the near-goal argmax is deterministic.
        let state = JointState {
            self_state: self_state(Vec2::ZERO, Vec2::new(0.2, 0.0)),
            humans: vec![human(Vec2::new(6.0, 6.0), Vec2::ZERO)],
        };
        let first = core.select_action(&state, |_| 0.0);
        for _ in 0..8 {
            assert_eq!(core.select_action(&state, |_| 0.0), first);
        }
    }
}
