//! The crowd navigation environment.
//!
//! One robot crosses a small patch of world while a handful of simulated
//! humans cross it too. The environment owns every agent, advances them in
//! lockstep, and scores each robot step with the shaped navigation reward.

pub mod scenario;

pub use scenario::Scenario;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::agent::{Agent, AgentKind};
use crate::config::EnvConfig;
use crate::error::{Error, Result};
use crate::state::{Action, Frame, ObservableState, Vec2};

/// Which split of episodes an evaluation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Val,
    Test,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Train => "train",
            Phase::Val => "val",
            Phase::Test => "test",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "train" => Ok(Phase::Train),
            "val" => Ok(Phase::Val),
            "test" => Ok(Phase::Test),
            _ => Err(Error::UnknownPhase(s.to_string())),
        }
    }
}

/// The slice of environment timing a policy is allowed to know.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvView {
    pub time_step: f64,
    pub time_limit: f64,
}

/// Outcome attached to every step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    /// Uneventful step.
    Nothing,
    /// The robot came closer to a human than the comfort distance; carries
    /// the observed separation.
    Danger(f64),
    ReachGoal,
    Collision,
    Timeout,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::ReachGoal | Status::Collision | Status::Timeout)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Nothing => write!(f, "nothing"),
            Status::Danger(_) => write!(f, "danger"),
            Status::ReachGoal => write!(f, "reach goal"),
            Status::Collision => write!(f, "collision"),
            Status::Timeout => write!(f, "timeout"),
        }
    }
}

/// What one call to [`CrowdSim::step`] hands back.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// What the robot observes after everyone moved.
    pub observation: Vec<ObservableState>,
    pub reward: f64,
    pub done: bool,
    pub status: Status,
}

pub struct CrowdSim {
    config: EnvConfig,
    robot: Agent,
    humans: Vec<Agent>,
    test_scenario: Scenario,
    global_time: f64,
    /// Arrival time per human, zero until that human reaches its goal.
    human_times: Vec<f64>,
    /// Smallest surface separation seen this episode.
    separation_min: f64,
    /// Human 0 is driven externally; keep its attributes fixed on reset.
    interactive_human: bool,
}

impl CrowdSim {
    pub fn new(config: EnvConfig) -> Self {
        let dt = config.env.time_step;
        let robot = Agent::from_config(AgentKind::Robot, &config.robot, dt);
        let humans = (0..config.sim.human_num)
            .map(|_| Agent::from_config(AgentKind::Human, &config.humans, dt))
            .collect();
        let human_times = vec![0.0; config.sim.human_num];
        CrowdSim {
            test_scenario: config.sim.test_sim,
            robot,
            humans,
            global_time: 0.0,
            human_times,
            separation_min: f64::INFINITY,
            interactive_human: false,
            config,
        }
    }

    /// Rebuilds the crowd with `count` humans. Drops any policies attached
    /// to the old crowd, so call this before wiring policies up.
    pub fn set_human_count(&mut self, count: usize) {
        let dt = self.config.env.time_step;
        self.humans = (0..count)
            .map(|_| Agent::from_config(AgentKind::Human, &self.config.humans, dt))
            .collect();
        self.human_times = vec![0.0; count];
    }

    /// Overrides which layout test-phase episodes use.
    pub fn set_test_scenario(&mut self, scenario: Scenario) {
        self.test_scenario = scenario;
    }

    /// Marks human 0 as externally driven.
    pub fn set_interactive_human(&mut self) {
        self.interactive_human = true;
    }

    pub fn robot(&self) -> &Agent {
        &self.robot
    }

    pub fn robot_mut(&mut self) -> &mut Agent {
        &mut self.robot
    }

    pub fn humans(&self) -> &[Agent] {
        &self.humans
    }

    pub fn human_mut(&mut self, index: usize) -> &mut Agent {
        &mut self.humans[index]
    }

    pub fn global_time(&self) -> f64 {
        self.global_time
    }

    pub fn view(&self) -> EnvView {
        EnvView {
            time_step: self.config.env.time_step,
            time_limit: self.config.env.time_limit,
        }
    }

    pub fn min_separation(&self) -> f64 {
        self.separation_min
    }

    /// Arrival times for every human. Humans still under way are reported
    /// at the current clock.
    pub fn human_times(&self) -> Vec<f64> {
        self.human_times
            .iter()
            .map(|&t| if t == 0.0 { self.global_time } else { t })
            .collect()
    }

    /// Starts a fresh episode and returns the robot's first observation.
    ///
    /// A concrete `case` makes the episode reproducible; the same phase and
    /// case always lay out the same crowd.
    pub fn reset(&mut self, phase: Phase, case: Option<u64>) -> Result<Vec<ObservableState>> {
        self.global_time = 0.0;
        self.human_times = vec![0.0; self.humans.len()];
        self.separation_min = f64::INFINITY;

        let layout = match phase {
            Phase::Test => self.test_scenario,
            Phase::Train | Phase::Val => self.config.sim.train_val_sim,
        };
        let geometry = scenario::Geometry {
            circle_radius: self.config.sim.circle_radius,
            square_width: self.config.sim.square_width,
        };
        let min_separation = 2.0 * self.config.humans.radius.max(self.config.robot.radius)
            + self.config.reward.discomfort_dist;

        let mut rng = scenario::episode_rng(phase, case);
        let placements =
            scenario::sample(layout, self.humans.len(), geometry, min_separation, &mut rng)?;

        self.robot.place(placements.robot.position, placements.robot.goal);
        for (index, (human, placement)) in
            self.humans.iter_mut().zip(&placements.humans).enumerate()
        {
            human.place(placement.position, placement.goal);
            let keep_fixed = self.interactive_human && index == 0;
            if self.config.env.randomize_attributes && !keep_fixed {
                human.randomize_attributes(&self.config.humans, &mut rng);
            }
        }

        debug!(
            "Episode reset: {} layout, {} humans, case {:?}",
            layout.name(),
            self.humans.len(),
            case
        );
        Ok(self.robot_observation())
    }

    fn robot_observation(&self) -> Vec<ObservableState> {
        self.humans.iter().map(Agent::observable_state).collect()
    }

    /// What human `index` observes: every other human, plus the robot when
    /// it is visible.
    fn human_observation(&self, index: usize) -> Vec<ObservableState> {
        let mut ob: Vec<ObservableState> = self
            .humans
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != index)
            .map(|(_, human)| human.observable_state())
            .collect();
        if self.robot.visible {
            ob.push(self.robot.observable_state());
        }
        ob
    }

    /// Advances the world one step under the robot's `action`.
    ///
    /// Humans pick their actions from the pre-step state, so nobody reacts
    /// to a move that has not happened yet. The robot's step is scored
    /// against the closest approach to any human over the step interval,
    /// not just the endpoints.
    pub fn step(&mut self, action: Action) -> StepResult {
        let dt = self.config.env.time_step;

        let human_observations: Vec<Vec<ObservableState>> =
            (0..self.humans.len()).map(|i| self.human_observation(i)).collect();
        let human_actions: Vec<Action> = self
            .humans
            .iter_mut()
            .zip(&human_observations)
            .map(|(human, ob)| human.act(ob))
            .collect();

        // Closest approach between the robot and each human over the step,
        // using the humans' current velocities.
        let mut dmin = f64::INFINITY;
        let mut collision = false;
        for human in &self.humans {
            let start = human.position - self.robot.position;
            let relative_velocity = human.velocity - action.velocity();
            let end = start + relative_velocity * dt;
            let closest = point_segment_distance(start, end) - human.radius - self.robot.radius;
            if closest < 0.0 {
                collision = true;
            } else if closest < dmin {
                dmin = closest;
            }
        }
        self.separation_min = self.separation_min.min(if collision { 0.0 } else { dmin });

        let end_position = self.robot.position + action.velocity() * dt;
        let reaching_goal = end_position.distance(self.robot.goal) < self.robot.radius;

        let reward_cfg = &self.config.reward;
        // The timeout check counts the step about to be taken.
        let (reward, done, status) = if self.global_time >= self.config.env.time_limit - 1.0 {
            (0.0, true, Status::Timeout)
        } else if collision {
            (reward_cfg.collision_penalty, true, Status::Collision)
        } else if reaching_goal {
            (reward_cfg.success_reward, true, Status::ReachGoal)
        } else if dmin < reward_cfg.discomfort_dist {
            let shortfall = dmin - reward_cfg.discomfort_dist;
            let reward = shortfall * reward_cfg.discomfort_penalty_factor * dt;
            (reward, false, Status::Danger(dmin))
        } else {
            (0.0, false, Status::Nothing)
        };

        self.robot.step(action, dt);
        for (human, human_action) in self.humans.iter_mut().zip(human_actions) {
            human.step(human_action, dt);
        }
        self.global_time += dt;
        for (index, human) in self.humans.iter().enumerate() {
            if self.human_times[index] == 0.0 && human.reached_destination() {
                self.human_times[index] = self.global_time;
            }
        }

        StepResult {
            observation: self.robot_observation(),
            reward,
            done,
            status,
        }
    }

    /// Current scene snapshot, as handed to observers.
    pub fn state(&self) -> Frame {
        Frame {
            time: self.global_time,
            robot: self.robot.full_state(),
            humans: self.robot_observation(),
        }
    }

    /// Dumps the scene as a character grid. Good enough to follow an
    /// episode from a terminal.
    pub fn render(&self) {
        const COLS: usize = 41;
        const ROWS: usize = 21;
        let extent = self
            .config
            .sim
            .circle_radius
            .max(self.config.sim.square_width / 2.0)
            + 1.0;

        let cell = |p: Vec2| -> Option<(usize, usize)> {
            if p.x.abs() > extent || p.y.abs() > extent {
                return None;
            }
            let col = ((p.x + extent) / (2.0 * extent) * (COLS - 1) as f64).round() as usize;
            let row = ((extent - p.y) / (2.0 * extent) * (ROWS - 1) as f64).round() as usize;
            Some((row.min(ROWS - 1), col.min(COLS - 1)))
        };

        let mut grid = [[' '; COLS]; ROWS];
        if let Some((r, c)) = cell(self.robot.goal) {
            grid[r][c] = 'G';
        }
        for (index, human) in self.humans.iter().enumerate() {
            if let Some((r, c)) = cell(human.position) {
                grid[r][c] = char::from_digit((index % 10) as u32, 10).unwrap_or('?');
            }
        }
        if let Some((r, c)) = cell(self.robot.position) {
            grid[r][c] = 'R';
        }

        println!("t = {:5.2}s  {}", self.global_time, "-".repeat(COLS - 11));
        for row in &grid {
            let line: String = row.iter().collect();
            println!("|{line}|");
        }
    }
}

/// Distance from the origin to the segment from `a` to `b`.
fn point_segment_distance(a: Vec2, b: Vec2) -> f64 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-12 {
        return a.length();
    }
    let t = (-a.dot(ab) / len_sq).clamp(0.0, 1.0);
    (a + ab * t).length()
}
