//! Geometry primitives and the state vocabulary shared by the simulator,
//! the policies, and the observers.

use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 2D vector in world coordinates (metres).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or zero when the length is
    /// too small to normalize safely.
    pub fn normalized_or_zero(self) -> Vec2 {
        let len = self.length();
        if len < 1e-9 { Vec2::ZERO } else { self / len }
    }

    /// Scales the vector down if it is longer than `max`.
    pub fn clamp_length(self, max: f64) -> Vec2 {
        let len = self.length();
        if len > max && len > 1e-9 {
            self * (max / len)
        } else {
            self
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// What any agent can see of another agent: kinematics plus body radius.
/// Goals and preferred speeds stay private to their owner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservableState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
}

/// An agent's complete view of itself, including intent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub goal: Vec2,
    pub v_pref: f64,
    pub theta: f64,
}

impl FullState {
    pub fn observable(&self) -> ObservableState {
        ObservableState {
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
        }
    }

    pub fn distance_to_goal(&self) -> f64 {
        self.position.distance(self.goal)
    }
}

/// The input every navigation policy decides on: the deciding agent's own
/// full state paired with what it observes of everyone else.
#[derive(Debug, Clone, PartialEq)]
pub struct JointState {
    pub self_state: FullState,
    pub humans: Vec<ObservableState>,
}

/// Holonomic velocity command, applied for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    pub vx: f64,
    pub vy: f64,
}

impl Action {
    pub const ZERO: Action = Action { vx: 0.0, vy: 0.0 };

    pub const fn new(vx: f64, vy: f64) -> Self {
        Action { vx, vy }
    }

    pub fn velocity(self) -> Vec2 {
        Vec2::new(self.vx, self.vy)
    }

    pub fn speed(self) -> f64 {
        self.vx.hypot(self.vy)
    }
}

impl From<Vec2> for Action {
    fn from(v: Vec2) -> Self {
        Action { vx: v.x, vy: v.y }
    }
}

/// Snapshot of the whole scene at one instant, in the order observers
/// receive it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Simulation clock in seconds.
    pub time: f64,
    pub robot: FullState,
    pub humans: Vec<ObservableState>,
}
