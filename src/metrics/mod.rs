//! Per-episode results and batch summaries.

pub mod logger;

use serde::{Deserialize, Serialize};

use crate::simulation::Status;

/// One evaluated episode, flat enough to serialize straight into CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub policy: String,
    pub case_id: u64,
    /// Terminal status label: "reach goal", "collision" or "timeout".
    pub status: String,
    /// Seconds from reset to the terminal step.
    pub nav_time: f64,
    pub steps: u64,
    pub cumulative_reward: f64,
    /// Closest surface separation to any human over the episode.
    pub min_separation: f64,
}

/// Aggregate view of one policy's batch.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub policy: String,
    pub episodes: usize,
    pub success_rate: f64,
    pub collision_rate: f64,
    pub timeout_rate: f64,
    /// Mean navigation time across successful episodes; falls back to the
    /// time limit when nothing succeeded.
    pub avg_nav_time: f64,
    pub avg_reward: f64,
    pub avg_min_separation: f64,
}

/// Collapses a batch of records for one policy into a [`Summary`].
pub fn summarize(policy: &str, time_limit: f64, records: &[EpisodeRecord]) -> Summary {
    let episodes = records.len();
    let count_of = |status: Status| {
        let label = status.to_string();
        records.iter().filter(|r| r.status == label).count()
    };
    let rate = |count: usize| {
        if episodes == 0 {
            0.0
        } else {
            count as f64 / episodes as f64
        }
    };

    let successes = count_of(Status::ReachGoal);
    let success_times: Vec<f64> = {
        let label = Status::ReachGoal.to_string();
        records
            .iter()
            .filter(|r| r.status == label)
            .map(|r| r.nav_time)
            .collect()
    };
    let avg_nav_time = if success_times.is_empty() {
        time_limit
    } else {
        success_times.iter().sum::<f64>() / success_times.len() as f64
    };

    let mean = |values: &mut dyn Iterator<Item = f64>| {
        let collected: Vec<f64> = values.collect();
        if collected.is_empty() {
            0.0
        } else {
            collected.iter().sum::<f64>() / collected.len() as f64
        }
    };

    Summary {
        policy: policy.to_string(),
        episodes,
        success_rate: rate(successes),
        collision_rate: rate(count_of(Status::Collision)),
        timeout_rate: rate(count_of(Status::Timeout)),
        avg_nav_time,
        avg_reward: mean(&mut records.iter().map(|r| r.cumulative_reward)),
        avg_min_separation: mean(
            &mut records
                .iter()
                .map(|r| r.min_separation)
                .filter(|s| s.is_finite()),
        ),
    }
}
