use serde::{Deserialize, Serialize};

use crate::model::{date::StudyDate, ids::LearnerId};

/// Which daily counter an action feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Learn,
    Review,
}

impl ActivityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::Learn => "learn",
            ActivityKind::Review => "review",
        }
    }
}

/// Per-(learner, date) activity counters.
///
/// A log of actions taken that day: counters only ever go up and are never
/// recomputed from word state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    pub learner_id: LearnerId,
    pub date: StudyDate,
    pub learned_count: u32,
    pub reviewed_count: u32,
}

impl DailyStat {
    #[must_use]
    pub fn empty(learner_id: LearnerId, date: StudyDate) -> Self {
        Self {
            learner_id,
            date,
            learned_count: 0,
            reviewed_count: 0,
        }
    }

    /// Count one more action of `kind`.
    pub fn record(&mut self, kind: ActivityKind) {
        match kind {
            ActivityKind::Learn => self.learned_count = self.learned_count.saturating_add(1),
            ActivityKind::Review => self.reviewed_count = self.reviewed_count.saturating_add(1),
        }
    }
}

//
// ─── HEATMAP ───────────────────────────────────────────────────────────────────
//

/// Highest intensity a heatmap cell can have.
pub const MAX_INTENSITY: u8 = 4;

/// Count thresholds used to bucket daily activity into `0..=MAX_INTENSITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapThresholds {
    pub learn: [u32; 4],
    pub review: [u32; 4],
}

impl Default for HeatmapThresholds {
    fn default() -> Self {
        Self {
            learn: [0, 5, 10, 15],
            review: [0, 30, 60, 90],
        }
    }
}

impl HeatmapThresholds {
    /// Intensity of a day: the stronger of its learn and review buckets.
    #[must_use]
    pub fn intensity(&self, stat: &DailyStat) -> u8 {
        bucket(stat.learned_count, &self.learn).max(bucket(stat.reviewed_count, &self.review))
    }
}

// Number of thresholds `count` strictly exceeds.
fn bucket(count: u32, thresholds: &[u32; 4]) -> u8 {
    let passed = thresholds.iter().filter(|t| count > **t).count();
    u8::try_from(passed).map_or(MAX_INTENSITY, |p| p.min(MAX_INTENSITY))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeatmapCell {
    pub date: StudyDate,
    pub intensity: u8,
}
