use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub handle: Option<String>,
    pub current_rating: i32,
    pub max_rating: i32,
    pub last_synced: Option<DateTime<Utc>>,
    pub inactivity_notified: bool,
    pub reminders_disabled: bool,
    pub reminder_count: i32,
    /// Handle the cached statistics were computed for.
    pub synced_handle: Option<String>,
    pub statistics: Option<Statistics>,
}

impl Student {
    pub fn new(name: &str, email: &str, phone: Option<&str>, handle: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
            handle: Some(handle.to_string()),
            current_rating: 0,
            max_rating: 0,
            last_synced: None,
            inactivity_notified: false,
            reminders_disabled: false,
            reminder_count: 0,
            synced_handle: None,
            statistics: None,
        }
    }

    /// True when the stored statistics can be served without an upstream call.
    pub fn has_fresh_cache(&self) -> bool {
        let solved_any = self
            .statistics
            .as_ref()
            .is_some_and(|stats| !stats.solved_problems.is_empty());

        solved_any && self.synced_handle.is_some() && self.synced_handle == self.handle
    }

    pub fn change_handle(&mut self, handle: &str) {
        self.handle = Some(handle.to_string());
        self.statistics = None;
        self.synced_handle = None;
        self.last_synced = None;
    }

    pub fn heatmap(&self) -> Option<&BTreeMap<NaiveDate, u32>> {
        self.statistics.as_ref().map(|stats| &stats.heatmap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestRecord {
    pub contest_id: i64,
    pub contest_name: String,
    pub rank: i64,
    pub old_rating: i32,
    pub new_rating: i32,
    pub rating_change: i32,
    pub contest_date: DateTime<Utc>,
    pub problems_unsolved: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProblemKey {
    pub contest_id: Option<i64>,
    pub index: String,
}

impl fmt::Display for ProblemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.contest_id {
            Some(contest_id) => write!(f, "{}-{}", contest_id, self.index),
            None => write!(f, "-{}", self.index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolvedProblem {
    pub problem_id: String,
    pub key: ProblemKey,
    pub name: String,
    pub rating: u32,
    pub tags: Vec<String>,
    pub solved_at: DateTime<Utc>,
}

impl SolvedProblem {
    pub fn summary(&self) -> ProblemSummary {
        ProblemSummary {
            problem_id: self.problem_id.clone(),
            name: self.name.clone(),
            rating: self.rating,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSummary {
    pub problem_id: String,
    pub name: String,
    pub rating: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Window {
    Days7,
    Days30,
    Days90,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Days7, Window::Days30, Window::Days90];

    pub fn days(self) -> i64 {
        match self {
            Window::Days7 => 7,
            Window::Days30 => 30,
            Window::Days90 => 90,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedStats {
    pub total_solved: u32,
    pub average_difficulty: u32,
    pub solved_per_day: f64,
    pub difficulty_buckets: BTreeMap<u32, u32>,
    pub most_difficult: Option<ProblemSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatWindows {
    pub d7: WindowedStats,
    pub d30: WindowedStats,
    pub d90: WindowedStats,
}

impl StatWindows {
    pub fn get(&self, window: Window) -> &WindowedStats {
        match window {
            Window::Days7 => &self.d7,
            Window::Days30 => &self.d30,
            Window::Days90 => &self.d90,
        }
    }

    pub fn get_mut(&mut self, window: Window) -> &mut WindowedStats {
        match window {
            Window::Days7 => &mut self.d7,
            Window::Days30 => &mut self.d30,
            Window::Days90 => &mut self.d90,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub contest_history: Vec<ContestRecord>,
    pub solved_problems: Vec<SolvedProblem>,
    pub total_solved: u32,
    pub average_difficulty: u32,
    pub average_solved_per_day: f64,
    pub most_difficult: Option<ProblemSummary>,
    pub difficulty_buckets: BTreeMap<u32, u32>,
    pub heatmap: BTreeMap<NaiveDate, u32>,
    pub windows: StatWindows,
}
