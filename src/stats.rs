// Summary statistics over the whole task collection

use crate::models::{Priority, Task};
use chrono::{Days, NaiveDate};
use serde::Serialize;

/// Default width of the upcoming window, in days after today
pub const UPCOMING_DAYS: u64 = 3;

/// Number of tasks per priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PriorityDistribution {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl PriorityDistribution {
    pub fn get(&self, priority: Priority) -> usize {
        match priority {
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }

    fn bump(&mut self, priority: Priority) {
        match priority {
            Priority::High => self.high += 1,
            Priority::Normal => self.normal += 1,
            Priority::Low => self.low += 1,
        }
    }
}

/// Task counts for the status selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

impl Counts {
    pub fn compute(tasks: &[Task]) -> Self {
        let completed = tasks.iter().filter(|t| t.completed).count();
        Self {
            total: tasks.len(),
            active: tasks.len() - completed,
            completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Percentage of completed tasks, rounded, 0 for an empty list
    pub completion_rate: u8,
    pub priority_distribution: PriorityDistribution,
    /// Incomplete tasks due before `today`
    pub overdue_count: usize,
    /// Incomplete tasks due between `today` and `today + window` inclusive
    pub upcoming_count: usize,
}

impl Stats {
    /// Compute statistics using the default three-day upcoming window
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        Self::compute_with_window(tasks, today, UPCOMING_DAYS)
    }

    pub fn compute_with_window(tasks: &[Task], today: NaiveDate, upcoming_days: u64) -> Self {
        let counts = Counts::compute(tasks);
        let horizon = today.checked_add_days(Days::new(upcoming_days)).unwrap_or(NaiveDate::MAX);

        let mut stats = Stats {
            completion_rate: completion_rate(counts.completed, counts.total),
            ..Default::default()
        };

        for task in tasks {
            stats.priority_distribution.bump(task.priority);

            if task.completed {
                continue;
            }
            if let Some(due) = task.due_date {
                if due < today {
                    stats.overdue_count += 1;
                } else if due <= horizon {
                    stats.upcoming_count += 1;
                }
            }
        }

        stats
    }
}

fn completion_rate(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}
