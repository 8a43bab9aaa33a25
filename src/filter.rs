// Filtering and ordering of tasks for display

use crate::models::{Task, normalize_tag};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Completion status constraint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => write!(f, "all"),
            StatusFilter::Active => write!(f, "active"),
            StatusFilter::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "completed" | "done" => Ok(StatusFilter::Completed),
            other => Err(format!("unknown status filter: {} (expected all, active or completed)", other)),
        }
    }
}

/// View state for the task list: status, search term and selected tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Completion status constraint
    pub status: StatusFilter,
    /// Case-insensitive substring of the task text; empty matches everything
    pub search: String,
    /// Tags that must all be present on a task
    pub tags: Vec<String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    /// Select a tag; the tag is normalized the same way stored tags are
    pub fn with_tag(mut self, tag: &str) -> Self {
        match normalize_tag(tag) {
            Some(tag) if !self.tags.contains(&tag) => self.tags.push(tag),
            _ => {}
        }
        self
    }

    /// True if the task satisfies every clause
    pub fn matches(&self, task: &Task) -> bool {
        if !self.status.matches(task) {
            return false;
        }

        if !self.search.is_empty() && !task.text.to_lowercase().contains(&self.search.to_lowercase()) {
            return false;
        }

        task.has_all_tags(&self.tags)
    }
}

/// Display order for two tasks
///
/// Incomplete first, then priority rank, then due date (undated last),
/// then newest id first. Ids are unique, so the order is total.
pub fn compare(a: &Task, b: &Task) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
        .then_with(|| compare_due(a.due_date, b.due_date))
        .then_with(|| b.id.cmp(&a.id))
}

fn compare_due(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort tasks in display order
pub fn sort_tasks(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| compare(a, b));
}

/// Filter then sort; the input is left untouched
pub fn apply<'a>(tasks: &'a [Task], filter: &Filter) -> Vec<&'a Task> {
    let mut visible: Vec<&Task> = tasks.iter().filter(|task| filter.matches(task)).collect();
    sort_tasks(&mut visible);
    visible
}
