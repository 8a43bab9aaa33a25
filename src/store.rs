// Task store: owns the task list and persists it after every mutation

use crate::backend::Storage;
use crate::filter::{self, Filter};
use crate::models::{Priority, Subtask, Task, normalize_tags, now_ms};
use crate::snapshot;
use crate::stats::{Counts, Stats};
use chrono::NaiveDate;
use eyre::Result;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Input for [`Store::add`]
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub text: String,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub tags: Vec<String>,
    /// Subtask texts; each becomes an incomplete subtask
    pub subtasks: Vec<String>,
}

impl NewTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn subtask(mut self, text: impl Into<String>) -> Self {
        self.subtasks.push(text.into());
        self
    }
}

/// A subtask as supplied to [`Store::edit`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtaskDraft {
    /// Existing id to keep; `None` (or a clash) gets a fresh one
    pub id: Option<u64>,
    pub text: String,
    pub completed: bool,
}

impl SubtaskDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            completed: false,
        }
    }
}

impl From<&Subtask> for SubtaskDraft {
    fn from(subtask: &Subtask) -> Self {
        Self {
            id: Some(subtask.id),
            text: subtask.text.clone(),
            completed: subtask.completed,
        }
    }
}

/// Full replacement of a task's editable fields, see [`Store::edit`]
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub text: String,
    /// `None` resets to normal
    pub priority: Option<Priority>,
    /// `None` clears the due date
    pub due_date: Option<NaiveDate>,
    pub subtasks: Vec<SubtaskDraft>,
    pub tags: Vec<String>,
}

impl TaskEdit {
    /// Start from the task's current values
    pub fn from_task(task: &Task) -> Self {
        Self {
            text: task.text.clone(),
            priority: Some(task.priority),
            due_date: task.due_date,
            subtasks: task.subtasks.iter().map(SubtaskDraft::from).collect(),
            tags: task.tags.clone(),
        }
    }
}

/// Owner of the task list
///
/// Every mutation that takes effect writes the full snapshot back to the
/// storage. Write failures are logged and otherwise ignored: the in-memory
/// state stays authoritative and the next mutation writes again.
pub struct Store<S: Storage> {
    storage: S,
    tasks: Vec<Task>,
    last_id: u64,
}

impl<S: Storage> Store<S> {
    /// Open a store over the given storage, loading any saved tasks
    pub fn open(storage: S) -> Result<Self> {
        let tasks = snapshot::load_tasks(&storage)?;
        let saved_last_id = snapshot::load_last_id(&storage)?.unwrap_or(0);

        let max_seen = tasks
            .iter()
            .flat_map(|t| std::iter::once(t.id).chain(t.subtasks.iter().map(|st| st.id)))
            .max()
            .unwrap_or(0);

        let mut store = Self {
            storage,
            tasks,
            last_id: saved_last_id.max(max_seen),
        };
        store.repair_subtask_ids();

        info!(count = store.tasks.len(), last_id = store.last_id, "Opened store");
        Ok(store)
    }

    /// Get a reference to the underlying storage
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// All tasks in insertion order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add a task, returning its id; empty text is ignored
    pub fn add(&mut self, new: NewTask) -> Option<u64> {
        let text = new.text.trim();
        if text.is_empty() {
            debug!("add: empty text, ignoring");
            return None;
        }

        let Some(id) = self.next_id() else {
            warn!(last_id = self.last_id, "add: id space exhausted, ignoring");
            return None;
        };
        let subtasks: Option<Vec<Subtask>> = new
            .subtasks
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                Some(Subtask {
                    id: self.next_id()?,
                    text: s.to_string(),
                    completed: false,
                })
            })
            .collect();
        let Some(subtasks) = subtasks else {
            warn!(last_id = self.last_id, "add: id space exhausted, ignoring");
            return None;
        };

        self.tasks.push(Task {
            id,
            text: text.to_string(),
            completed: false,
            priority: new.priority,
            due_date: new.due_date,
            tags: normalize_tags(&new.tags),
            subtasks,
        });

        debug!(id, "add: created task");
        self.persist();
        Some(id)
    }

    /// Toggle a task, or one of its subtasks
    ///
    /// Toggling a subtask sets the task's completion to "all subtasks done".
    /// Toggling the task cascades the new value to every subtask.
    pub fn toggle(&mut self, task_id: u64, subtask_id: Option<u64>) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            return false;
        };

        match subtask_id {
            Some(subtask_id) => {
                let Some(subtask) = task.subtasks.iter_mut().find(|st| st.id == subtask_id) else {
                    return false;
                };
                subtask.completed = !subtask.completed;
                task.recompute_completed();
            }
            None => {
                task.completed = !task.completed;
                let completed = task.completed;
                for subtask in &mut task.subtasks {
                    subtask.completed = completed;
                }
            }
        }

        debug!(task_id, ?subtask_id, "toggle: done");
        self.persist();
        true
    }

    /// Replace a task's editable fields
    ///
    /// Rejected entirely if the trimmed text is empty. The completion flag is
    /// rederived from the new subtasks when there is at least one.
    pub fn edit(&mut self, task_id: u64, edit: TaskEdit) -> bool {
        let text = edit.text.trim();
        if text.is_empty() {
            debug!(task_id, "edit: empty text, rejecting");
            return false;
        }
        let Some(index) = self.position(task_id) else {
            return false;
        };

        let mut used = HashSet::new();
        let mut subtasks = Vec::with_capacity(edit.subtasks.len());
        for draft in &edit.subtasks {
            let text = draft.text.trim();
            if text.is_empty() {
                continue;
            }
            let id = match draft.id {
                Some(id) if id != 0 && !used.contains(&id) => {
                    self.last_id = self.last_id.max(id);
                    id
                }
                _ => match self.next_id() {
                    Some(id) => id,
                    None => {
                        warn!(task_id, "edit: id space exhausted, rejecting");
                        return false;
                    }
                },
            };
            used.insert(id);
            subtasks.push(Subtask {
                id,
                text: text.to_string(),
                completed: draft.completed,
            });
        }

        let task = &mut self.tasks[index];
        task.text = text.to_string();
        task.priority = edit.priority.unwrap_or_default();
        task.due_date = edit.due_date;
        task.subtasks = subtasks;
        task.tags = normalize_tags(&edit.tags);
        task.recompute_completed();

        debug!(task_id, "edit: done");
        self.persist();
        true
    }

    /// Append an incomplete subtask, returning its id; empty text is ignored
    pub fn add_subtask(&mut self, task_id: u64, text: &str) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let index = self.position(task_id)?;

        let id = self.next_id()?;
        let task = &mut self.tasks[index];
        task.subtasks.push(Subtask {
            id,
            text: text.to_string(),
            completed: false,
        });
        task.recompute_completed();

        debug!(task_id, subtask_id = id, "add_subtask: done");
        self.persist();
        Some(id)
    }

    /// Remove a subtask; the parent's completion flag is left as is
    pub fn delete_subtask(&mut self, task_id: u64, subtask_id: u64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            return false;
        };

        let before = task.subtasks.len();
        task.subtasks.retain(|st| st.id != subtask_id);
        if task.subtasks.len() == before {
            return false;
        }

        debug!(task_id, subtask_id, "delete_subtask: done");
        self.persist();
        true
    }

    /// Remove a task
    pub fn delete(&mut self, task_id: u64) -> bool {
        let Some(index) = self.position(task_id) else {
            return false;
        };
        self.tasks.remove(index);

        debug!(task_id, "delete: done");
        self.persist();
        true
    }

    /// Remove every completed task, returning how many were removed
    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let removed = before - self.tasks.len();

        if removed > 0 {
            debug!(removed, "clear_completed: done");
            self.persist();
        }
        removed
    }

    // ========================================================================
    // Derived views
    // ========================================================================

    /// Tasks matching the filter, in display order
    pub fn view(&self, filter: &Filter) -> Vec<&Task> {
        filter::apply(&self.tasks, filter)
    }

    pub fn stats(&self, today: NaiveDate) -> Stats {
        Stats::compute(&self.tasks, today)
    }

    pub fn counts(&self) -> Counts {
        Counts::compute(&self.tasks)
    }

    /// Every distinct tag, in the order first seen
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        for tag in self.tasks.iter().flat_map(|t| t.tags.iter()) {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn position(&self, task_id: u64) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    /// Next id: the current millisecond, or one past the last id if that is
    /// not larger. `None` once the id space is used up.
    fn next_id(&mut self) -> Option<u64> {
        let id = (now_ms().max(0) as u64).max(self.last_id.checked_add(1)?);
        self.last_id = id;
        Some(id)
    }

    /// Give fresh ids to subtasks loaded without one or with a clashing one
    ///
    /// Subtasks that cannot get an id are dropped.
    fn repair_subtask_ids(&mut self) {
        for index in 0..self.tasks.len() {
            let task_id = self.tasks[index].id;
            let subtasks = std::mem::take(&mut self.tasks[index].subtasks);
            let mut used = HashSet::new();
            let mut repaired = Vec::with_capacity(subtasks.len());

            for mut subtask in subtasks {
                if subtask.id == 0 || used.contains(&subtask.id) {
                    let Some(fresh) = self.next_id() else {
                        warn!(task_id, old = subtask.id, "No id left for subtask, dropping");
                        continue;
                    };
                    warn!(task_id, old = subtask.id, new = fresh, "Reassigning subtask id");
                    subtask.id = fresh;
                }
                used.insert(subtask.id);
                repaired.push(subtask);
            }

            self.tasks[index].subtasks = repaired;
        }
    }

    fn persist(&mut self) {
        if let Err(e) = snapshot::save_tasks(&mut self.storage, &self.tasks) {
            warn!(error = ?e, "Failed to save tasks");
            return;
        }
        if let Err(e) = snapshot::save_last_id(&mut self.storage, self.last_id) {
            warn!(error = ?e, "Failed to save last id");
        }
    }
}
