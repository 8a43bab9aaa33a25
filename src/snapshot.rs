// Snapshot encoding of tasks and settings onto key-value storage

use crate::backend::Storage;
use crate::models::{Language, Settings, Task};
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, info, warn};

pub const KEY_TODOS: &str = "todos";
pub const KEY_DARK_MODE: &str = "darkMode";
pub const KEY_LANGUAGE: &str = "language";
pub const KEY_LAST_ID: &str = "lastId";

/// Load all tasks, skipping records that cannot be used
///
/// A missing key yields an empty list. An unparseable value also yields an
/// empty list (with a warning) so a damaged file never blocks startup.
pub fn load_tasks<S: Storage + ?Sized>(storage: &S) -> Result<Vec<Task>> {
    let Some(raw) = storage.read(KEY_TODOS)? else {
        debug!("No saved tasks, starting empty");
        return Ok(Vec::new());
    };

    let items = match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Array(items)) => items,
        Ok(other) => {
            warn!(kind = value_kind(&other), "Saved tasks are not an array, ignoring");
            return Ok(Vec::new());
        }
        Err(e) => {
            warn!(error = ?e, "Failed to parse saved tasks, ignoring");
            return Ok(Vec::new());
        }
    };

    let mut tasks = Vec::with_capacity(items.len());
    let mut seen = HashSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let task: Task = match serde_json::from_value(item) {
            Ok(t) => t,
            Err(e) => {
                warn!(index, error = ?e, "Failed to parse task, skipping");
                continue;
            }
        };

        if task.id == 0 || task.text.trim().is_empty() {
            warn!(index, id = task.id, "Task has no usable id or text, skipping");
            continue;
        }
        if !seen.insert(task.id) {
            warn!(index, id = task.id, "Duplicate task id, skipping");
            continue;
        }

        let mut task = task;
        task.recompute_completed();
        tasks.push(task);
    }

    info!(count = tasks.len(), "Loaded tasks");
    Ok(tasks)
}

/// Replace the saved task list with `tasks`
pub fn save_tasks<S: Storage + ?Sized>(storage: &mut S, tasks: &[Task]) -> Result<()> {
    let json = serde_json::to_string(tasks).context("Failed to serialize tasks")?;
    storage.write(KEY_TODOS, &json)?;
    debug!(count = tasks.len(), "Saved tasks");
    Ok(())
}

/// Highest id ever issued, if recorded
pub fn load_last_id<S: Storage + ?Sized>(storage: &S) -> Result<Option<u64>> {
    Ok(storage.read(KEY_LAST_ID)?.and_then(|raw| raw.trim().parse().ok()))
}

pub fn save_last_id<S: Storage + ?Sized>(storage: &mut S, last_id: u64) -> Result<()> {
    storage.write(KEY_LAST_ID, &last_id.to_string())
}

/// Load settings; absent or malformed values fall back to defaults
pub fn load_settings<S: Storage + ?Sized>(storage: &S) -> Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = storage.read(KEY_DARK_MODE)? {
        match serde_json::from_str::<bool>(raw.trim()) {
            Ok(dark) => settings.dark_mode = dark,
            Err(e) => warn!(error = ?e, "Ignoring malformed dark mode setting"),
        }
    }

    // Stored as the bare code, but tolerate a JSON string too
    if let Some(raw) = storage.read(KEY_LANGUAGE)? {
        match raw.trim().trim_matches('"').parse::<Language>() {
            Ok(language) => settings.language = language,
            Err(e) => warn!(error = %e, "Ignoring malformed language setting"),
        }
    }

    Ok(settings)
}

/// Save both settings, each under its own key
pub fn save_settings<S: Storage + ?Sized>(storage: &mut S, settings: &Settings) -> Result<()> {
    storage.write(KEY_DARK_MODE, &serde_json::to_string(&settings.dark_mode)?)?;
    storage.write(KEY_LANGUAGE, settings.language.code())?;
    Ok(())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryStorage;
    use crate::models::Priority;

    fn storage_with(raw: &str) -> MemoryStorage {
        let mut storage = MemoryStorage::new();
        storage.write(KEY_TODOS, raw).unwrap();
        storage
    }

    #[test]
    fn test_load_missing_is_empty() {
        let storage = MemoryStorage::new();
        assert!(load_tasks(&storage).unwrap().is_empty());
    }

    #[test]
    fn test_load_garbage_is_empty() {
        assert!(load_tasks(&storage_with("{not json")).unwrap().is_empty());
        assert!(load_tasks(&storage_with("{\"id\":1}")).unwrap().is_empty());
        assert!(load_tasks(&storage_with("null")).unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_unusable_records() {
        let storage = storage_with(
            r#"[
                {"id":1,"text":"Valid"},
                {"text":"No id"},
                {"id":2,"text":"   "},
                {"id":1,"text":"Duplicate"},
                "not an object",
                {"id":3,"text":"Also valid","priority":"high"}
            ]"#,
        );

        let tasks = load_tasks(&storage).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].text, "Valid");
        assert_eq!(tasks[1].id, 3);
        assert_eq!(tasks[1].priority, Priority::High);
    }

    #[test]
    fn test_load_rederives_completion_from_subtasks() {
        let storage = storage_with(
            r#"[
                {"id":1,"text":"all done","completed":false,"subtasks":[{"id":2,"text":"a","completed":true}]},
                {"id":3,"text":"half done","completed":true,"subtasks":[{"id":4,"text":"a","completed":true},{"id":5,"text":"b"}]},
                {"id":6,"text":"no subtasks","completed":true}
            ]"#,
        );

        let tasks = load_tasks(&storage).unwrap();
        assert!(tasks[0].completed);
        assert!(!tasks[1].completed);
        assert!(tasks[2].completed);
    }

    #[test]
    fn test_load_skips_oversized_float_id() {
        let storage = storage_with(r#"[{"id":1e30,"text":"too big"},{"id":7,"text":"fine"}]"#);

        let tasks = load_tasks(&storage).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 7);
    }

    #[test]
    fn test_save_then_load_keeps_order() {
        let mut storage = MemoryStorage::new();
        let tasks: Vec<Task> = serde_json::from_str(
            r#"[{"id":5,"text":"b","tags":["x"]},{"id":2,"text":"a","dueDate":"2024-01-02"}]"#,
        )
        .unwrap();

        save_tasks(&mut storage, &tasks).unwrap();
        let loaded = load_tasks(&storage).unwrap();
        assert_eq!(loaded, tasks);
    }

    #[test]
    fn test_last_id() {
        let mut storage = MemoryStorage::new();
        assert_eq!(load_last_id(&storage).unwrap(), None);

        save_last_id(&mut storage, 42).unwrap();
        assert_eq!(load_last_id(&storage).unwrap(), Some(42));

        storage.write(KEY_LAST_ID, "junk").unwrap();
        assert_eq!(load_last_id(&storage).unwrap(), None);
    }

    #[test]
    fn test_settings_defaults() {
        let storage = MemoryStorage::new();
        let settings = load_settings(&storage).unwrap();
        assert!(!settings.dark_mode);
        assert_eq!(settings.language, Language::Tr);
    }

    #[test]
    fn test_settings_layout() {
        let mut storage = MemoryStorage::new();
        let settings = Settings {
            dark_mode: true,
            language: Language::En,
        };
        save_settings(&mut storage, &settings).unwrap();

        assert_eq!(storage.read(KEY_DARK_MODE).unwrap().as_deref(), Some("true"));
        assert_eq!(storage.read(KEY_LANGUAGE).unwrap().as_deref(), Some("en"));
        assert_eq!(load_settings(&storage).unwrap(), settings);
    }

    #[test]
    fn test_settings_tolerate_malformed_values() {
        let mut storage = MemoryStorage::new();
        storage.write(KEY_DARK_MODE, "maybe").unwrap();
        storage.write(KEY_LANGUAGE, "\"en\"").unwrap();

        let settings = load_settings(&storage).unwrap();
        assert!(!settings.dark_mode);
        assert_eq!(settings.language, Language::En);
    }
}
