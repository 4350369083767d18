use crate::infrastructure::error::PlannerError;
use crate::infrastructure::kv_store::KeyValueStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindOutcome {
    Linked,
    AlreadyLinked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub from: String,
    pub text: String,
}

/// Ratings are fractions in [0, 1]; a higher difficulty lowers the score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskFeedback {
    pub rating: f64,
    pub difficulty: f64,
    pub time_efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub task_name: String,
    pub feedback: TaskFeedback,
    pub score: f64,
}

pub const CALENDAR_SOURCE: &str = "calendar";
pub const PENDING_STATUS: &str = "pending";

/// An item from an external calendar to copy into a child's task list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarImport {
    pub child_id: String,
    pub event_title: String,
    pub duration_minutes: i64,
}

/// Raw entry in a child's external calendar log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarLogEntry {
    pub title: String,
    pub duration_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildTask {
    pub name: String,
    pub duration_minutes: i64,
    pub source: String,
    pub status: String,
}

pub fn feedback_score(feedback: &TaskFeedback) -> Result<f64, PlannerError> {
    for (name, value) in [
        ("rating", feedback.rating),
        ("difficulty", feedback.difficulty),
        ("time_efficiency", feedback.time_efficiency),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(PlannerError::validation(format!(
                "{name} must be between 0 and 1, got {value}"
            )));
        }
    }
    let raw = (feedback.rating + (1.0 - feedback.difficulty) + feedback.time_efficiency) / 3.0;
    Ok((raw * 100.0).round() / 100.0)
}

pub struct FamilyService {
    store: Arc<dyn KeyValueStore>,
}

impl FamilyService {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn bind(&self, parent_id: &str, child_id: &str) -> Result<BindOutcome, PlannerError> {
        let parent_id = required(parent_id, "parent_id")?;
        let child_id = required(child_id, "child_id")?;
        let key = children_key(parent_id);
        let mut outcome = BindOutcome::AlreadyLinked;
        let current = decode_list::<String>(self.store.get(&key)?, &key)?;
        if !current.iter().any(|existing| existing == child_id) {
            self.store.update(&key, &|stored| {
                let mut children = decode_list::<String>(stored, &key)?;
                if !children.iter().any(|existing| existing == child_id) {
                    children.push(child_id.to_string());
                }
                Ok(serde_json::to_value(children)?)
            })?;
            outcome = BindOutcome::Linked;
        }
        Ok(outcome)
    }

    pub fn children(&self, parent_id: &str) -> Result<Vec<String>, PlannerError> {
        let key = children_key(parent_id.trim());
        decode_list(self.store.get(&key)?, &key)
    }

    pub fn suggest(
        &self,
        parent_id: &str,
        child_id: &str,
        text: &str,
    ) -> Result<Suggestion, PlannerError> {
        let suggestion = Suggestion {
            from: required(parent_id, "parent_id")?.to_string(),
            text: required(text, "text")?.to_string(),
        };
        let key = suggestions_key(required(child_id, "child_id")?);
        let entry = serde_json::to_value(&suggestion)?;
        self.store.update(&key, &|stored| {
            let mut items = decode_list::<Value>(stored, &key)?;
            items.push(entry.clone());
            Ok(Value::Array(items))
        })?;
        Ok(suggestion)
    }

    pub fn suggestions(&self, child_id: &str) -> Result<Vec<Suggestion>, PlannerError> {
        let key = suggestions_key(child_id.trim());
        decode_list(self.store.get(&key)?, &key)
    }

    pub fn record_feedback(
        &self,
        user_id: &str,
        task_name: &str,
        feedback: TaskFeedback,
    ) -> Result<FeedbackRecord, PlannerError> {
        let record = FeedbackRecord {
            task_name: required(task_name, "task_name")?.to_string(),
            score: feedback_score(&feedback)?,
            feedback,
        };
        let key = feedback_key(required(user_id, "user_id")?);
        let entry = serde_json::to_value(&record)?;
        self.store.update(&key, &|stored| {
            let mut items = decode_list::<Value>(stored, &key)?;
            items.push(entry.clone());
            Ok(Value::Array(items))
        })?;
        Ok(record)
    }

    pub fn feedback(&self, user_id: &str) -> Result<Vec<FeedbackRecord>, PlannerError> {
        let key = feedback_key(user_id.trim());
        decode_list(self.store.get(&key)?, &key)
    }

    /// Appends to the child's calendar log and task list.
    pub fn import_calendar_event(&self, import: &CalendarImport) -> Result<ChildTask, PlannerError> {
        let child_id = required(&import.child_id, "child_id")?;
        let title = required(&import.event_title, "event_title")?;
        validate_duration(import.duration_minutes)?;

        let entry = serde_json::to_value(CalendarLogEntry {
            title: title.to_string(),
            duration_minutes: import.duration_minutes,
        })?;
        let log_key = calendar_log_key(child_id);
        self.store.update(&log_key, &|stored| {
            let mut items = decode_list::<Value>(stored, &log_key)?;
            items.push(entry.clone());
            Ok(Value::Array(items))
        })?;

        let task = ChildTask {
            name: title.to_string(),
            duration_minutes: import.duration_minutes,
            source: CALENDAR_SOURCE.to_string(),
            status: PENDING_STATUS.to_string(),
        };
        let task_entry = serde_json::to_value(&task)?;
        let tasks_key = tasks_key(child_id);
        self.store.update(&tasks_key, &|stored| {
            let mut items = decode_list::<Value>(stored, &tasks_key)?;
            items.push(task_entry.clone());
            Ok(Value::Array(items))
        })?;
        Ok(task)
    }

    pub fn calendar_log(&self, child_id: &str) -> Result<Vec<CalendarLogEntry>, PlannerError> {
        let key = calendar_log_key(child_id.trim());
        decode_list(self.store.get(&key)?, &key)
    }

    /// Renames and re-times the first imported item titled `old_title`.
    ///
    /// `NotFound` when the log has no such title; the task list then stays untouched.
    pub fn update_imported_event(
        &self,
        child_id: &str,
        old_title: &str,
        new_title: &str,
        new_duration_minutes: i64,
    ) -> Result<CalendarLogEntry, PlannerError> {
        let child_id = required(child_id, "child_id")?;
        let old_title = old_title.trim();
        let updated = CalendarLogEntry {
            title: required(new_title, "new_title")?.to_string(),
            duration_minutes: new_duration_minutes,
        };
        validate_duration(new_duration_minutes)?;

        let log_key = calendar_log_key(child_id);
        self.store.update(&log_key, &|stored| {
            let mut entries = decode_list::<CalendarLogEntry>(stored, &log_key)?;
            let entry = entries
                .iter_mut()
                .find(|entry| entry.title == old_title)
                .ok_or_else(|| {
                    PlannerError::NotFound(format!("imported event not found: {old_title}"))
                })?;
            *entry = updated.clone();
            Ok(serde_json::to_value(entries)?)
        })?;

        let tasks_key = tasks_key(child_id);
        self.store.update(&tasks_key, &|stored| {
            let mut tasks = decode_list::<ChildTask>(stored, &tasks_key)?;
            if let Some(task) = tasks.iter_mut().find(|task| task.name == old_title) {
                task.name = updated.title.clone();
                task.duration_minutes = updated.duration_minutes;
            }
            Ok(serde_json::to_value(tasks)?)
        })?;
        Ok(updated)
    }

    pub fn child_tasks(&self, child_id: &str) -> Result<Vec<ChildTask>, PlannerError> {
        let key = tasks_key(child_id.trim());
        decode_list(self.store.get(&key)?, &key)
    }

    /// Task lists of every child linked to the parent, keyed by child id.
    pub fn children_tasks(
        &self,
        parent_id: &str,
    ) -> Result<BTreeMap<String, Vec<ChildTask>>, PlannerError> {
        self.children(parent_id)?
            .into_iter()
            .map(|child_id| {
                let tasks = self.child_tasks(&child_id)?;
                Ok::<_, PlannerError>((child_id, tasks))
            })
            .collect()
    }
}

fn calendar_log_key(child_id: &str) -> String {
    format!("child:{child_id}:calendar_log")
}

fn tasks_key(child_id: &str) -> String {
    format!("child:{child_id}:tasks")
}

fn validate_duration(minutes: i64) -> Result<(), PlannerError> {
    if minutes <= 0 {
        return Err(PlannerError::validation(format!(
            "duration_minutes must be positive, got {minutes}"
        )));
    }
    Ok(())
}

fn children_key(parent_id: &str) -> String {
    format!("parent:{parent_id}:children")
}

fn suggestions_key(child_id: &str) -> String {
    format!("child:{child_id}:suggestions")
}

fn feedback_key(user_id: &str) -> String {
    format!("user:{user_id}:feedback")
}

fn required<'a>(value: &'a str, field_name: &str) -> Result<&'a str, PlannerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PlannerError::validation(format!("{field_name} must not be empty")));
    }
    Ok(trimmed)
}

fn decode_list<T: for<'de> Deserialize<'de>>(
    stored: Option<Value>,
    key: &str,
) -> Result<Vec<T>, PlannerError> {
    match stored {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value @ Value::Array(_)) => Ok(serde_json::from_value(value)?),
        Some(_) => Err(PlannerError::InvalidConfig(format!(
            "expected a list under {key}"
        ))),
    }
}
