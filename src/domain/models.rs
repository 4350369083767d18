use crate::domain::availability::{Availability, TimeSlot};
use crate::infrastructure::error::PlannerError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_EVENT_STATUS: &str = "planned";
pub const DEFAULT_EVENT_LENGTH_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub priority: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), PlannerError> {
        validate_non_empty(&self.id, "event.id")?;
        validate_non_empty(&self.owner_id, "event.owner_id")?;
        validate_non_empty(&self.title, "event.title")?;
        validate_interval(self.start, self.end)
    }

    pub fn overlaps(&self, window: &EventWindow) -> bool {
        window.overlaps(self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub priority: Option<i32>,
    pub status: Option<String>,
}

impl NewEvent {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start,
            end: None,
            all_day: false,
            notes: None,
            tags: None,
            priority: None,
            status: None,
        }
    }

    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end
            .unwrap_or(self.start + Duration::minutes(DEFAULT_EVENT_LENGTH_MINUTES))
    }

    pub fn into_event(
        self,
        id: String,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvent, PlannerError> {
        let end = self.effective_end();
        let event = CalendarEvent {
            id,
            owner_id: owner_id.to_string(),
            title: self.title.trim().to_string(),
            start: self.start,
            end,
            all_day: self.all_day,
            notes: self.notes,
            tags: self.tags,
            priority: self.priority.unwrap_or(0),
            status: self
                .status
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT_STATUS.to_string()),
            created_at: now,
            updated_at: now,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub priority: Option<i32>,
    pub status: Option<String>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Builds the prospective record and validates it before anything is written.
    pub fn apply_to(
        &self,
        current: &CalendarEvent,
        now: DateTime<Utc>,
    ) -> Result<CalendarEvent, PlannerError> {
        let mut merged = current.clone();
        if let Some(title) = &self.title {
            merged.title = title.trim().to_string();
        }
        if let Some(start) = self.start {
            merged.start = start;
        }
        if let Some(end) = self.end {
            merged.end = end;
        }
        if let Some(all_day) = self.all_day {
            merged.all_day = all_day;
        }
        if let Some(notes) = &self.notes {
            merged.notes = Some(notes.clone());
        }
        if let Some(tags) = &self.tags {
            merged.tags = Some(tags.clone());
        }
        if let Some(priority) = self.priority {
            merged.priority = priority;
        }
        if let Some(status) = &self.status {
            merged.status = status.trim().to_string();
            validate_non_empty(&merged.status, "event.status")?;
        }
        merged.validate()?;
        merged.updated_at = now;
        Ok(merged)
    }
}

/// Half-open visible window; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl EventWindow {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn overlaps(&self, event_start: DateTime<Utc>, event_end: DateTime<Utc>) -> bool {
        let after_start = self.start.map(|start| event_end > start).unwrap_or(true);
        let before_end = self.end.map(|end| event_start < end).unwrap_or(true);
        after_start && before_end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub raw_survey_text: String,
    pub availability: Availability,
}

impl UserProfile {
    pub fn validate(&self) -> Result<(), PlannerError> {
        validate_non_empty(&self.id, "profile.id")?;
        self.availability.validate()
    }
}

/// A proposal from the generator; never persisted until committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateTask {
    pub title: String,
    pub tags: BTreeSet<String>,
    pub duration_minutes: i64,
    pub scheduled_slot: TimeSlot,
}

impl CandidateTask {
    pub fn joined_tags(&self) -> String {
        self.tags.iter().cloned().collect::<Vec<_>>().join(",")
    }
}

pub fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), PlannerError> {
    if end <= start {
        return Err(PlannerError::validation(format!(
            "event end {} must be after start {}",
            end.to_rfc3339(),
            start.to_rfc3339()
        )));
    }
    Ok(())
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), PlannerError> {
    if value.trim().is_empty() {
        return Err(PlannerError::validation(format!("{field_name} must not be empty")));
    }
    Ok(())
}
