use crate::domain::models::{CalendarEvent, EventPatch, NewEvent};
use crate::infrastructure::error::PlannerError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Minute precision with an offset, e.g. `2024-01-01T10:00Z`.
const MINUTE_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M%#z";
/// Offset-less forms, read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Event as the calendar front end reads it: `allDay` instead of `all_day`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventView {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(rename = "allDay")]
    pub all_day: bool,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub priority: i32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPayload {
    pub title: String,
    pub start: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(rename = "allDay", alias = "all_day", default)]
    pub all_day: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventPatchPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(
        rename = "allDay",
        alias = "all_day",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

pub fn encode_event(event: &CalendarEvent) -> EventView {
    EventView {
        id: event.id.clone(),
        owner_id: event.owner_id.clone(),
        title: event.title.clone(),
        start: format_instant(event.start),
        end: format_instant(event.end),
        all_day: event.all_day,
        notes: event.notes.clone(),
        tags: event.tags.clone(),
        priority: event.priority,
        status: event.status.clone(),
    }
}

pub fn decode_new_event(payload: EventPayload) -> Result<NewEvent, PlannerError> {
    Ok(NewEvent {
        start: parse_instant(&payload.start, "start")?,
        end: payload
            .end
            .as_deref()
            .map(|value| parse_instant(value, "end"))
            .transpose()?,
        title: payload.title,
        all_day: payload.all_day,
        notes: payload.notes,
        tags: payload.tags,
        priority: payload.priority,
        status: payload.status,
    })
}

pub fn decode_patch(payload: EventPatchPayload) -> Result<EventPatch, PlannerError> {
    Ok(EventPatch {
        start: payload
            .start
            .as_deref()
            .map(|value| parse_instant(value, "start"))
            .transpose()?,
        end: payload
            .end
            .as_deref()
            .map(|value| parse_instant(value, "end"))
            .transpose()?,
        title: payload.title,
        all_day: payload.all_day,
        notes: payload.notes,
        tags: payload.tags,
        priority: payload.priority,
        status: payload.status,
    })
}

pub fn format_instant(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Accepts RFC 3339 with any offset, minute precision with an offset, or an
/// offset-less date-time taken as UTC. The result is always UTC.
pub fn parse_instant(value: &str, field_name: &str) -> Result<DateTime<Utc>, PlannerError> {
    let trimmed = value.trim();
    let rfc3339_error = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(parsed) => return Ok(parsed.with_timezone(&Utc)),
        Err(error) => error,
    };
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, MINUTE_OFFSET_FORMAT) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            PlannerError::validation(format!(
                "{field_name} must be an ISO 8601 date-time, got '{value}': {rfc3339_error}"
            ))
        })
}
