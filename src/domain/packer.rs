use crate::domain::availability::AvailabilityZone;
use crate::domain::models::{CandidateTask, NewEvent};
use crate::infrastructure::error::PlannerError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 09:00 in minutes since midnight.
pub const DAY_ANCHOR_MINUTES: i64 = 9 * 60;
pub const DEFAULT_TASK_MINUTES: i64 = 30;
const UNNAMED_TASK: &str = "Unnamed Task";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackRequest {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_duration", alias = "duration")]
    pub duration_minutes: i64,
}

impl PackRequest {
    pub fn new(name: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
        }
    }
}

impl From<&CandidateTask> for PackRequest {
    fn from(task: &CandidateTask) -> Self {
        Self::new(task.title.clone(), task.duration_minutes)
    }
}

/// Output only: the minute offsets are not part of the serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackedTask {
    pub name: String,
    pub duration_minutes: i64,
    pub start_time: String,
    pub end_time: String,
    #[serde(skip)]
    start_minutes: i64,
    #[serde(skip)]
    end_minutes: i64,
}

impl PackedTask {
    pub fn start_minutes(&self) -> i64 {
        self.start_minutes
    }

    pub fn end_minutes(&self) -> i64 {
        self.end_minutes
    }

    /// Places the packed offsets on `date`; offsets past 24:00 roll into the next day.
    pub fn to_new_event(
        &self,
        date: NaiveDate,
        zone: &AvailabilityZone,
        tags: Option<String>,
    ) -> Result<NewEvent, PlannerError> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| PlannerError::validation(format!("invalid date: {date}")))?;
        let start = zone.to_utc(offset_from(midnight, self.start_minutes)?)?;
        let end = zone.to_utc(offset_from(midnight, self.end_minutes)?)?;
        Ok(NewEvent {
            end: Some(end),
            tags,
            ..NewEvent::new(self.name.clone(), start)
        })
    }
}

/// Back-to-back placement from the 09:00 anchor in input order.
///
/// Durations are taken verbatim: zero or negative values produce empty or
/// inverted slots, and times past midnight are emitted as e.g. "25:30".
/// The cursor saturates instead of overflowing on huge durations.
pub fn pack(tasks: &[PackRequest]) -> Vec<PackedTask> {
    let mut cursor = DAY_ANCHOR_MINUTES;
    tasks
        .iter()
        .map(|task| {
            let start = cursor;
            let end = cursor.saturating_add(task.duration_minutes);
            cursor = end;
            PackedTask {
                name: task.name.clone(),
                duration_minutes: task.duration_minutes,
                start_time: format_minutes(start),
                end_time: format_minutes(end),
                start_minutes: start,
                end_minutes: end,
            }
        })
        .collect()
}

pub fn pack_candidates(tasks: &[CandidateTask]) -> Vec<PackedTask> {
    let requests = tasks.iter().map(PackRequest::from).collect::<Vec<_>>();
    pack(&requests)
}

pub fn format_minutes(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes.div_euclid(60), minutes.rem_euclid(60))
}

fn offset_from(midnight: NaiveDateTime, minutes: i64) -> Result<NaiveDateTime, PlannerError> {
    Duration::try_minutes(minutes)
        .and_then(|offset| midnight.checked_add_signed(offset))
        .ok_or_else(|| {
            PlannerError::validation(format!("packed offset of {minutes} minutes is out of range"))
        })
}

fn default_name() -> String {
    UNNAMED_TASK.to_string()
}

fn default_duration() -> i64 {
    DEFAULT_TASK_MINUTES
}
