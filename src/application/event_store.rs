use crate::domain::models::{CalendarEvent, EventPatch, EventWindow, NewEvent, validate_non_empty};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::event_repository::EventRepository;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Owner-scoped calendar events. Missing and foreign records both surface as `NotFound`.
pub struct EventStore {
    repository: Arc<dyn EventRepository>,
}

impl EventStore {
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self { repository }
    }

    pub fn create(&self, owner_id: &str, fields: NewEvent) -> Result<CalendarEvent, PlannerError> {
        let mut created = self.bulk_create(owner_id, vec![fields])?;
        created
            .pop()
            .ok_or_else(|| PlannerError::validation("no event was created"))
    }

    /// Validates every item before writing any of them.
    pub fn bulk_create(
        &self,
        owner_id: &str,
        items: Vec<NewEvent>,
    ) -> Result<Vec<CalendarEvent>, PlannerError> {
        validate_non_empty(owner_id, "owner_id")?;
        let now = Utc::now();
        let events = items
            .into_iter()
            .enumerate()
            .map(|(index, fields)| {
                fields
                    .into_event(Uuid::new_v4().to_string(), owner_id, now)
                    .map_err(|error| match error {
                        PlannerError::Validation(message) => {
                            PlannerError::Validation(format!("item {index}: {message}"))
                        }
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.repository.insert_all(&events)?;
        Ok(events)
    }

    pub fn get(&self, owner_id: &str, event_id: &str) -> Result<CalendarEvent, PlannerError> {
        self.repository
            .find(owner_id, event_id.trim())?
            .ok_or_else(|| PlannerError::event_not_found(event_id))
    }

    pub fn list(&self, owner_id: &str, window: EventWindow) -> Result<Vec<CalendarEvent>, PlannerError> {
        self.repository.list(owner_id, &window)
    }

    pub fn update(
        &self,
        owner_id: &str,
        event_id: &str,
        patch: &EventPatch,
    ) -> Result<CalendarEvent, PlannerError> {
        let now = Utc::now();
        self.repository
            .update_with(owner_id, event_id.trim(), &|current| patch.apply_to(current, now))?
            .ok_or_else(|| PlannerError::event_not_found(event_id))
    }

    pub fn delete(&self, owner_id: &str, event_id: &str) -> Result<(), PlannerError> {
        if self.repository.remove(owner_id, event_id.trim())? {
            Ok(())
        } else {
            Err(PlannerError::event_not_found(event_id))
        }
    }
}
