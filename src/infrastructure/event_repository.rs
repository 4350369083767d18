use crate::domain::models::{CalendarEvent, EventWindow};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::storage::{decode_timestamp, encode_timestamp};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const EVENT_COLUMNS: &str = "id, owner_id, title, start_at, end_at, all_day, notes, tags, priority, status, created_at, updated_at";

pub type EventUpdate<'a> = &'a dyn Fn(&CalendarEvent) -> Result<CalendarEvent, PlannerError>;

/// Owner-scoped event persistence. Records owned by someone else behave as absent.
pub trait EventRepository: Send + Sync {
    /// Inserts every event or none of them.
    fn insert_all(&self, events: &[CalendarEvent]) -> Result<(), PlannerError>;
    fn find(&self, owner_id: &str, event_id: &str) -> Result<Option<CalendarEvent>, PlannerError>;
    /// Owner's events overlapping `window`, ordered by start ascending.
    fn list(&self, owner_id: &str, window: &EventWindow) -> Result<Vec<CalendarEvent>, PlannerError>;
    /// Reads, transforms and writes one record atomically. `Ok(None)` when absent.
    fn update_with(
        &self,
        owner_id: &str,
        event_id: &str,
        update: EventUpdate<'_>,
    ) -> Result<Option<CalendarEvent>, PlannerError>;
    fn remove(&self, owner_id: &str, event_id: &str) -> Result<bool, PlannerError>;
}

#[derive(Debug, Clone)]
pub struct SqliteEventRepository {
    db_path: PathBuf,
}

impl SqliteEventRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, PlannerError> {
        Connection::open(&self.db_path).map_err(PlannerError::from)
    }
}

struct EventRow {
    id: String,
    owner_id: String,
    title: String,
    start_at: String,
    end_at: String,
    all_day: bool,
    notes: Option<String>,
    tags: Option<String>,
    priority: i32,
    status: String,
    created_at: String,
    updated_at: String,
}

impl EventRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            start_at: row.get(3)?,
            end_at: row.get(4)?,
            all_day: row.get(5)?,
            notes: row.get(6)?,
            tags: row.get(7)?,
            priority: row.get(8)?,
            status: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_event(self) -> Result<CalendarEvent, PlannerError> {
        Ok(CalendarEvent {
            start: decode_timestamp(&self.start_at, "events.start_at")?,
            end: decode_timestamp(&self.end_at, "events.end_at")?,
            created_at: decode_timestamp(&self.created_at, "events.created_at")?,
            updated_at: decode_timestamp(&self.updated_at, "events.updated_at")?,
            id: self.id,
            owner_id: self.owner_id,
            title: self.title,
            all_day: self.all_day,
            notes: self.notes,
            tags: self.tags,
            priority: self.priority,
            status: self.status,
        })
    }
}

fn select_owned(
    connection: &Connection,
    owner_id: &str,
    event_id: &str,
) -> Result<Option<CalendarEvent>, PlannerError> {
    let row = connection
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1 AND owner_id = ?2"),
            params![event_id, owner_id],
            EventRow::read,
        )
        .optional()?;
    row.map(EventRow::into_event).transpose()
}

fn map_insert_error(error: rusqlite::Error, event_id: &str) -> PlannerError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            PlannerError::Conflict(format!("event could not be stored: {event_id}"))
        }
        _ => PlannerError::from(error),
    }
}

impl EventRepository for SqliteEventRepository {
    fn insert_all(&self, events: &[CalendarEvent]) -> Result<(), PlannerError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        for event in events {
            transaction
                .execute(
                    &format!(
                        "INSERT INTO events ({EVENT_COLUMNS})
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                    ),
                    params![
                        event.id,
                        event.owner_id,
                        event.title,
                        encode_timestamp(event.start),
                        encode_timestamp(event.end),
                        event.all_day,
                        event.notes,
                        event.tags,
                        event.priority,
                        event.status,
                        encode_timestamp(event.created_at),
                        encode_timestamp(event.updated_at),
                    ],
                )
                .map_err(|error| map_insert_error(error, &event.id))?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn find(&self, owner_id: &str, event_id: &str) -> Result<Option<CalendarEvent>, PlannerError> {
        let connection = self.connect()?;
        select_owned(&connection, owner_id, event_id)
    }

    fn list(&self, owner_id: &str, window: &EventWindow) -> Result<Vec<CalendarEvent>, PlannerError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1
               AND (?2 IS NULL OR end_at > ?2)
               AND (?3 IS NULL OR start_at < ?3)
             ORDER BY start_at ASC, id ASC"
        ))?;
        let rows = statement.query_map(
            params![
                owner_id,
                window.start.map(encode_timestamp),
                window.end.map(encode_timestamp),
            ],
            EventRow::read,
        )?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.into_event()?);
        }
        Ok(events)
    }

    fn update_with(
        &self,
        owner_id: &str,
        event_id: &str,
        update: EventUpdate<'_>,
    ) -> Result<Option<CalendarEvent>, PlannerError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(current) = select_owned(&transaction, owner_id, event_id)? else {
            return Ok(None);
        };
        let updated = update(&current)?;
        transaction.execute(
            "UPDATE events SET
               title = ?3, start_at = ?4, end_at = ?5, all_day = ?6, notes = ?7,
               tags = ?8, priority = ?9, status = ?10, updated_at = ?11
             WHERE id = ?1 AND owner_id = ?2",
            params![
                event_id,
                owner_id,
                updated.title,
                encode_timestamp(updated.start),
                encode_timestamp(updated.end),
                updated.all_day,
                updated.notes,
                updated.tags,
                updated.priority,
                updated.status,
                encode_timestamp(updated.updated_at),
            ],
        )?;
        transaction.commit()?;
        Ok(Some(updated))
    }

    fn remove(&self, owner_id: &str, event_id: &str) -> Result<bool, PlannerError> {
        let connection = self.connect()?;
        let affected = connection.execute(
            "DELETE FROM events WHERE id = ?1 AND owner_id = ?2",
            params![event_id, owner_id],
        )?;
        Ok(affected > 0)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    events: Mutex<HashMap<String, CalendarEvent>>,
}

impl InMemoryEventRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, CalendarEvent>>, PlannerError> {
        self.events
            .lock()
            .map_err(|error| PlannerError::InvalidConfig(format!("event store lock poisoned: {error}")))
    }
}

impl EventRepository for InMemoryEventRepository {
    fn insert_all(&self, events: &[CalendarEvent]) -> Result<(), PlannerError> {
        let mut stored = self.lock()?;
        for (index, event) in events.iter().enumerate() {
            let repeated = events[..index].iter().any(|earlier| earlier.id == event.id);
            if repeated || stored.contains_key(&event.id) {
                return Err(PlannerError::Conflict(format!(
                    "event could not be stored: {}",
                    event.id
                )));
            }
        }
        for event in events {
            stored.insert(event.id.clone(), event.clone());
        }
        Ok(())
    }

    fn find(&self, owner_id: &str, event_id: &str) -> Result<Option<CalendarEvent>, PlannerError> {
        let stored = self.lock()?;
        Ok(stored
            .get(event_id)
            .filter(|event| event.owner_id == owner_id)
            .cloned())
    }

    fn list(&self, owner_id: &str, window: &EventWindow) -> Result<Vec<CalendarEvent>, PlannerError> {
        let stored = self.lock()?;
        let mut events = stored
            .values()
            .filter(|event| event.owner_id == owner_id && event.overlaps(window))
            .cloned()
            .collect::<Vec<_>>();
        events.sort_by(|left, right| {
            left.start
                .cmp(&right.start)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(events)
    }

    fn update_with(
        &self,
        owner_id: &str,
        event_id: &str,
        update: EventUpdate<'_>,
    ) -> Result<Option<CalendarEvent>, PlannerError> {
        let mut stored = self.lock()?;
        let Some(current) = stored
            .get(event_id)
            .filter(|event| event.owner_id == owner_id)
        else {
            return Ok(None);
        };
        let updated = update(current)?;
        stored.insert(event_id.to_string(), updated.clone());
        Ok(Some(updated))
    }

    fn remove(&self, owner_id: &str, event_id: &str) -> Result<bool, PlannerError> {
        let mut stored = self.lock()?;
        let owned = stored
            .get(event_id)
            .map(|event| event.owner_id == owner_id)
            .unwrap_or(false);
        if owned {
            stored.remove(event_id);
        }
        Ok(owned)
    }
}
