use crate::domain::availability::Availability;
use crate::domain::models::UserProfile;
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::storage::encode_timestamp;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Profiles are keyed by `(owner_id, profile id)`; other owners' rows are invisible.
pub trait ProfileRepository: Send + Sync {
    /// Fails with `Conflict` when the owner already registered that id.
    fn insert(&self, owner_id: &str, profile: &UserProfile) -> Result<(), PlannerError>;
    fn get(&self, owner_id: &str, profile_id: &str) -> Result<Option<UserProfile>, PlannerError>;
    /// Returns false when the owner has no profile with that id.
    fn save(&self, owner_id: &str, profile: &UserProfile) -> Result<bool, PlannerError>;
}

#[derive(Debug, Clone)]
pub struct SqliteProfileRepository {
    db_path: PathBuf,
}

impl SqliteProfileRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, PlannerError> {
        Connection::open(&self.db_path).map_err(PlannerError::from)
    }
}

impl ProfileRepository for SqliteProfileRepository {
    fn insert(&self, owner_id: &str, profile: &UserProfile) -> Result<(), PlannerError> {
        let connection = self.connect()?;
        let now = encode_timestamp(Utc::now());
        let inserted = connection.execute(
            "INSERT INTO profiles (owner_id, id, name, raw_survey_text, availability_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(owner_id, id) DO NOTHING",
            params![
                owner_id,
                profile.id,
                profile.name,
                profile.raw_survey_text,
                serde_json::to_string(&profile.availability)?,
                now,
            ],
        )?;
        if inserted == 0 {
            return Err(PlannerError::Conflict(format!(
                "profile already registered: {}",
                profile.id
            )));
        }
        Ok(())
    }

    fn get(&self, owner_id: &str, profile_id: &str) -> Result<Option<UserProfile>, PlannerError> {
        let connection = self.connect()?;
        let row: Option<(String, String, String, String)> = connection
            .query_row(
                "SELECT id, name, raw_survey_text, availability_json FROM profiles
                 WHERE owner_id = ?1 AND id = ?2",
                params![owner_id, profile_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((id, name, raw_survey_text, availability_json)) = row else {
            return Ok(None);
        };
        let availability = serde_json::from_str::<Availability>(&availability_json)?;
        Ok(Some(UserProfile {
            id,
            name,
            raw_survey_text,
            availability,
        }))
    }

    fn save(&self, owner_id: &str, profile: &UserProfile) -> Result<bool, PlannerError> {
        let connection = self.connect()?;
        let updated = connection.execute(
            "UPDATE profiles SET name = ?3, raw_survey_text = ?4, availability_json = ?5, updated_at = ?6
             WHERE owner_id = ?1 AND id = ?2",
            params![
                owner_id,
                profile.id,
                profile.name,
                profile.raw_survey_text,
                serde_json::to_string(&profile.availability)?,
                encode_timestamp(Utc::now()),
            ],
        )?;
        Ok(updated > 0)
    }
}

type ProfileKey = (String, String);

#[derive(Debug, Default)]
pub struct InMemoryProfileRepository {
    profiles: Mutex<HashMap<ProfileKey, UserProfile>>,
}

impl InMemoryProfileRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ProfileKey, UserProfile>>, PlannerError> {
        self.profiles
            .lock()
            .map_err(|error| PlannerError::InvalidConfig(format!("profile store lock poisoned: {error}")))
    }
}

fn profile_key(owner_id: &str, profile_id: &str) -> ProfileKey {
    (owner_id.to_string(), profile_id.to_string())
}

impl ProfileRepository for InMemoryProfileRepository {
    fn insert(&self, owner_id: &str, profile: &UserProfile) -> Result<(), PlannerError> {
        let mut profiles = self.lock()?;
        let key = profile_key(owner_id, &profile.id);
        if profiles.contains_key(&key) {
            return Err(PlannerError::Conflict(format!(
                "profile already registered: {}",
                profile.id
            )));
        }
        profiles.insert(key, profile.clone());
        Ok(())
    }

    fn get(&self, owner_id: &str, profile_id: &str) -> Result<Option<UserProfile>, PlannerError> {
        Ok(self.lock()?.get(&profile_key(owner_id, profile_id)).cloned())
    }

    fn save(&self, owner_id: &str, profile: &UserProfile) -> Result<bool, PlannerError> {
        let mut profiles = self.lock()?;
        match profiles.get_mut(&profile_key(owner_id, &profile.id)) {
            Some(existing) => {
                *existing = profile.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::{DayLabel, TimeBlock};
    use crate::infrastructure::storage::initialize_database;
    use std::fs;

    fn profile(id: &str) -> UserProfile {
        let mut availability = Availability::default();
        availability.template.set_day(
            DayLabel::Sat,
            vec![TimeBlock::parse("10:00", "11:30").expect("valid block")],
        );
        UserProfile {
            id: id.to_string(),
            name: "Mika".to_string(),
            raw_survey_text: "likes sports and art".to_string(),
            availability,
        }
    }

    fn exercise(repository: &dyn ProfileRepository) {
        let stored = profile("child-1");
        repository.insert("owner-a", &stored).expect("insert");
        assert!(matches!(
            repository.insert("owner-a", &stored),
            Err(PlannerError::Conflict(_))
        ));
        assert_eq!(
            repository.get("owner-a", "child-1").expect("get"),
            Some(stored.clone())
        );
        assert_eq!(repository.get("owner-a", "missing").expect("get"), None);

        let mut renamed = stored;
        renamed.name = "Mika S.".to_string();
        assert!(repository.save("owner-a", &renamed).expect("save"));
        assert_eq!(
            repository
                .get("owner-a", "child-1")
                .expect("get")
                .map(|profile| profile.name),
            Some("Mika S.".to_string())
        );
        assert!(!repository.save("owner-a", &profile("ghost")).expect("save missing"));
    }

    fn exercise_ownership(repository: &dyn ProfileRepository) {
        let stored = profile("child-1");
        repository.insert("owner-a", &stored).expect("insert");
        assert_eq!(repository.get("owner-b", "child-1").expect("get"), None);
        assert!(!repository.save("owner-b", &stored).expect("save foreign"));

        let mut theirs = profile("child-1");
        theirs.name = "Other".to_string();
        repository.insert("owner-b", &theirs).expect("same id, other owner");
        assert_eq!(
            repository
                .get("owner-a", "child-1")
                .expect("get")
                .map(|profile| profile.name),
            Some("Mika".to_string())
        );
    }

    #[test]
    fn in_memory_repository_registers_and_updates() {
        exercise(&InMemoryProfileRepository::default());
        exercise_ownership(&InMemoryProfileRepository::default());
    }

    #[test]
    fn sqlite_repository_registers_and_updates() {
        let dir = std::env::temp_dir().join(format!(
            "growth-planner-profile-repo-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("planner.sqlite");
        initialize_database(&path).expect("initialize database");
        exercise(&SqliteProfileRepository::new(&path));

        let scoped = dir.join("scoped.sqlite");
        initialize_database(&scoped).expect("initialize database");
        exercise_ownership(&SqliteProfileRepository::new(&scoped));
        let _ = fs::remove_dir_all(&dir);
    }
}
