use crate::domain::availability::{Availability, TimeBlock};
use crate::domain::models::{validate_non_empty, UserProfile};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::profile_repository::ProfileRepository;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct ProfileService {
    repository: Arc<dyn ProfileRepository>,
}

impl ProfileService {
    pub fn new(repository: Arc<dyn ProfileRepository>) -> Self {
        Self { repository }
    }

    pub fn register(&self, owner_id: &str, profile: UserProfile) -> Result<UserProfile, PlannerError> {
        let profile = UserProfile {
            id: profile.id.trim().to_string(),
            name: profile.name.trim().to_string(),
            ..profile
        };
        profile.validate()?;
        self.repository.insert(owner_id, &profile)?;
        Ok(profile)
    }

    /// Another owner's profile reads as not found.
    pub fn get(&self, owner_id: &str, profile_id: &str) -> Result<UserProfile, PlannerError> {
        validate_non_empty(profile_id, "profile_id")?;
        self.repository
            .get(owner_id, profile_id.trim())?
            .ok_or_else(|| PlannerError::NotFound(format!("profile not found: {profile_id}")))
    }

    pub fn replace_availability(
        &self,
        owner_id: &str,
        profile_id: &str,
        availability: Availability,
    ) -> Result<UserProfile, PlannerError> {
        availability.validate()?;
        self.modify(owner_id, profile_id, |profile| {
            profile.availability = availability;
            Ok(())
        })
    }

    pub fn update_details(
        &self,
        owner_id: &str,
        profile_id: &str,
        name: Option<String>,
        raw_survey_text: Option<String>,
    ) -> Result<UserProfile, PlannerError> {
        self.modify(owner_id, profile_id, |profile| {
            if let Some(name) = name {
                profile.name = name.trim().to_string();
            }
            if let Some(raw_survey_text) = raw_survey_text {
                profile.raw_survey_text = raw_survey_text;
            }
            Ok(())
        })
    }

    /// An empty block list marks the date unavailable.
    pub fn set_override(
        &self,
        owner_id: &str,
        profile_id: &str,
        date: NaiveDate,
        blocks: Vec<TimeBlock>,
    ) -> Result<UserProfile, PlannerError> {
        self.modify(owner_id, profile_id, |profile| {
            profile.availability.set_override(date, blocks);
            Ok(())
        })
    }

    pub fn apply_legacy_minutes(
        &self,
        owner_id: &str,
        profile_id: &str,
        legacy: &BTreeMap<String, i64>,
    ) -> Result<UserProfile, PlannerError> {
        self.modify(owner_id, profile_id, |profile| {
            profile.availability.apply_legacy_minutes(legacy)
        })
    }

    fn modify<F>(&self, owner_id: &str, profile_id: &str, change: F) -> Result<UserProfile, PlannerError>
    where
        F: FnOnce(&mut UserProfile) -> Result<(), PlannerError>,
    {
        let mut profile = self.get(owner_id, profile_id)?;
        change(&mut profile)?;
        profile.validate()?;
        if !self.repository.save(owner_id, &profile)? {
            return Err(PlannerError::NotFound(format!("profile not found: {profile_id}")));
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::DayLabel;
    use crate::infrastructure::profile_repository::InMemoryProfileRepository;

    const OWNER: &str = "demo";

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(InMemoryProfileRepository::default()))
    }

    fn profile(id: &str) -> UserProfile {
        UserProfile {
            id: id.to_string(),
            name: " Aoi ".to_string(),
            raw_survey_text: "sports".to_string(),
            availability: Availability::default(),
        }
    }

    #[test]
    fn register_trims_and_rejects_duplicates() {
        let profiles = service();
        let registered = profiles.register(OWNER, profile("child-1")).expect("register");
        assert_eq!(registered.name, "Aoi");
        assert!(matches!(
            profiles.register(OWNER, profile("child-1")),
            Err(PlannerError::Conflict(_))
        ));
        assert!(matches!(profiles.get(OWNER, "nobody"), Err(PlannerError::NotFound(_))));
    }

    #[test]
    fn invalid_timezone_is_rejected_on_register_and_replace() {
        let profiles = service();
        let mut bad = profile("child-2");
        bad.availability.timezone = "Atlantis/Capital".to_string();
        assert!(matches!(profiles.register(OWNER, bad), Err(PlannerError::Validation(_))));

        profiles.register(OWNER, profile("child-2")).expect("register");
        let replacement = Availability {
            timezone: "Mars/Base".to_string(),
            ..Availability::default()
        };
        assert!(profiles.replace_availability(OWNER, "child-2", replacement).is_err());
    }

    #[test]
    fn legacy_minutes_and_overrides_update_availability() {
        let profiles = service();
        profiles.register(OWNER, profile("child-3")).expect("register");
        let legacy = BTreeMap::from([("Fri".to_string(), 90)]);
        let updated = profiles
            .apply_legacy_minutes(OWNER, "child-3", &legacy)
            .expect("legacy");
        assert_eq!(
            updated.availability.template.blocks_for(DayLabel::Fri),
            &[TimeBlock::parse("19:00", "20:30").expect("valid block")]
        );

        // 2026-02-20 is a Friday.
        let friday = NaiveDate::from_ymd_opt(2026, 2, 20).expect("valid date");
        let updated = profiles
            .set_override(OWNER, "child-3", friday, Vec::new())
            .expect("override");
        assert!(updated.availability.resolve_for(friday).is_empty());
        assert_eq!(profiles.get(OWNER, "child-3").expect("get"), updated);
    }

    #[test]
    fn update_details_changes_only_supplied_fields() {
        let profiles = service();
        profiles.register(OWNER, profile("child-4")).expect("register");
        let updated = profiles
            .update_details(OWNER, "child-4", None, Some("reading and math".to_string()))
            .expect("update");
        assert_eq!(updated.name, "Aoi");
        assert_eq!(updated.raw_survey_text, "reading and math");
    }

    #[test]
    fn profiles_are_invisible_to_other_owners() {
        let profiles = service();
        profiles.register(OWNER, profile("child-5")).expect("register");
        assert!(matches!(
            profiles.get("intruder", "child-5"),
            Err(PlannerError::NotFound(_))
        ));
        assert!(matches!(
            profiles.update_details("intruder", "child-5", Some("Mallory".to_string()), None),
            Err(PlannerError::NotFound(_))
        ));
        assert_eq!(profiles.get(OWNER, "child-5").expect("get").name, "Aoi");
    }
}
