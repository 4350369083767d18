use crate::application::event_store::EventStore;
use crate::application::interests::InterestExtractor;
use crate::domain::availability::{AvailabilityZone, TimeSlot};
use crate::domain::generator::generate;
use crate::domain::models::{CalendarEvent, CandidateTask, NewEvent, UserProfile};
use crate::domain::packer::{pack_candidates, PackedTask};
use crate::infrastructure::error::PlannerError;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanProposal {
    pub date: NaiveDate,
    pub timezone: String,
    pub slots: Vec<TimeSlot>,
    pub interests: Vec<String>,
    pub candidates: Vec<CandidateTask>,
    /// Same order and length as `candidates`.
    pub packed: Vec<PackedTask>,
}

/// Resolve, extract interests, generate, then pack. Pure apart from the extractor.
pub fn propose_plan(
    profile: &UserProfile,
    date: NaiveDate,
    extractor: &dyn InterestExtractor,
) -> Result<PlanProposal, PlannerError> {
    profile.availability.validate()?;
    let slots = profile.availability.slots_for(date);
    let interests = extractor.interests(&profile.raw_survey_text);
    let candidates = generate(&slots, &interests);
    let packed = pack_candidates(&candidates);
    Ok(PlanProposal {
        date,
        timezone: profile.availability.timezone.clone(),
        slots,
        interests,
        candidates,
        packed,
    })
}

/// Turns packed timings into event drafts on `date` in `timezone`.
pub fn plan_drafts(proposal: &PlanProposal) -> Result<Vec<NewEvent>, PlannerError> {
    if proposal.packed.len() != proposal.candidates.len() {
        return Err(PlannerError::validation(format!(
            "plan has {} packed items for {} candidates",
            proposal.packed.len(),
            proposal.candidates.len()
        )));
    }
    let zone = AvailabilityZone::parse(&proposal.timezone)?;
    proposal
        .packed
        .iter()
        .zip(&proposal.candidates)
        .map(|(packed, candidate)| {
            packed.to_new_event(proposal.date, &zone, Some(candidate.joined_tags()))
        })
        .collect()
}

pub struct PlannerService {
    extractor: Arc<dyn InterestExtractor>,
    events: Arc<EventStore>,
}

impl PlannerService {
    pub fn new(extractor: Arc<dyn InterestExtractor>, events: Arc<EventStore>) -> Self {
        Self { extractor, events }
    }

    pub fn propose(&self, profile: &UserProfile, date: NaiveDate) -> Result<PlanProposal, PlannerError> {
        propose_plan(profile, date, self.extractor.as_ref())
    }

    /// Stores every planned item for `owner_id` or none of them.
    pub fn commit(
        &self,
        owner_id: &str,
        proposal: &PlanProposal,
    ) -> Result<Vec<CalendarEvent>, PlannerError> {
        let drafts = plan_drafts(proposal)?;
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        self.events.bulk_create(owner_id, drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::interests::KeywordInterestExtractor;
    use crate::domain::availability::{Availability, DayLabel, TimeBlock, WeeklyTemplate};
    use crate::domain::models::EventWindow;
    use crate::infrastructure::event_repository::InMemoryEventRepository;

    struct FixedInterests(Vec<String>);

    impl InterestExtractor for FixedInterests {
        fn interests(&self, _survey_text: &str) -> Vec<String> {
            self.0.clone()
        }
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn profile(timezone: &str, blocks: &[(&str, &str)]) -> UserProfile {
        let mut template = WeeklyTemplate::default();
        template.set_day(
            DayLabel::Mon,
            blocks
                .iter()
                .map(|(start, end)| TimeBlock::parse(start, end).expect("valid block"))
                .collect(),
        );
        UserProfile {
            id: "child-1".to_string(),
            name: "Ren".to_string(),
            raw_survey_text: "I like music".to_string(),
            availability: Availability::new(timezone, template, Vec::new()).expect("valid"),
        }
    }

    fn planner() -> PlannerService {
        PlannerService::new(
            Arc::new(FixedInterests(vec!["music".to_string()])),
            Arc::new(EventStore::new(Arc::new(InMemoryEventRepository::default()))),
        )
    }

    #[test]
    fn single_slot_plan_is_packed_from_anchor() {
        let proposal = planner()
            .propose(&profile("UTC", &[("14:00", "15:00")]), monday())
            .expect("propose");
        assert_eq!(proposal.slots.len(), 1);
        assert_eq!(proposal.candidates.len(), 1);
        assert_eq!(proposal.candidates[0].duration_minutes, 60);
        assert_eq!(proposal.packed[0].start_time, "09:00");
        assert_eq!(proposal.packed[0].end_time, "10:00");
    }

    #[test]
    fn keyword_extractor_without_match_uses_general_interest() {
        let proposal = propose_plan(
            &profile("local", &[("19:00", "19:30")]),
            monday(),
            &KeywordInterestExtractor,
        )
        .expect("propose");
        assert!(proposal.interests.is_empty());
        assert_eq!(proposal.candidates.len(), 1);
        assert!(proposal.candidates[0].tags.contains("general"));
    }

    #[test]
    fn unavailable_date_yields_empty_plan_and_commit() {
        let planner = planner();
        let proposal = planner
            .propose(&profile("UTC", &[("14:00", "15:00")]), monday() + chrono::Duration::days(1))
            .expect("propose");
        assert!(proposal.candidates.is_empty());
        assert!(planner.commit("demo", &proposal).expect("commit").is_empty());
    }

    #[test]
    fn commit_stores_events_in_profile_timezone() {
        let planner = planner();
        let proposal = planner
            .propose(
                &profile("Asia/Tokyo", &[("08:00", "09:00"), ("17:00", "17:30")]),
                monday(),
            )
            .expect("propose");
        let committed = planner.commit("demo", &proposal).expect("commit");
        assert_eq!(committed.len(), 2);
        // 09:00 Tokyo is 00:00 UTC.
        assert_eq!(committed[0].start.to_rfc3339(), "2026-02-16T00:00:00+00:00");
        assert_eq!(committed[0].end.to_rfc3339(), "2026-02-16T01:00:00+00:00");
        assert_eq!(committed[1].start, committed[0].end);
        assert_eq!(
            committed[0].tags.as_deref(),
            Some("focused learning,growth-task,music")
        );
        let listed = planner
            .events
            .list("demo", EventWindow::default())
            .expect("list");
        assert_eq!(listed.len(), 2);
    }

    #[test]
    fn mismatched_plan_is_rejected() {
        let mut proposal = planner()
            .propose(&profile("UTC", &[("14:00", "15:00")]), monday())
            .expect("propose");
        proposal.packed.clear();
        assert!(matches!(plan_drafts(&proposal), Err(PlannerError::Validation(_))));
    }
}
