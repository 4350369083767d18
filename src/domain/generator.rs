use crate::domain::availability::TimeSlot;
use crate::domain::models::CandidateTask;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const GROWTH_TASK_TAG: &str = "growth-task";
pub const SENTINEL_INTEREST: &str = "general";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    FocusedLearning,
    RestOrLightReading,
    PhysicalActivity,
    Flexible,
}

impl TaskCategory {
    /// Fixed time-of-day rule keyed on the slot's starting hour.
    pub fn for_hour(hour: u32) -> Self {
        match hour {
            7..=10 => Self::FocusedLearning,
            12..=14 => Self::RestOrLightReading,
            16..=18 => Self::PhysicalActivity,
            _ => Self::Flexible,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FocusedLearning => "focused learning",
            Self::RestOrLightReading => "rest / light reading",
            Self::PhysicalActivity => "physical activity",
            Self::Flexible => "flexible/general task",
        }
    }
}

pub fn category_for_slot(slot: &TimeSlot) -> TaskCategory {
    TaskCategory::for_hour(slot.start_hour())
}

pub fn task_title(interest: &str, category: TaskCategory) -> String {
    format!("{interest} Training - {}", category.label())
}

/// One candidate per (slot, interest) pair, slots outermost. No ranking or dedup.
pub fn generate<S: AsRef<str>>(slots: &[TimeSlot], interests: &[S]) -> Vec<CandidateTask> {
    let interests = normalized_interests(interests);
    let mut tasks = Vec::with_capacity(slots.len() * interests.len());
    for slot in slots {
        let category = category_for_slot(slot);
        for interest in &interests {
            tasks.push(CandidateTask {
                title: task_title(interest, category),
                tags: BTreeSet::from([
                    interest.clone(),
                    category.label().to_string(),
                    GROWTH_TASK_TAG.to_string(),
                ]),
                duration_minutes: slot.duration_minutes(),
                scheduled_slot: *slot,
            });
        }
    }
    tasks
}

fn normalized_interests<S: AsRef<str>>(interests: &[S]) -> Vec<String> {
    let trimmed = interests
        .iter()
        .map(|interest| interest.as_ref().trim())
        .filter(|interest| !interest.is_empty())
        .map(ToOwned::to_owned)
        .collect::<Vec<_>>();
    if trimmed.is_empty() {
        vec![SENTINEL_INTEREST.to_string()]
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::availability::TimeBlock;
    use chrono::{NaiveDate, NaiveTime};
    use proptest::prelude::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date")
    }

    fn slot(start: &str, end: &str) -> TimeSlot {
        TimeSlot::new(day(), TimeBlock::parse(start, end).expect("valid block"))
    }

    #[test]
    fn hour_rule_covers_every_hour() {
        let expected = [
            (0, TaskCategory::Flexible),
            (6, TaskCategory::Flexible),
            (7, TaskCategory::FocusedLearning),
            (10, TaskCategory::FocusedLearning),
            (11, TaskCategory::Flexible),
            (12, TaskCategory::RestOrLightReading),
            (14, TaskCategory::RestOrLightReading),
            (15, TaskCategory::Flexible),
            (16, TaskCategory::PhysicalActivity),
            (18, TaskCategory::PhysicalActivity),
            (19, TaskCategory::Flexible),
            (23, TaskCategory::Flexible),
        ];
        for (hour, category) in expected {
            assert_eq!(TaskCategory::for_hour(hour), category, "hour {hour}");
        }
    }

    #[test]
    fn single_slot_and_interest_yields_tagged_candidate() {
        let tasks = generate(&[slot("14:00", "15:00")], &["music"]);
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.title, "music Training - rest / light reading");
        assert_eq!(
            task.tags,
            BTreeSet::from([
                "music".to_string(),
                "rest / light reading".to_string(),
                "growth-task".to_string(),
            ])
        );
        assert_eq!(task.duration_minutes, 60);
        assert_eq!(
            task.scheduled_slot.block.start(),
            NaiveTime::from_hms_opt(14, 0, 0).expect("valid time")
        );
    }

    #[test]
    fn empty_interests_fall_back_to_sentinel() {
        let tasks = generate::<&str>(&[slot("20:00", "21:00")], &[]);
        assert_eq!(tasks.len(), 1);
        assert!(tasks[0].tags.contains(SENTINEL_INTEREST));
        assert!(tasks[0].tags.contains("flexible/general task"));
    }

    #[test]
    fn empty_slots_yield_nothing() {
        assert!(generate(&[], &["music", "chess"]).is_empty());
    }

    #[test]
    fn cross_product_orders_slots_outermost() {
        let tasks = generate(
            &[slot("08:00", "09:00"), slot("17:00", "17:30")],
            &["chess", "swimming"],
        );
        let titles = tasks.iter().map(|task| task.title.as_str()).collect::<Vec<_>>();
        assert_eq!(
            titles,
            vec![
                "chess Training - focused learning",
                "swimming Training - focused learning",
                "chess Training - physical activity",
                "swimming Training - physical activity",
            ]
        );
        assert_eq!(tasks[3].duration_minutes, 30);
    }

    // Property 3: candidates = slots x max(interests, 1)
    proptest! {
        #[test]
        fn property3_cross_product_size(
            starts in proptest::collection::vec(0u32..23, 0..6),
            interests in proptest::collection::vec("[a-z]{1,8}", 0..5)
        ) {
            let slots = starts
                .iter()
                .map(|hour| slot(&format!("{hour:02}:00"), &format!("{hour:02}:30")))
                .collect::<Vec<_>>();
            let tasks = generate(&slots, &interests);
            prop_assert_eq!(tasks.len(), slots.len() * interests.len().max(1));
            prop_assert!(tasks.iter().all(|task| task.tags.contains(GROWTH_TASK_TAG)));
        }
    }
}
