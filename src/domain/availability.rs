use crate::infrastructure::error::PlannerError;
use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc,
    Weekday,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOCAL_TIMEZONE: &str = "local";
const LEGACY_BLOCK_START_MINUTES: i64 = 19 * 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DayLabel {
    #[serde(alias = "Monday")]
    Mon,
    #[serde(alias = "Tuesday")]
    Tue,
    #[serde(alias = "Wednesday")]
    Wed,
    #[serde(alias = "Thursday")]
    Thu,
    #[serde(alias = "Friday")]
    Fri,
    #[serde(alias = "Saturday")]
    Sat,
    #[serde(alias = "Sunday")]
    Sun,
}

impl DayLabel {
    pub fn of(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mon => "Mon",
            Self::Tue => "Tue",
            Self::Wed => "Wed",
            Self::Thu => "Thu",
            Self::Fri => "Fri",
            Self::Sat => "Sat",
            Self::Sun => "Sun",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mon" | "monday" => Some(Self::Mon),
            "tue" | "tuesday" => Some(Self::Tue),
            "wed" | "wednesday" => Some(Self::Wed),
            "thu" | "thursday" => Some(Self::Thu),
            "fri" | "friday" => Some(Self::Fri),
            "sat" | "saturday" => Some(Self::Sat),
            "sun" | "sunday" => Some(Self::Sun),
            _ => None,
        }
    }
}

impl From<Weekday> for DayLabel {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

/// A same-day span of free time. `end` is always strictly after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeBlock", into = "RawTimeBlock")]
pub struct TimeBlock {
    start: NaiveTime,
    end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawTimeBlock {
    start: String,
    end: String,
}

impl TryFrom<RawTimeBlock> for TimeBlock {
    type Error = PlannerError;

    fn try_from(raw: RawTimeBlock) -> Result<Self, Self::Error> {
        Self::parse(&raw.start, &raw.end)
    }
}

impl From<TimeBlock> for RawTimeBlock {
    fn from(block: TimeBlock) -> Self {
        Self {
            start: format_hhmm(block.start),
            end: format_hhmm(block.end),
        }
    }
}

impl TimeBlock {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, PlannerError> {
        if end <= start {
            return Err(PlannerError::validation(format!(
                "time block end {} must be after start {}",
                format_hhmm(end),
                format_hhmm(start)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, PlannerError> {
        Self::new(parse_hhmm(start, "block.start")?, parse_hhmm(end, "block.end")?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    #[serde(default)]
    pub weekly: BTreeMap<DayLabel, Vec<TimeBlock>>,
}

impl WeeklyTemplate {
    pub fn blocks_for(&self, day: DayLabel) -> &[TimeBlock] {
        self.weekly.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_day(&mut self, day: DayLabel, blocks: Vec<TimeBlock>) {
        self.weekly.insert(day, blocks);
    }

    pub fn push_block(&mut self, day: DayLabel, block: TimeBlock) {
        self.weekly.entry(day).or_default().push(block);
    }

    /// Converts `{"Mon": 60, ...}` into one block per day starting at 19:00.
    pub fn from_legacy_minutes(legacy: &BTreeMap<String, i64>) -> Result<Self, PlannerError> {
        let mut template = Self::default();
        for (label, minutes) in legacy {
            if *minutes <= 0 {
                continue;
            }
            let day = DayLabel::parse(label).ok_or_else(|| {
                PlannerError::validation(format!("unknown weekday label: {label}"))
            })?;
            let end_minutes = LEGACY_BLOCK_START_MINUTES
                .checked_add(*minutes)
                .filter(|end| *end < MINUTES_PER_DAY)
                .ok_or_else(|| {
                    PlannerError::validation(format!(
                        "legacy availability for {label} ({minutes} minutes) crosses midnight"
                    ))
                })?;
            template.set_day(
                day,
                vec![TimeBlock::new(
                    minutes_to_time(LEGACY_BLOCK_START_MINUTES)?,
                    minutes_to_time(end_minutes)?,
                )?],
            );
        }
        Ok(template)
    }
}

/// Blocks for one calendar date. An empty list marks the date unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateOverride {
    pub day: NaiveDate,
    #[serde(default)]
    pub blocks: Vec<TimeBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub template: WeeklyTemplate,
    #[serde(default)]
    pub overrides: Vec<DateOverride>,
}

impl Default for Availability {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            template: WeeklyTemplate::default(),
            overrides: Vec::new(),
        }
    }
}

impl Availability {
    pub fn new(
        timezone: &str,
        template: WeeklyTemplate,
        overrides: Vec<DateOverride>,
    ) -> Result<Self, PlannerError> {
        let availability = Self {
            timezone: timezone.trim().to_string(),
            template,
            overrides,
        };
        availability.validate()?;
        Ok(availability)
    }

    pub fn validate(&self) -> Result<(), PlannerError> {
        self.zone().map(|_| ())
    }

    pub fn zone(&self) -> Result<AvailabilityZone, PlannerError> {
        AvailabilityZone::parse(&self.timezone)
    }

    /// Free blocks for `date`: the first override for that date verbatim,
    /// otherwise the weekly template's blocks for its weekday.
    pub fn resolve_for(&self, date: NaiveDate) -> Vec<TimeBlock> {
        if let Some(date_override) = self.overrides.iter().find(|entry| entry.day == date) {
            return date_override.blocks.clone();
        }
        self.template.blocks_for(DayLabel::of(date)).to_vec()
    }

    pub fn slots_for(&self, date: NaiveDate) -> Vec<TimeSlot> {
        self.resolve_for(date)
            .into_iter()
            .map(|block| TimeSlot::new(date, block))
            .collect()
    }

    /// Replaces the override for `date` if one exists, otherwise appends.
    pub fn set_override(&mut self, date: NaiveDate, blocks: Vec<TimeBlock>) {
        match self.overrides.iter_mut().find(|entry| entry.day == date) {
            Some(existing) => existing.blocks = blocks,
            None => self.overrides.push(DateOverride { day: date, blocks }),
        }
    }

    pub fn remove_override(&mut self, date: NaiveDate) -> bool {
        let before = self.overrides.len();
        self.overrides.retain(|entry| entry.day != date);
        before != self.overrides.len()
    }

    pub fn apply_legacy_minutes(&mut self, legacy: &BTreeMap<String, i64>) -> Result<(), PlannerError> {
        let converted = WeeklyTemplate::from_legacy_minutes(legacy)?;
        self.template.weekly.extend(converted.weekly);
        Ok(())
    }
}

pub fn resolve_for(availability: &Availability, date: NaiveDate) -> Vec<TimeBlock> {
    availability.resolve_for(date)
}

/// A resolved block placed on a concrete date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub block: TimeBlock,
}

impl TimeSlot {
    pub fn new(date: NaiveDate, block: TimeBlock) -> Self {
        Self { date, block }
    }

    pub fn start_hour(&self) -> u32 {
        self.block.start().hour()
    }

    pub fn duration_minutes(&self) -> i64 {
        self.block.duration_minutes()
    }

    pub fn label(&self) -> String {
        format!(
            "{} {}-{}",
            self.date,
            format_hhmm(self.block.start()),
            format_hhmm(self.block.end())
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvailabilityZone {
    Local,
    Named(Tz),
}

impl AvailabilityZone {
    pub fn parse(value: &str) -> Result<Self, PlannerError> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(LOCAL_TIMEZONE) {
            return Ok(Self::Local);
        }
        value
            .parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| PlannerError::validation(format!("unknown timezone: {value}")))
    }

    /// Earliest instant for a wall-clock time; fails inside a DST gap.
    pub fn to_utc(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, PlannerError> {
        let resolved = match self {
            Self::Local => Local
                .from_local_datetime(&local)
                .earliest()
                .map(|value| value.with_timezone(&Utc)),
            Self::Named(tz) => tz
                .from_local_datetime(&local)
                .earliest()
                .map(|value| value.with_timezone(&Utc)),
        };
        resolved.ok_or_else(|| {
            PlannerError::validation(format!("{local} does not exist in the availability timezone"))
        })
    }
}

pub fn parse_hhmm(value: &str, field_name: &str) -> Result<NaiveTime, PlannerError> {
    let invalid = || PlannerError::validation(format!("{field_name} must be HH:MM, got '{value}'"));
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&index| bytes[index].is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }
    let hour = value[0..2].parse::<u32>().map_err(|_| invalid())?;
    let minute = value[3..5].parse::<u32>().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

pub fn format_hhmm(time: NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

fn minutes_to_time(minutes: i64) -> Result<NaiveTime, PlannerError> {
    NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
        .ok_or_else(|| PlannerError::validation(format!("{minutes} minutes is not a time of day")))
}

fn default_timezone() -> String {
    LOCAL_TIMEZONE.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block(start: &str, end: &str) -> TimeBlock {
        TimeBlock::parse(start, end).expect("valid block")
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    fn monday_template() -> WeeklyTemplate {
        let mut template = WeeklyTemplate::default();
        template.set_day(DayLabel::Mon, vec![block("14:00", "15:00")]);
        template
    }

    #[test]
    fn resolves_weekly_template_for_matching_weekday() {
        let availability = Availability::new("local", monday_template(), Vec::new()).expect("valid");
        // 2026-02-16 is a Monday.
        let resolved = availability.resolve_for(date("2026-02-16"));
        assert_eq!(resolved, vec![block("14:00", "15:00")]);
        assert!(availability.resolve_for(date("2026-02-17")).is_empty());
    }

    #[test]
    fn empty_override_marks_date_unavailable() {
        let availability = Availability::new(
            "local",
            monday_template(),
            vec![DateOverride {
                day: date("2026-02-16"),
                blocks: Vec::new(),
            }],
        )
        .expect("valid");
        assert!(availability.resolve_for(date("2026-02-16")).is_empty());
        assert_eq!(availability.resolve_for(date("2026-02-23")).len(), 1);
    }

    #[test]
    fn first_matching_override_wins() {
        let day = date("2026-02-18");
        let availability = Availability {
            overrides: vec![
                DateOverride {
                    day,
                    blocks: vec![block("08:00", "09:00")],
                },
                DateOverride {
                    day,
                    blocks: vec![block("20:00", "21:00")],
                },
            ],
            ..Availability::default()
        };
        assert_eq!(resolve_for(&availability, day), vec![block("08:00", "09:00")]);
    }

    #[test]
    fn overlapping_blocks_pass_through_unchanged() {
        let mut template = WeeklyTemplate::default();
        template.push_block(DayLabel::Tue, block("10:00", "12:00"));
        template.push_block(DayLabel::Tue, block("09:00", "11:00"));
        let availability = Availability {
            template,
            ..Availability::default()
        };
        assert_eq!(
            availability.resolve_for(date("2026-02-17")),
            vec![block("10:00", "12:00"), block("09:00", "11:00")]
        );
    }

    #[test]
    fn set_override_replaces_existing_entry() {
        let day = date("2026-02-18");
        let mut availability = Availability::default();
        availability.set_override(day, vec![block("08:00", "09:00")]);
        availability.set_override(day, Vec::new());
        assert_eq!(availability.overrides.len(), 1);
        assert!(availability.resolve_for(day).is_empty());
        assert!(availability.remove_override(day));
        assert!(!availability.remove_override(day));
    }

    #[test]
    fn malformed_time_of_day_is_rejected() {
        for (start, end) in [
            ("9:00", "10:00"),
            ("24:00", "10:00"),
            ("09:60", "10:00"),
            ("09-00", "10:00"),
            ("ab:cd", "10:00"),
        ] {
            assert!(
                matches!(TimeBlock::parse(start, end), Err(PlannerError::Validation(_))),
                "{start}-{end} should be rejected"
            );
        }
    }

    #[test]
    fn inverted_or_empty_block_is_rejected() {
        assert!(TimeBlock::parse("10:00", "10:00").is_err());
        assert!(TimeBlock::parse("23:00", "01:00").is_err());
    }

    #[test]
    fn deserialization_validates_blocks() {
        let valid = r#"{"timezone":"Europe/Berlin","template":{"weekly":{"Mon":[{"start":"19:00","end":"20:00"}]}},"overrides":[{"day":"2026-02-18","blocks":[]}]}"#;
        let parsed: Availability = serde_json::from_str(valid).expect("valid availability");
        assert_eq!(parsed.template.blocks_for(DayLabel::Mon), &[block("19:00", "20:00")]);
        assert!(parsed.validate().is_ok());

        let invalid = r#"{"template":{"weekly":{"Mon":[{"start":"7pm","end":"20:00"}]}}}"#;
        assert!(serde_json::from_str::<Availability>(invalid).is_err());
    }

    #[test]
    fn serializes_blocks_as_hhmm() {
        let json = serde_json::to_value(block("07:05", "08:30")).expect("serialize");
        assert_eq!(json, serde_json::json!({"start": "07:05", "end": "08:30"}));
    }

    #[test]
    fn unknown_timezone_fails_validation() {
        assert!(Availability::new("Mars/Olympus", WeeklyTemplate::default(), Vec::new()).is_err());
        assert_eq!(AvailabilityZone::parse("LOCAL").expect("local"), AvailabilityZone::Local);
        assert_eq!(
            AvailabilityZone::parse("Asia/Tokyo").expect("tokyo"),
            AvailabilityZone::Named(chrono_tz::Asia::Tokyo)
        );
    }

    #[test]
    fn named_zone_converts_wall_clock_to_utc() {
        let zone = AvailabilityZone::parse("Asia/Tokyo").expect("tokyo");
        let local = date("2026-02-16").and_hms_opt(9, 0, 0).expect("valid time");
        let utc = zone.to_utc(local).expect("convertible");
        assert_eq!(utc.to_rfc3339(), "2026-02-16T00:00:00+00:00");
    }

    #[test]
    fn legacy_minutes_become_evening_blocks() {
        let legacy = BTreeMap::from([
            ("Mon".to_string(), 60),
            ("Tue".to_string(), 45),
            ("Wed".to_string(), 0),
        ]);
        let template = WeeklyTemplate::from_legacy_minutes(&legacy).expect("convert");
        assert_eq!(template.blocks_for(DayLabel::Mon), &[block("19:00", "20:00")]);
        assert_eq!(template.blocks_for(DayLabel::Tue), &[block("19:00", "19:45")]);
        assert!(template.blocks_for(DayLabel::Wed).is_empty());

        let too_long = BTreeMap::from([("Sat".to_string(), 300)]);
        assert!(WeeklyTemplate::from_legacy_minutes(&too_long).is_err());
        let huge = BTreeMap::from([("Sun".to_string(), i64::MAX)]);
        assert!(matches!(
            WeeklyTemplate::from_legacy_minutes(&huge),
            Err(PlannerError::Validation(_))
        ));
        let unknown = BTreeMap::from([("Someday".to_string(), 30)]);
        assert!(WeeklyTemplate::from_legacy_minutes(&unknown).is_err());
    }

    #[test]
    fn slots_carry_date_and_block() {
        let availability = Availability {
            template: monday_template(),
            ..Availability::default()
        };
        let slots = availability.slots_for(date("2026-02-16"));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start_hour(), 14);
        assert_eq!(slots[0].duration_minutes(), 60);
        assert_eq!(slots[0].label(), "2026-02-16 14:00-15:00");
    }

    fn block_strategy() -> impl Strategy<Value = TimeBlock> {
        (0u32..23, 0u32..60, 1i64..60).prop_map(|(hour, minute, length)| {
            let start = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid start");
            TimeBlock::new(start, start + chrono::Duration::minutes(length)).expect("same-day block")
        })
    }

    // Property 1: a matching override is returned verbatim, even when empty
    proptest! {
        #[test]
        fn property1_override_replaces_template(
            day_offset in 0i64..365,
            template_blocks in proptest::collection::vec(block_strategy(), 0..4),
            override_blocks in proptest::collection::vec(block_strategy(), 0..4)
        ) {
            let day = date("2026-01-01") + chrono::Duration::days(day_offset);
            let mut template = WeeklyTemplate::default();
            template.set_day(DayLabel::of(day), template_blocks);
            let availability = Availability {
                template,
                overrides: vec![DateOverride { day, blocks: override_blocks.clone() }],
                ..Availability::default()
            };
            prop_assert_eq!(availability.resolve_for(day), override_blocks);
        }
    }

    // Property 2: without an override the weekday's template blocks are returned
    proptest! {
        #[test]
        fn property2_template_used_without_override(
            day_offset in 0i64..365,
            template_blocks in proptest::collection::vec(block_strategy(), 0..4)
        ) {
            let day = date("2026-01-01") + chrono::Duration::days(day_offset);
            let mut template = WeeklyTemplate::default();
            template.set_day(DayLabel::of(day), template_blocks.clone());
            let availability = Availability {
                template,
                overrides: vec![DateOverride {
                    day: day + chrono::Duration::days(1),
                    blocks: Vec::new(),
                }],
                ..Availability::default()
            };
            prop_assert_eq!(availability.resolve_for(day), template_blocks);
            prop_assert!(availability
                .resolve_for(day + chrono::Duration::days(2))
                .is_empty());
        }
    }
}
