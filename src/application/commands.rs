use crate::application::bootstrap::bootstrap_workspace;
use crate::application::event_store::EventStore;
use crate::application::explainer::{Explanation, ExplanationService, RemoteExplainer};
use crate::application::family::{
    BindOutcome, CalendarImport, CalendarLogEntry, ChildTask, FamilyService, FeedbackRecord,
    Suggestion, TaskFeedback,
};
use crate::application::identity::{
    stub_mode_from_lookup, IdentityProvider, StubIdentityProvider, TokenIdentityProvider,
};
use crate::application::interests::KeywordInterestExtractor;
use crate::application::planner::{PlanProposal, PlannerService};
use crate::application::profiles::ProfileService;
use crate::domain::availability::{parse_hhmm, Availability, TimeBlock, WeeklyTemplate};
use crate::domain::models::{CandidateTask, EventWindow, UserProfile};
use crate::domain::packer::{pack, PackRequest, PackedTask};
use crate::infrastructure::config::{ExplainMode, ExplainerConfig};
use crate::infrastructure::credential_store::{CredentialStore, KeyringCredentialStore};
use crate::infrastructure::error::PlannerError;
use crate::infrastructure::event_mapper::{
    decode_new_event, decode_patch, encode_event, parse_instant, EventPatchPayload, EventPayload,
    EventView,
};
use crate::infrastructure::event_repository::SqliteEventRepository;
use crate::infrastructure::explain_client::ReqwestChatCompletionClient;
use crate::infrastructure::kv_store::JsonFileStore;
use crate::infrastructure::profile_repository::SqliteProfileRepository;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const EXPLAIN_API_KEY_ENV: &str = "PLANNER_EXPLAIN_API_KEY";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const AUTH_TOKENS_ENV: &str = "PLANNER_AUTH_TOKENS";

pub struct AppState {
    config_dir: PathBuf,
    database_path: PathBuf,
    logs_dir: PathBuf,
    default_timezone: String,
    identity: Box<dyn IdentityProvider>,
    events: Arc<EventStore>,
    profiles: ProfileService,
    planner: PlannerService,
    family: FamilyService,
    explanations: ExplanationService,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, PlannerError> {
        Self::with_lookup(
            workspace_root,
            |key| std::env::var(key).ok(),
            &KeyringCredentialStore::default(),
        )
    }

    /// `lookup` stands in for the process environment.
    pub fn with_lookup<F>(
        workspace_root: PathBuf,
        lookup: F,
        credentials: &dyn CredentialStore,
    ) -> Result<Self, PlannerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let identity = load_identity_from_lookup(&lookup)?;

        let events = Arc::new(EventStore::new(Arc::new(SqliteEventRepository::new(
            &bootstrap.database_path,
        ))));
        let profiles =
            ProfileService::new(Arc::new(SqliteProfileRepository::new(&bootstrap.database_path)));
        let planner = PlannerService::new(
            Arc::new(KeywordInterestExtractor),
            Arc::clone(&events),
        );
        let family = FamilyService::new(Arc::new(JsonFileStore::new(&bootstrap.family_store_path)));

        let state = Self {
            config_dir: bootstrap.config_dir,
            database_path: bootstrap.database_path,
            logs_dir: bootstrap.logs_dir,
            default_timezone: bootstrap.configs.app.timezone.trim().to_string(),
            identity,
            events,
            profiles,
            planner,
            family,
            explanations: ExplanationService::rule_only(),
            log_guard: Mutex::new(()),
        };
        let explanations = state.explanation_service(&bootstrap.configs.explainer, &lookup, credentials)?;
        Ok(Self {
            explanations,
            ..state
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &PlannerError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    fn owner_id(&self, credential: Option<&str>) -> Result<String, PlannerError> {
        self.identity.owner_id(credential)
    }

    fn explanation_service<F>(
        &self,
        config: &ExplainerConfig,
        lookup: &F,
        credentials: &dyn CredentialStore,
    ) -> Result<ExplanationService, PlannerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if config.mode == ExplainMode::Rule {
            return Ok(ExplanationService::rule_only());
        }
        let api_key = match lookup_explain_api_key(lookup) {
            Some(api_key) => Some(api_key),
            None => match credentials.load_api_key() {
                Ok(api_key) => api_key,
                Err(error) => {
                    self.log_error("bootstrap", &format!("explain api key unavailable: {error}"));
                    None
                }
            },
        };
        let Some(api_key) = api_key else {
            self.log_error(
                "bootstrap",
                "remote explainer configured without api key; using rule-based explanations",
            );
            return Ok(ExplanationService::rule_only());
        };
        let client = Arc::new(ReqwestChatCompletionClient::new(&config.endpoint)?);
        Ok(ExplanationService::with_remote(Arc::new(RemoteExplainer::new(
            client,
            api_key,
            config.clone(),
        ))))
    }
}

pub fn lookup_explain_api_key<F>(lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    [EXPLAIN_API_KEY_ENV, OPENAI_API_KEY_ENV]
        .into_iter()
        .filter_map(|key| optional_lookup_value(lookup, key))
        .next()
}

/// Stub identity by default; token mode reads `token=owner` pairs separated by commas.
pub fn load_identity_from_lookup<F>(lookup: &F) -> Result<Box<dyn IdentityProvider>, PlannerError>
where
    F: Fn(&str) -> Option<String>,
{
    if stub_mode_from_lookup(lookup) {
        return Ok(Box::new(StubIdentityProvider::default()));
    }
    let raw = required_lookup_value(lookup, AUTH_TOKENS_ENV, "auth tokens")?;
    let mut provider = TokenIdentityProvider::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (token, owner) = pair
            .split_once('=')
            .map(|(token, owner)| (token.trim(), owner.trim()))
            .filter(|(token, owner)| !token.is_empty() && !owner.is_empty())
            .ok_or_else(|| {
                PlannerError::InvalidConfig(format!("{AUTH_TOKENS_ENV} entries must be token=owner"))
            })?;
        provider = provider.with_token(token, owner);
    }
    Ok(Box::new(provider))
}

fn required_lookup_value<F>(lookup: &F, key: &str, label: &str) -> Result<String, PlannerError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, key)
        .ok_or_else(|| PlannerError::InvalidConfig(format!("{label} is required: set {key}")))
}

fn optional_lookup_value<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_date(value: &str) -> Result<NaiveDate, PlannerError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|error| PlannerError::validation(format!("date must be YYYY-MM-DD: {error}")))
}

fn optional_instant(value: Option<String>, field_name: &str) -> Result<Option<chrono::DateTime<Utc>>, PlannerError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| parse_instant(value, field_name))
        .transpose()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterProfileRequest {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub raw_survey_text: String,
    #[serde(default)]
    pub availability: Option<Availability>,
    /// Minutes per weekday, e.g. `{"Mon": 60}`.
    #[serde(default)]
    pub legacy_availability: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeBlockInput {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainedCandidate {
    pub candidate: CandidateTask,
    pub explanation: Explanation,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindResponse {
    pub outcome: BindOutcome,
    pub message: String,
}

pub fn list_events_impl(
    state: &AppState,
    credential: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> Result<Vec<EventView>, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let window = EventWindow {
        start: optional_instant(start, "start")?,
        end: optional_instant(end, "end")?,
    };
    let events = state.events.list(&owner_id, window)?;
    Ok(events.iter().map(encode_event).collect())
}

pub fn create_event_impl(
    state: &AppState,
    credential: Option<String>,
    payload: EventPayload,
) -> Result<EventView, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let created = state.events.create(&owner_id, decode_new_event(payload)?)?;
    state.log_info("create_event", &format!("created event_id={}", created.id));
    Ok(encode_event(&created))
}

pub fn bulk_create_events_impl(
    state: &AppState,
    credential: Option<String>,
    payloads: Vec<EventPayload>,
) -> Result<Vec<EventView>, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let drafts = payloads
        .into_iter()
        .map(decode_new_event)
        .collect::<Result<Vec<_>, _>>()?;
    let created = state.events.bulk_create(&owner_id, drafts)?;
    state.log_info("bulk_create_events", &format!("created {} events", created.len()));
    Ok(created.iter().map(encode_event).collect())
}

pub fn get_event_impl(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
) -> Result<EventView, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let event = state.events.get(&owner_id, &event_id)?;
    Ok(encode_event(&event))
}

pub fn update_event_impl(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
    patch: EventPatchPayload,
) -> Result<EventView, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let patch = decode_patch(patch)?;
    let updated = state.events.update(&owner_id, &event_id, &patch)?;
    state.log_info("update_event", &format!("updated event_id={}", updated.id));
    Ok(encode_event(&updated))
}

pub fn delete_event_impl(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
) -> Result<bool, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    state.events.delete(&owner_id, &event_id)?;
    state.log_info("delete_event", &format!("deleted event_id={}", event_id.trim()));
    Ok(true)
}

pub fn register_profile_impl(
    state: &AppState,
    credential: Option<String>,
    request: RegisterProfileRequest,
) -> Result<UserProfile, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let mut availability = request.availability.unwrap_or_else(|| Availability {
        timezone: state.default_timezone.clone(),
        ..Availability::default()
    });
    if let Some(legacy) = request.legacy_availability.as_ref() {
        availability.apply_legacy_minutes(legacy)?;
    }
    let registered = state.profiles.register(&owner_id, UserProfile {
        id: request.id,
        name: request.name,
        raw_survey_text: request.raw_survey_text,
        availability,
    })?;
    state.log_info(
        "register_profile",
        &format!("registered profile_id={}", registered.id),
    );
    Ok(registered)
}

pub fn get_profile_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
) -> Result<UserProfile, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    state.profiles.get(&owner_id, &profile_id)
}

pub fn update_profile_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    name: Option<String>,
    raw_survey_text: Option<String>,
) -> Result<UserProfile, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let updated = state
        .profiles
        .update_details(&owner_id, &profile_id, name, raw_survey_text)?;
    state.log_info("update_profile", &format!("updated profile_id={}", updated.id));
    Ok(updated)
}

pub fn update_availability_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    availability: Availability,
) -> Result<UserProfile, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let updated = state
        .profiles
        .replace_availability(&owner_id, &profile_id, availability)?;
    state.log_info(
        "update_availability",
        &format!("replaced availability for profile_id={}", updated.id),
    );
    Ok(updated)
}

pub fn set_availability_override_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
    blocks: Vec<TimeBlockInput>,
) -> Result<UserProfile, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let date = parse_date(&date)?;
    let blocks = blocks
        .iter()
        .map(|block| {
            TimeBlock::new(
                parse_hhmm(block.start.trim(), "block.start")?,
                parse_hhmm(block.end.trim(), "block.end")?,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;
    let updated = state.profiles.set_override(&owner_id, &profile_id, date, blocks)?;
    state.log_info(
        "set_availability_override",
        &format!("set override date={date} profile_id={}", updated.id),
    );
    Ok(updated)
}

/// Converts `{"Mon": 60, ...}` into a weekly template without storing it.
pub fn convert_legacy_availability_impl(
    legacy: BTreeMap<String, i64>,
) -> Result<WeeklyTemplate, PlannerError> {
    WeeklyTemplate::from_legacy_minutes(&legacy)
}

pub fn resolve_availability_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<TimeBlock>, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let date = parse_date(&date)?;
    let profile = state.profiles.get(&owner_id, &profile_id)?;
    Ok(profile.availability.resolve_for(date))
}

pub fn propose_plan_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<PlanProposal, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let date = parse_date(&date)?;
    let profile = state.profiles.get(&owner_id, &profile_id)?;
    state.planner.propose(&profile, date)
}

/// Recomputes the plan server-side and stores it for the caller in one batch.
pub fn commit_plan_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<EventView>, PlannerError> {
    let owner_id = state.owner_id(credential.as_deref())?;
    let date = parse_date(&date)?;
    let profile = state.profiles.get(&owner_id, &profile_id)?;
    let proposal = state.planner.propose(&profile, date)?;
    let committed = state.planner.commit(&owner_id, &proposal)?;
    state.log_info(
        "commit_plan",
        &format!(
            "committed {} events for profile_id={} date={date}",
            committed.len(),
            profile.id
        ),
    );
    Ok(committed.iter().map(encode_event).collect())
}

pub fn pack_tasks_impl(requests: Vec<PackRequest>) -> Vec<PackedTask> {
    pack(&requests)
}

pub async fn explain_task_impl(state: &AppState, task: CandidateTask) -> Explanation {
    let explanation = state.explanations.explain(&task).await;
    if let Some(reason) = explanation.fallback_reason.as_deref() {
        state.log_error("explain_task", &format!("remote explanation failed: {reason}"));
    }
    explanation
}

pub async fn explain_plan_impl(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<ExplainedCandidate>, PlannerError> {
    let proposal = propose_plan_impl(state, credential, profile_id, date)?;
    let mut explained = Vec::with_capacity(proposal.candidates.len());
    for candidate in proposal.candidates {
        let explanation = explain_task_impl(state, candidate.clone()).await;
        explained.push(ExplainedCandidate {
            candidate,
            explanation,
        });
    }
    Ok(explained)
}

pub fn bind_child_impl(
    state: &AppState,
    parent_id: String,
    child_id: String,
) -> Result<BindResponse, PlannerError> {
    let outcome = state.family.bind(&parent_id, &child_id)?;
    let message = match outcome {
        BindOutcome::Linked => "Parent successfully linked to child.",
        BindOutcome::AlreadyLinked => "Parent already linked to child.",
    };
    state.log_info(
        "bind_child",
        &format!("parent_id={} child_id={} outcome={outcome:?}", parent_id.trim(), child_id.trim()),
    );
    Ok(BindResponse {
        outcome,
        message: message.to_string(),
    })
}

pub fn list_children_impl(state: &AppState, parent_id: String) -> Result<Vec<String>, PlannerError> {
    state.family.children(&parent_id)
}

pub fn submit_suggestion_impl(
    state: &AppState,
    parent_id: String,
    child_id: String,
    text: String,
) -> Result<Suggestion, PlannerError> {
    let suggestion = state.family.suggest(&parent_id, &child_id, &text)?;
    state.log_info(
        "submit_suggestion",
        &format!("parent_id={} child_id={}", suggestion.from, child_id.trim()),
    );
    Ok(suggestion)
}

pub fn list_suggestions_impl(
    state: &AppState,
    child_id: String,
) -> Result<Vec<Suggestion>, PlannerError> {
    state.family.suggestions(&child_id)
}

pub fn submit_feedback_impl(
    state: &AppState,
    user_id: String,
    task_name: String,
    feedback: TaskFeedback,
) -> Result<FeedbackRecord, PlannerError> {
    let record = state.family.record_feedback(&user_id, &task_name, feedback)?;
    state.log_info(
        "submit_feedback",
        &format!("user_id={} score={}", user_id.trim(), record.score),
    );
    Ok(record)
}

pub fn list_feedback_impl(
    state: &AppState,
    user_id: String,
) -> Result<Vec<FeedbackRecord>, PlannerError> {
    state.family.feedback(&user_id)
}

pub fn import_calendar_event_impl(
    state: &AppState,
    import: CalendarImport,
) -> Result<ChildTask, PlannerError> {
    let task = state.family.import_calendar_event(&import)?;
    state.log_info(
        "import_calendar_event",
        &format!("child_id={} title={}", import.child_id.trim(), task.name),
    );
    Ok(task)
}

pub fn list_calendar_log_impl(
    state: &AppState,
    child_id: String,
) -> Result<Vec<CalendarLogEntry>, PlannerError> {
    state.family.calendar_log(&child_id)
}

pub fn update_imported_event_impl(
    state: &AppState,
    child_id: String,
    old_title: String,
    new_title: String,
    new_duration_minutes: i64,
) -> Result<CalendarLogEntry, PlannerError> {
    let updated =
        state
            .family
            .update_imported_event(&child_id, &old_title, &new_title, new_duration_minutes)?;
    state.log_info(
        "update_imported_event",
        &format!(
            "child_id={} title={} -> {}",
            child_id.trim(),
            old_title.trim(),
            updated.title
        ),
    );
    Ok(updated)
}

pub fn list_child_tasks_impl(
    state: &AppState,
    parent_id: String,
) -> Result<BTreeMap<String, Vec<ChildTask>>, PlannerError> {
    state.family.children_tasks(&parent_id)
}
