pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::AppState;
pub use domain::availability::{resolve_for, Availability, DateOverride, DayLabel, TimeBlock, WeeklyTemplate};
pub use domain::generator::generate;
pub use domain::models::{CalendarEvent, CandidateTask, EventPatch, EventWindow, NewEvent, UserProfile};
pub use domain::packer::{pack, PackRequest, PackedTask};
pub use infrastructure::error::PlannerError;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    bind_child_impl, bulk_create_events_impl, commit_plan_impl, convert_legacy_availability_impl,
    create_event_impl, delete_event_impl, explain_plan_impl, explain_task_impl, get_event_impl,
    get_profile_impl, import_calendar_event_impl, list_calendar_log_impl, list_child_tasks_impl,
    list_children_impl, list_events_impl, list_feedback_impl, list_suggestions_impl,
    pack_tasks_impl, propose_plan_impl, register_profile_impl, resolve_availability_impl,
    set_availability_override_impl, submit_feedback_impl, submit_suggestion_impl,
    update_availability_impl, update_event_impl, update_imported_event_impl, update_profile_impl,
    BindResponse, ExplainedCandidate, RegisterProfileRequest, TimeBlockInput,
};
use application::explainer::Explanation;
use application::family::{
    CalendarImport, CalendarLogEntry, ChildTask, FeedbackRecord, Suggestion, TaskFeedback,
};
use application::planner::PlanProposal;
use infrastructure::event_mapper::{EventPatchPayload, EventPayload, EventView};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub workspace_root: String,
    pub database_path: String,
}

/// Prepares a workspace under `root`, or the current directory when absent.
pub fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

pub fn list_events(
    state: &AppState,
    credential: Option<String>,
    start: Option<String>,
    end: Option<String>,
) -> Result<Vec<EventView>, String> {
    list_events_impl(state, credential, start, end)
        .map_err(|error| state.command_error("list_events", &error))
}

pub fn create_event(
    state: &AppState,
    credential: Option<String>,
    payload: EventPayload,
) -> Result<EventView, String> {
    create_event_impl(state, credential, payload)
        .map_err(|error| state.command_error("create_event", &error))
}

pub fn bulk_create_events(
    state: &AppState,
    credential: Option<String>,
    payloads: Vec<EventPayload>,
) -> Result<Vec<EventView>, String> {
    bulk_create_events_impl(state, credential, payloads)
        .map_err(|error| state.command_error("bulk_create_events", &error))
}

pub fn get_event(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
) -> Result<EventView, String> {
    get_event_impl(state, credential, event_id)
        .map_err(|error| state.command_error("get_event", &error))
}

pub fn update_event(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
    patch: EventPatchPayload,
) -> Result<EventView, String> {
    update_event_impl(state, credential, event_id, patch)
        .map_err(|error| state.command_error("update_event", &error))
}

pub fn delete_event(
    state: &AppState,
    credential: Option<String>,
    event_id: String,
) -> Result<bool, String> {
    delete_event_impl(state, credential, event_id)
        .map_err(|error| state.command_error("delete_event", &error))
}

pub fn register_profile(
    state: &AppState,
    credential: Option<String>,
    request: RegisterProfileRequest,
) -> Result<UserProfile, String> {
    register_profile_impl(state, credential, request)
        .map_err(|error| state.command_error("register_profile", &error))
}

pub fn get_profile(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
) -> Result<UserProfile, String> {
    get_profile_impl(state, credential, profile_id)
        .map_err(|error| state.command_error("get_profile", &error))
}

pub fn update_profile(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    name: Option<String>,
    raw_survey_text: Option<String>,
) -> Result<UserProfile, String> {
    update_profile_impl(state, credential, profile_id, name, raw_survey_text)
        .map_err(|error| state.command_error("update_profile", &error))
}

pub fn update_availability(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    availability: Availability,
) -> Result<UserProfile, String> {
    update_availability_impl(state, credential, profile_id, availability)
        .map_err(|error| state.command_error("update_availability", &error))
}

pub fn set_availability_override(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
    blocks: Vec<TimeBlockInput>,
) -> Result<UserProfile, String> {
    set_availability_override_impl(state, credential, profile_id, date, blocks)
        .map_err(|error| state.command_error("set_availability_override", &error))
}

pub fn convert_legacy_availability(
    state: &AppState,
    legacy: BTreeMap<String, i64>,
) -> Result<WeeklyTemplate, String> {
    convert_legacy_availability_impl(legacy)
        .map_err(|error| state.command_error("convert_legacy_availability", &error))
}

pub fn resolve_availability(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<TimeBlock>, String> {
    resolve_availability_impl(state, credential, profile_id, date)
        .map_err(|error| state.command_error("resolve_availability", &error))
}

pub fn propose_plan(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<PlanProposal, String> {
    propose_plan_impl(state, credential, profile_id, date)
        .map_err(|error| state.command_error("propose_plan", &error))
}

pub fn commit_plan(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<EventView>, String> {
    commit_plan_impl(state, credential, profile_id, date)
        .map_err(|error| state.command_error("commit_plan", &error))
}

pub fn pack_tasks(requests: Vec<PackRequest>) -> Vec<PackedTask> {
    pack_tasks_impl(requests)
}

pub async fn explain_task(state: &AppState, task: CandidateTask) -> Explanation {
    explain_task_impl(state, task).await
}

pub async fn explain_plan(
    state: &AppState,
    credential: Option<String>,
    profile_id: String,
    date: String,
) -> Result<Vec<ExplainedCandidate>, String> {
    explain_plan_impl(state, credential, profile_id, date)
        .await
        .map_err(|error| state.command_error("explain_plan", &error))
}

pub fn bind_child(
    state: &AppState,
    parent_id: String,
    child_id: String,
) -> Result<BindResponse, String> {
    bind_child_impl(state, parent_id, child_id)
        .map_err(|error| state.command_error("bind_child", &error))
}

pub fn list_children(state: &AppState, parent_id: String) -> Result<Vec<String>, String> {
    list_children_impl(state, parent_id).map_err(|error| state.command_error("list_children", &error))
}

pub fn list_child_tasks(
    state: &AppState,
    parent_id: String,
) -> Result<BTreeMap<String, Vec<ChildTask>>, String> {
    list_child_tasks_impl(state, parent_id)
        .map_err(|error| state.command_error("list_child_tasks", &error))
}

pub fn submit_suggestion(
    state: &AppState,
    parent_id: String,
    child_id: String,
    text: String,
) -> Result<Suggestion, String> {
    submit_suggestion_impl(state, parent_id, child_id, text)
        .map_err(|error| state.command_error("submit_suggestion", &error))
}

pub fn list_suggestions(state: &AppState, child_id: String) -> Result<Vec<Suggestion>, String> {
    list_suggestions_impl(state, child_id)
        .map_err(|error| state.command_error("list_suggestions", &error))
}

pub fn submit_feedback(
    state: &AppState,
    user_id: String,
    task_name: String,
    feedback: TaskFeedback,
) -> Result<FeedbackRecord, String> {
    submit_feedback_impl(state, user_id, task_name, feedback)
        .map_err(|error| state.command_error("submit_feedback", &error))
}

pub fn list_feedback(state: &AppState, user_id: String) -> Result<Vec<FeedbackRecord>, String> {
    list_feedback_impl(state, user_id).map_err(|error| state.command_error("list_feedback", &error))
}

pub fn import_calendar_event(state: &AppState, import: CalendarImport) -> Result<ChildTask, String> {
    import_calendar_event_impl(state, import)
        .map_err(|error| state.command_error("import_calendar_event", &error))
}

pub fn list_calendar_log(
    state: &AppState,
    child_id: String,
) -> Result<Vec<CalendarLogEntry>, String> {
    list_calendar_log_impl(state, child_id)
        .map_err(|error| state.command_error("list_calendar_log", &error))
}

pub fn update_imported_event(
    state: &AppState,
    child_id: String,
    old_title: String,
    new_title: String,
    new_duration_minutes: i64,
) -> Result<CalendarLogEntry, String> {
    update_imported_event_impl(state, child_id, old_title, new_title, new_duration_minutes)
        .map_err(|error| state.command_error("update_imported_event", &error))
}
