use crate::infrastructure::error::PlannerError;
use std::collections::HashMap;

pub const STUB_OWNER_ID: &str = "demo";
pub const AUTH_STUB_ENV: &str = "PLANNER_AUTH_STUB";

/// Resolves the opaque owner id for one request.
pub trait IdentityProvider: Send + Sync {
    fn owner_id(&self, credential: Option<&str>) -> Result<String, PlannerError>;
}

/// Development identity: every caller is the same fixed owner.
#[derive(Debug, Clone)]
pub struct StubIdentityProvider {
    owner_id: String,
}

impl StubIdentityProvider {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }
}

impl Default for StubIdentityProvider {
    fn default() -> Self {
        Self::new(STUB_OWNER_ID)
    }
}

impl IdentityProvider for StubIdentityProvider {
    fn owner_id(&self, _credential: Option<&str>) -> Result<String, PlannerError> {
        Ok(self.owner_id.clone())
    }
}

/// Bearer tokens mapped to owners.
#[derive(Debug, Clone, Default)]
pub struct TokenIdentityProvider {
    owners_by_token: HashMap<String, String>,
}

impl TokenIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, owner_id: impl Into<String>) -> Self {
        self.owners_by_token.insert(token.into(), owner_id.into());
        self
    }
}

impl IdentityProvider for TokenIdentityProvider {
    fn owner_id(&self, credential: Option<&str>) -> Result<String, PlannerError> {
        let token = credential
            .map(str::trim)
            .map(|value| value.strip_prefix("Bearer ").unwrap_or(value).trim())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| PlannerError::Unauthorized("missing credential".to_string()))?;
        self.owners_by_token
            .get(token)
            .cloned()
            .ok_or_else(|| PlannerError::Unauthorized("unknown credential".to_string()))
    }
}

/// Stub mode unless the switch is explicitly set to something other than "1".
pub fn stub_mode_from_lookup<F>(lookup: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(AUTH_STUB_ENV)
        .map(|value| value.trim() == "1")
        .unwrap_or(true)
}
