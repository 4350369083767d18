use crate::infrastructure::error::PlannerError;
use std::sync::Mutex;

pub const EXPLAIN_CREDENTIAL_SERVICE: &str = "growth-planner.explain";

/// Holds the API key used by the remote explainer.
pub trait CredentialStore: Send + Sync {
    fn save_api_key(&self, api_key: &str) -> Result<(), PlannerError>;
    fn load_api_key(&self) -> Result<Option<String>, PlannerError>;
    fn delete_api_key(&self) -> Result<(), PlannerError>;
}

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, PlannerError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| PlannerError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(EXPLAIN_CREDENTIAL_SERVICE, "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), PlannerError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(PlannerError::Credential("api key must not be empty".to_string()));
        }
        self.entry()?
            .set_password(api_key)
            .map_err(|error| PlannerError::Credential(error.to_string()))
    }

    fn load_api_key(&self) -> Result<Option<String>, PlannerError> {
        match self.entry()?.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(PlannerError::Credential(error.to_string())),
        }
    }

    fn delete_api_key(&self) -> Result<(), PlannerError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(PlannerError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    api_key: Mutex<Option<String>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_api_key(&self, api_key: &str) -> Result<(), PlannerError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(PlannerError::Credential("api key must not be empty".to_string()));
        }
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| PlannerError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(api_key.to_string());
        Ok(())
    }

    fn load_api_key(&self) -> Result<Option<String>, PlannerError> {
        let guard = self
            .api_key
            .lock()
            .map_err(|error| PlannerError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_api_key(&self) -> Result<(), PlannerError> {
        let mut guard = self
            .api_key
            .lock()
            .map_err(|error| PlannerError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_store_saves_loads_and_deletes() {
        let store = InMemoryCredentialStore::default();
        assert_eq!(store.load_api_key().expect("load"), None);
        store.save_api_key("  sk-test  ").expect("save");
        assert_eq!(store.load_api_key().expect("load"), Some("sk-test".to_string()));
        store.delete_api_key().expect("delete");
        assert_eq!(store.load_api_key().expect("load"), None);
        assert!(matches!(
            store.save_api_key("   "),
            Err(PlannerError::Credential(_))
        ));
    }
}
