use crate::domain::availability::AvailabilityZone;
use crate::infrastructure::error::PlannerError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const EXPLAINER_JSON: &str = "explainer.json";
const SUPPORTED_SCHEMA: u64 = 1;

pub const DEFAULT_EXPLAIN_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_EXPLAIN_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_EXPLAIN_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_EXPLAIN_MAX_TOKENS: u32 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub schema: u8,
    pub app_name: String,
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainMode {
    Rule,
    Remote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainerConfig {
    pub schema: u8,
    pub mode: ExplainMode,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA as u8,
            mode: ExplainMode::Rule,
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: DEFAULT_EXPLAIN_TEMPERATURE,
            max_tokens: DEFAULT_EXPLAIN_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigBundle {
    pub app: AppConfig,
    pub explainer: ExplainerConfig,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Growth Planner",
                "timezone": "local"
            }),
        ),
        (
            EXPLAINER_JSON,
            serde_json::json!({
                "schema": 1,
                "mode": "rule",
                "endpoint": DEFAULT_EXPLAIN_ENDPOINT,
                "model": DEFAULT_EXPLAIN_MODEL,
                "temperature": DEFAULT_EXPLAIN_TEMPERATURE,
                "maxTokens": DEFAULT_EXPLAIN_MAX_TOKENS
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), PlannerError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, PlannerError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| PlannerError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(PlannerError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn typed_config<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, PlannerError> {
    let value = read_config(path)?;
    serde_json::from_value(value)
        .map_err(|error| PlannerError::InvalidConfig(format!("{}: {error}", path.display())))
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, PlannerError> {
    let app: AppConfig = typed_config(&config_dir.join(APP_JSON))?;
    AvailabilityZone::parse(&app.timezone).map_err(|error| {
        PlannerError::InvalidConfig(format!("{APP_JSON} timezone: {error}"))
    })?;
    Ok(app)
}

pub fn load_explainer_config(config_dir: &Path) -> Result<ExplainerConfig, PlannerError> {
    let explainer: ExplainerConfig = typed_config(&config_dir.join(EXPLAINER_JSON))?;
    if explainer.mode == ExplainMode::Remote {
        url::Url::parse(explainer.endpoint.trim()).map_err(|error| {
            PlannerError::InvalidConfig(format!("{EXPLAINER_JSON} endpoint: {error}"))
        })?;
        if explainer.model.trim().is_empty() {
            return Err(PlannerError::InvalidConfig(format!(
                "{EXPLAINER_JSON} model must not be empty"
            )));
        }
    }
    Ok(explainer)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, PlannerError> {
    Ok(ConfigBundle {
        app: load_app_config(config_dir)?,
        explainer: load_explainer_config(config_dir)?,
    })
}

/// Default timezone for newly registered profiles.
pub fn read_timezone(config_dir: &Path) -> Result<String, PlannerError> {
    let timezone = load_app_config(config_dir)?.timezone;
    let trimmed = timezone.trim();
    if trimmed.is_empty() {
        return Ok(crate::domain::availability::LOCAL_TIMEZONE.to_string());
    }
    Ok(trimmed.to_string())
}

fn default_endpoint() -> String {
    DEFAULT_EXPLAIN_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_EXPLAIN_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_EXPLAIN_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_EXPLAIN_MAX_TOKENS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "growth-planner-config-{name}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create config dir");
        dir
    }

    #[test]
    fn defaults_are_written_once_and_load() {
        let dir = config_dir("defaults");
        ensure_default_configs(&dir).expect("write defaults");
        let bundle = load_configs(&dir).expect("load defaults");
        assert_eq!(bundle.app.timezone, "local");
        assert_eq!(bundle.explainer, ExplainerConfig::default());

        fs::write(
            dir.join(APP_JSON),
            r#"{"schema": 1, "appName": "Custom", "timezone": "Asia/Tokyo"}"#,
        )
        .expect("overwrite app config");
        ensure_default_configs(&dir).expect("keep existing");
        assert_eq!(read_timezone(&dir).expect("timezone"), "Asia/Tokyo");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = config_dir("schema");
        ensure_default_configs(&dir).expect("write defaults");
        fs::write(
            dir.join(EXPLAINER_JSON),
            r#"{"schema": 2, "mode": "rule"}"#,
        )
        .expect("overwrite explainer config");
        match load_explainer_config(&dir) {
            Err(PlannerError::InvalidConfig(message)) => assert!(message.contains("unsupported schema 2")),
            other => panic!("expected invalid config, got {other:?}"),
        }
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn remote_mode_requires_valid_endpoint_and_unknown_timezone_fails() {
        let dir = config_dir("remote");
        ensure_default_configs(&dir).expect("write defaults");
        fs::write(
            dir.join(EXPLAINER_JSON),
            r#"{"schema": 1, "mode": "remote", "endpoint": "not a url"}"#,
        )
        .expect("overwrite explainer config");
        assert!(matches!(
            load_explainer_config(&dir),
            Err(PlannerError::InvalidConfig(_))
        ));

        fs::write(
            dir.join(APP_JSON),
            r#"{"schema": 1, "appName": "x", "timezone": "Nowhere/Land"}"#,
        )
        .expect("overwrite app config");
        assert!(matches!(load_app_config(&dir), Err(PlannerError::InvalidConfig(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
