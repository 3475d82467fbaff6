//! `/config.json` document for the front-end.
//!
//! The base document comes from the proxied front-end build
//! (`<FRONTEND_PROXY>config.json`) or from a local file, then the
//! environment-derived values are written over it.

use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::domain::json_kind;

/// Error type for building the front-end config.
#[derive(Debug, thiserror::Error)]
pub enum FrontendConfigError {
    /// No base document could be read or parsed.
    #[error("front-end config unavailable: {0}")]
    Unavailable(String),
    /// The document or one of its sections has the wrong type.
    #[error("front-end config `{key}` must be an object, got {kind}")]
    NotAnObject { key: String, kind: &'static str },
}

/// Loads the base document.
///
/// A proxy failure is logged and falls back to the local file.
pub async fn load_base(config: &AppConfig, client: &reqwest::Client) -> Result<Value, FrontendConfigError> {
    if let Some(proxy) = config.frontend_proxy.as_deref().filter(|p| !p.is_empty()) {
        match fetch_from_proxy(client, proxy).await {
            Ok(Some(document)) => return Ok(document),
            Ok(None) => warn!(proxy, "Proxied config.json is empty, using local file"),
            Err(e) => error!(proxy, error = %e, "Failed to fetch proxied config.json"),
        }
    }

    let path = &config.frontend_config_path;
    let data = tokio::fs::read(path).await.map_err(|e| {
        error!(path = %path, error = %e, "Failed to read config.json");
        FrontendConfigError::Unavailable(format!("{}: {}", path, e))
    })?;
    serde_json::from_slice(&data).map_err(|e| {
        error!(path = %path, error = %e, "Failed to parse config.json");
        FrontendConfigError::Unavailable(format!("{}: {}", path, e))
    })
}

async fn fetch_from_proxy(client: &reqwest::Client, proxy: &str) -> Result<Option<Value>, reqwest::Error> {
    let document: Value = client
        .get(format!("{}config.json", proxy))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    Ok(is_truthy(&document).then_some(document))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Returns the section `key`, replacing a falsy value with `{}`.
fn section<'a>(
    document: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, FrontendConfigError> {
    let entry = document.entry(key).or_insert(Value::Null);
    if !is_truthy(entry) {
        *entry = Value::Object(Map::new());
    }
    let kind = json_kind(entry);
    entry.as_object_mut().ok_or_else(|| FrontendConfigError::NotAnObject {
        key: key.to_string(),
        kind,
    })
}

/// Sets `key` to the string, or removes it when unset.
fn set_optional(section: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    match value {
        Some(v) => {
            section.insert(key.to_string(), Value::String(v.to_string()));
        }
        None => {
            section.remove(key);
        }
    }
}

/// Writes the environment-derived values over `document`.
///
/// ```
/// use fleet_routing_uploads::config::AppConfig;
/// use fleet_routing_uploads::frontend::apply_environment;
///
/// let env: config::Map<String, String> =
///     [("API_ROOT".to_string(), "/api".to_string())].into_iter().collect();
/// let config = AppConfig::from_source(config::Environment::default().source(Some(env))).unwrap();
///
/// let mut document = serde_json::json!({"map": {"zoom": 11}, "backendApi": null});
/// apply_environment(&mut document, &config).unwrap();
/// assert_eq!(document["backendApi"]["apiRoot"], "/api");
/// assert_eq!(document["map"]["zoom"], 11);
/// assert_eq!(document["allowExperimentalFeatures"], false);
/// ```
pub fn apply_environment(document: &mut Value, config: &AppConfig) -> Result<(), FrontendConfigError> {
    let kind = json_kind(document);
    let root = document.as_object_mut().ok_or_else(|| FrontendConfigError::NotAnObject {
        key: "(root)".to_string(),
        kind,
    })?;
    let api_root = config.api_root.as_deref();

    set_optional(section(root, "backendApi")?, "apiRoot", api_root);
    root.insert(
        "allowExperimentalFeatures".to_string(),
        Value::Bool(config.experimental_features_allowed()),
    );
    set_optional(section(root, "map")?, "apiKey", config.map_api_key.as_deref());

    let storage = section(root, "storageApi")?;
    set_optional(storage, "apiRoot", api_root);
    storage.insert(
        "allowUserStorage".to_string(),
        Value::Bool(config.user_storage_allowed()),
    );
    Ok(())
}

/// Builds the complete `/config.json` document.
pub async fn frontend_config(config: &AppConfig, client: &reqwest::Client) -> Result<Value, FrontendConfigError> {
    let mut document = load_base(config, client).await?;
    apply_environment(&mut document, config)?;
    Ok(document)
}
