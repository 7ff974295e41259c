//! File and environment loading.

use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::schema::{EmbeddingProviderKind, RecallConfig, StorageBackendKind};
use crate::{ConfigError, ConfigResult};

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "RECALL_";

/// Loads configuration from `path` (or defaults when `None`), applies
/// `RECALL_*` environment overrides and validates the result.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] or [`ConfigError::Parse`] for an unreadable
/// file, [`ConfigError::InvalidOverride`] for a malformed variable and
/// [`ConfigError::Invalid`] when validation fails.
pub fn load(path: Option<&Path>) -> ConfigResult<RecallConfig> {
    let mut config = match path {
        Some(path) => read_file(path)?,
        None => RecallConfig::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> ConfigResult<RecallConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded configuration file");
    Ok(config)
}

fn parsed<T: FromStr>(key: &str, value: String) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidOverride {
            key: key.to_owned(),
            value,
        })
}

/// Applies `RECALL_*` overrides read through `lookup`.
///
/// | variable | field |
/// |---|---|
/// | `RECALL_STORAGE_BACKEND` | `storage.backend` |
/// | `RECALL_STORAGE_ROOT` | `storage.root` |
/// | `RECALL_STORAGE_NAMESPACE` | `storage.namespace` |
/// | `RECALL_DEDUP_THRESHOLD` | `dedup.similarity_threshold` |
/// | `RECALL_DEDUP_NEIGHBOR_CAP` | `dedup.neighbor_cap` |
/// | `RECALL_DEDUP_MIN_RECORDS` | `dedup.min_records` |
/// | `RECALL_DEDUP_INTERVAL_HOURS` | `dedup.interval_hours` |
/// | `RECALL_SEARCH_DEFAULT_TOP_K` | `search.default_top_k` |
/// | `RECALL_SEARCH_MAX_TOP_K` | `search.max_top_k` |
/// | `RECALL_EMBEDDINGS_PROVIDER` | `embeddings.provider` |
/// | `RECALL_EMBEDDINGS_BASE_URL` | `embeddings.base_url` |
/// | `RECALL_EMBEDDINGS_MODEL` | `embeddings.model` |
/// | `RECALL_EMBEDDINGS_API_KEY` | `embeddings.api_key` |
/// | `RECALL_EMBEDDINGS_DIMENSIONS` | `embeddings.dimensions` |
/// | `RECALL_EMBEDDINGS_TIMEOUT_SECS` | `embeddings.timeout_secs` |
/// | `RECALL_LOG` | `telemetry.filter` |
///
/// # Errors
///
/// Returns [`ConfigError::InvalidOverride`] when a value does not parse.
pub fn apply_env_overrides<F>(config: &mut RecallConfig, lookup: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| {
        let key = format!("{ENV_PREFIX}{name}");
        lookup(&key).map(|value| (key, value))
    };

    if let Some((key, value)) = var("STORAGE_BACKEND") {
        config.storage.backend = StorageBackendKind::from_str(&value)
            .map_err(|_| ConfigError::InvalidOverride { key, value })?;
    }
    if let Some((_, value)) = var("STORAGE_ROOT") {
        config.storage.root = value.into();
    }
    if let Some((_, value)) = var("STORAGE_NAMESPACE") {
        config.storage.namespace = value;
    }
    if let Some((key, value)) = var("DEDUP_THRESHOLD") {
        config.dedup.similarity_threshold = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("DEDUP_NEIGHBOR_CAP") {
        config.dedup.neighbor_cap = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("DEDUP_MIN_RECORDS") {
        config.dedup.min_records = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("DEDUP_INTERVAL_HOURS") {
        config.dedup.interval_hours = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("SEARCH_DEFAULT_TOP_K") {
        config.search.default_top_k = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("SEARCH_MAX_TOP_K") {
        config.search.max_top_k = parsed(&key, value)?;
    }
    if let Some((key, value)) = var("EMBEDDINGS_PROVIDER") {
        config.embeddings.provider = EmbeddingProviderKind::from_str(&value)
            .map_err(|_| ConfigError::InvalidOverride { key, value })?;
    }
    if let Some((_, value)) = var("EMBEDDINGS_BASE_URL") {
        config.embeddings.base_url = Some(value);
    }
    if let Some((_, value)) = var("EMBEDDINGS_MODEL") {
        config.embeddings.model = value;
    }
    if let Some((_, value)) = var("EMBEDDINGS_API_KEY") {
        config.embeddings.api_key = Some(value);
    }
    if let Some((key, value)) = var("EMBEDDINGS_DIMENSIONS") {
        config.embeddings.dimensions = Some(parsed(&key, value)?);
    }
    if let Some((key, value)) = var("EMBEDDINGS_TIMEOUT_SECS") {
        config.embeddings.timeout_secs = parsed(&key, value)?;
    }
    if let Some((_, value)) = var("LOG") {
        config.telemetry.filter = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn temp_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("recall-config-{}.json", Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut config = RecallConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("RECALL_STORAGE_BACKEND", "memory"),
                ("RECALL_STORAGE_ROOT", "/var/lib/recall"),
                ("RECALL_DEDUP_THRESHOLD", "0.8"),
                ("RECALL_DEDUP_INTERVAL_HOURS", "6"),
                ("RECALL_SEARCH_MAX_TOP_K", "50"),
                ("RECALL_EMBEDDINGS_PROVIDER", "openai"),
                ("RECALL_EMBEDDINGS_MODEL", "text-embedding-3-small"),
                ("RECALL_EMBEDDINGS_DIMENSIONS", "256"),
                ("RECALL_LOG", "debug"),
            ]),
        )
        .unwrap();

        assert_eq!(config.storage.backend, StorageBackendKind::Memory);
        assert_eq!(config.storage.root, PathBuf::from("/var/lib/recall"));
        assert!((config.dedup.similarity_threshold - 0.8).abs() < f32::EPSILON);
        assert_eq!(config.dedup.interval_hours, 6);
        assert_eq!(config.search.max_top_k, 50);
        assert_eq!(config.embeddings.provider, EmbeddingProviderKind::OpenAi);
        assert_eq!(config.embeddings.model, "text-embedding-3-small");
        assert_eq!(config.embeddings.dimensions, Some(256));
        assert_eq!(config.telemetry.filter, "debug");
    }

    #[test]
    fn malformed_override_names_the_variable() {
        let mut config = RecallConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("RECALL_DEDUP_NEIGHBOR_CAP", "lots")]))
            .expect_err("not a number");
        assert!(
            matches!(err, ConfigError::InvalidOverride { ref key, .. } if key == "RECALL_DEDUP_NEIGHBOR_CAP")
        );

        let err = apply_env_overrides(&mut config, env(&[("RECALL_STORAGE_BACKEND", "s3")]))
            .expect_err("unknown backend");
        assert!(matches!(err, ConfigError::InvalidOverride { .. }));
    }

    #[test]
    fn reads_json_file() {
        let path = temp_file(r#"{ "search": { "default_top_k": 3 }, "telemetry": { "filter": "warn" } }"#);
        let config = read_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.search.default_top_k, 3);
        assert_eq!(config.search.max_top_k, 20);
        assert_eq!(config.telemetry.filter, "warn");
    }

    #[test]
    fn unreadable_or_malformed_files_error() {
        let missing = std::env::temp_dir().join(format!("recall-missing-{}.json", Uuid::new_v4()));
        assert!(matches!(read_file(&missing), Err(ConfigError::Read { .. })));

        let path = temp_file("{ not json");
        let err = read_file(&path).expect_err("malformed");
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
