//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ExportFormat, FerryConfig, ParseErrorPolicy, RunMode};
use super::secret::secret_string;
use crate::domain::errors::FerryError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into FerryConfig
/// 4. Applies environment variable overrides (FERRY_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`FerryError::Configuration`] if the file cannot be read, a
/// referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use ferry::config::loader::load_config;
///
/// let config = load_config("ferry.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<FerryConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(FerryError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        FerryError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_from_str(&contents)
}

/// Parses configuration from TOML text, applying substitution, overrides and
/// validation exactly as [`load_config`] does
pub fn load_config_from_str(contents: &str) -> Result<FerryConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: FerryConfig = toml::from_str(&contents)
        .map_err(|e| FerryError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        FerryError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched. Every missing variable is reported in
/// a single error.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| FerryError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |caps: &regex::Captures<'_>| {
            let var_name = &caps[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(FerryError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(val) => val.parse().map(Some).map_err(|e| {
            FerryError::Configuration(format!("Invalid value '{val}' for {name}: {e}"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using FERRY_* prefix
///
/// Environment variables follow the pattern: FERRY_<SECTION>_<KEY>,
/// for example FERRY_STORE_REGION or FERRY_RETRY_MAX_ATTEMPTS.
fn apply_env_overrides(config: &mut FerryConfig) -> Result<()> {
    // Application overrides
    if let Some(val) = env_var("FERRY_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(val) = parse_env("FERRY_APPLICATION_DRY_RUN")? {
        config.application.dry_run = val;
    }

    // Store overrides
    if let Some(val) = env_var("FERRY_STORE_REGION") {
        config.store.region = val;
    }
    if let Some(val) = parse_env("FERRY_STORE_MAX_BATCH_WRITE_ITEMS")? {
        config.store.max_batch_write_items = val;
    }
    if let Some(val) = parse_env("FERRY_STORE_SCAN_PAGE_SIZE")? {
        config.store.scan_page_size = val;
    }
    if let Some(ref mut pg) = config.store.postgresql {
        if let Some(val) = env_var("FERRY_STORE_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = parse_env("FERRY_STORE_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
        if let Some(val) = env_var("FERRY_STORE_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // Blob overrides
    if let Some(ref mut local) = config.blob.local {
        if let Some(val) = env_var("FERRY_BLOB_LOCAL_ROOT") {
            local.root = val;
        }
    }
    if let Some(ref mut http) = config.blob.http {
        if let Some(val) = env_var("FERRY_BLOB_HTTP_ENDPOINT") {
            http.endpoint = val;
        }
        if let Some(val) = env_var("FERRY_BLOB_HTTP_TOKEN") {
            http.token = Some(secret_string(val));
        }
    }

    // Import overrides
    if let Some(val) = env_var("FERRY_IMPORT_SOURCE_CONTAINER") {
        config.import.source_container = val;
    }
    if let Some(val) = parse_env("FERRY_IMPORT_MAX_BATCH_SIZE")? {
        config.import.max_batch_size = val;
    }
    if let Some(val) = env_var("FERRY_IMPORT_PARSE_ERROR_POLICY") {
        config.import.parse_error_policy = match val.to_ascii_lowercase().as_str() {
            "abort" => ParseErrorPolicy::Abort,
            "skip" => ParseErrorPolicy::Skip,
            other => {
                return Err(FerryError::Configuration(format!(
                    "Invalid value '{other}' for FERRY_IMPORT_PARSE_ERROR_POLICY: expected abort or skip"
                )))
            }
        };
    }

    // Export overrides
    if let Some(val) = env_var("FERRY_EXPORT_DESTINATION_CONTAINER") {
        config.export.destination_container = val;
    }
    if let Some(val) = env_var("FERRY_EXPORT_KEY_PREFIX") {
        config.export.key_prefix = val;
    }
    if let Some(val) = parse_env::<ExportFormat>("FERRY_EXPORT_FORMAT")? {
        config.export.format = val;
    }

    // Retry overrides
    if let Some(val) = parse_env("FERRY_RETRY_MAX_ATTEMPTS")? {
        config.retry.max_attempts = val;
    }
    if let Some(val) = parse_env("FERRY_RETRY_BASE_DELAY_MS")? {
        config.retry.base_delay_ms = val;
    }
    if let Some(val) = parse_env("FERRY_RETRY_MAX_DELAY_MS")? {
        config.retry.max_delay_ms = val;
    }

    // Run overrides
    if let Some(val) = parse_env::<RunMode>("FERRY_RUN_MODE")? {
        config.run.mode = val;
    }
    if let Some(val) = parse_env("FERRY_RUN_CONCURRENCY")? {
        config.run.concurrency = val;
    }
    if let Some(val) = parse_env("FERRY_RUN_TASK_TIMEOUT_SECS")? {
        config.run.task_timeout_secs = Some(val);
    }

    // Logging overrides
    if let Some(val) = parse_env("FERRY_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env_var("FERRY_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Some(val) = env_var("FERRY_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::StoreBackend;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[store]
backend = "memory"
region = "eu-west-1"

[blob]
backend = "memory"
"#;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("FERRY_TEST_SUBST_VAR", "test_value");
        let input = "token = \"${FERRY_TEST_SUBST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "token = \"test_value\"");
        std::env::remove_var("FERRY_TEST_SUBST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_reports_all_missing() {
        std::env::remove_var("FERRY_TEST_MISSING_A");
        std::env::remove_var("FERRY_TEST_MISSING_B");
        let input = "a = \"${FERRY_TEST_MISSING_A}\"\nb = \"${FERRY_TEST_MISSING_B}\"";
        let err = substitute_env_vars(input).unwrap_err().to_string();
        assert!(err.contains("FERRY_TEST_MISSING_A"));
        assert!(err.contains("FERRY_TEST_MISSING_B"));
    }

    #[test]
    fn test_substitute_env_vars_skips_comments() {
        std::env::remove_var("FERRY_TEST_COMMENTED");
        let input = "# token = \"${FERRY_TEST_COMMENTED}\"\nregion = \"eu\"";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("${FERRY_TEST_COMMENTED}"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent-ferry.toml");
        assert!(matches!(result, Err(FerryError::Configuration(_))));
    }

    #[test]
    fn test_load_config_minimal_defaults() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.import.max_batch_size, 100);
        assert_eq!(config.store.max_batch_write_items, 25);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.export.key_prefix, "source");
        assert!(config.work_items().unwrap().is_empty());
    }

    #[test]
    fn test_load_config_valid_file() {
        let toml_content = r#"
[application]
log_level = "debug"

[store]
backend = "memory"
region = "us-east-1"

[blob]
backend = "local"

[blob.local]
root = "/var/lib/ferry"

[import]
source_container = "incoming"
max_batch_size = 50
parse_error_policy = "skip"

[[import.tasks]]
table_name = "customers"
blob_key = "customers.csv"

[export]
destination_container = "snapshots"
tables = ["orders", "invoices"]
format = "csv"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.import.parse_error_policy, ParseErrorPolicy::Skip);
        assert_eq!(config.export.format, ExportFormat::Csv);
        assert_eq!(config.work_items().unwrap().len(), 3);
    }

    #[test]
    fn test_load_config_invalid_is_reported() {
        let toml_content = MINIMAL.replace("eu-west-1", "");
        let err = load_config_from_str(&toml_content).unwrap_err();
        assert!(err.to_string().contains("store.region"));
    }
}
