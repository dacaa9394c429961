//! Integration tests for logging functionality

use ferry::config::{load_config_from_str, LoggingConfig};
use ferry::logging::init_logging;
use std::time::Duration;
use tempfile::TempDir;

const BASE: &str = r#"
[store]
backend = "memory"
region = "local"

[blob]
backend = "memory"
"#;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(!config.local_enabled);
    assert_eq!(config.local_path, "./logs");
    assert_eq!(config.local_rotation, "daily");
}

#[test]
fn test_logging_section_parsed() {
    let toml = format!(
        "{BASE}\n[logging]\nlocal_enabled = true\nlocal_path = \"/tmp/ferry-logs\"\nlocal_rotation = \"never\"\n"
    );
    let config = load_config_from_str(&toml).unwrap();
    assert!(config.logging.local_enabled);
    assert_eq!(config.logging.local_rotation, "never");
}

#[test]
fn test_invalid_rotation_rejected() {
    let toml = format!("{BASE}\n[logging]\nlocal_rotation = \"size\"\n");
    let err = load_config_from_str(&toml).unwrap_err();
    assert!(err.to_string().contains("local_rotation"));
}

#[test]
fn test_invalid_level_rejected_before_init() {
    let result = init_logging("verbose", &LoggingConfig::default());
    assert!(result.is_err());
}

#[test]
fn test_macros_expand_to_expressions() {
    for failed in [0usize, 3] {
        let elapsed = Duration::from_millis(10);
        match failed {
            0 => ferry::log_task_complete!("import users.csv -> users", 10, failed, elapsed),
            _ => ferry::log_retry_attempt!(1, 5, format!("{failed} items unprocessed")),
        }
        let () = ferry::log_batch_processing!("users", 1, 10);
        let () = ferry::log_task_start!("import users.csv -> users");
    }
}

// The global subscriber can only be installed once per process, so this is
// the only test here that initializes it.
#[test]
fn test_init_creates_log_directory() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().to_string(),
        local_rotation: "never".to_string(),
    };
    assert!(!log_path.exists());

    let guard = init_logging("debug", &config).unwrap();
    assert!(guard.has_file_output());
    assert!(log_path.is_dir());

    ferry::log_task_start!("export orders");
    ferry::log_batch_processing!("orders", 1, 100);
    ferry::log_retry_attempt!(1, 5, "25 items unprocessed");
    ferry::log_task_complete!("export orders", 100, 0, Duration::from_millis(250));
    drop(guard);

    let files: Vec<_> = std::fs::read_dir(&log_path).unwrap().collect();
    assert!(!files.is_empty());
}
