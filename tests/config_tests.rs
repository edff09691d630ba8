use evidence_acquisition::config::{AcquisitionConfig, ConfigManager, ConfigurationError};
use evidence_acquisition::constants::class_names;
use evidence_acquisition::registry::{TaskDependencies, TaskManager};

#[test]
fn test_json_file_is_loaded_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acquisition.json");
    std::fs::write(
        &path,
        r#"{
            "timestamp": {"server_name": "https://tsa.example.org/tsr"},
            "pec": {"enabled": true, "pec_email": "evidence@pec.example.it", "retries": 3}
        }"#,
    )
    .unwrap();

    let manager = ConfigManager::load_from_file(&path).unwrap();
    let config = manager.config();
    assert_eq!(config.timestamp.server_name, "https://tsa.example.org/tsr");
    assert!(config.timestamp.enabled);
    assert!(config.pec.enabled);
    assert_eq!(config.pec.retries, 3);
    assert_eq!(config.pec.imap_port, 993);
}

#[test]
fn test_missing_file_is_an_error_not_a_default() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigManager::load_from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
}

#[test]
fn test_malformed_file_is_a_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acquisition.toml");
    std::fs::write(&path, "[execution\nworker_grace_period_ms = ").unwrap();

    let err = ConfigManager::load_from_file(&path).unwrap_err();
    assert!(matches!(err, ConfigurationError::LoadError { .. }));
}

#[test]
fn test_environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("acquisition.toml");
    std::fs::write(&path, "[network_check]\nntp_server = \"ntp.file.example\"\n").unwrap();

    std::env::set_var("ACQUISITION__NETWORK_CHECK__NTP_SERVER", "ntp.env.example");
    let result = ConfigManager::load_from_file(&path);
    std::env::remove_var("ACQUISITION__NETWORK_CHECK__NTP_SERVER");

    assert_eq!(result.unwrap().config().network_check.ntp_server, "ntp.env.example");
}

#[test]
fn test_enabled_capture_requires_a_program() {
    let mut config = AcquisitionConfig::default();
    config.screen_recorder.program = "  ".into();

    let err = ConfigManager::from_config(config).unwrap_err();
    assert!(err.to_string().contains("screen_recorder.program"));

    let mut config = AcquisitionConfig::default();
    config.screen_recorder.enabled = false;
    config.screen_recorder.program = String::new();
    assert!(ConfigManager::from_config(config).is_ok());
}

#[test]
fn test_controller_views() {
    let config = AcquisitionConfig::default();
    let pec = config.controller("pec").unwrap();
    assert_eq!(pec["enabled"], false);
    assert_eq!(config.controller("timestamp").unwrap()["enabled"], true);
    assert!(config.controller("unknown").is_none());
}

#[test]
fn test_flags_gate_task_discovery() {
    let mut config = AcquisitionConfig::default();
    config.network_tools.traceroute = false;
    config.packet_capture.enabled = false;
    config.timestamp.enabled = false;

    let manager = TaskManager::with_builtin_tasks(TaskDependencies::new(config));
    manager.load_all_task_modules().unwrap();

    assert!(!manager.is_discovered(class_names::TASK_TRACEROUTE));
    assert!(!manager.is_discovered(class_names::TASK_PACKET_CAPTURE));
    assert!(!manager.is_discovered(class_names::TASK_TIMESTAMP));
    assert!(!manager.is_discovered(class_names::TASK_PEC_AND_DOWNLOAD_EML));
    assert!(manager.is_discovered(class_names::TASK_SCREEN_RECORDER));
    assert!(manager.is_discovered("WHOIS"));
    assert!(manager.is_discovered(class_names::TASK_HASH));
}
