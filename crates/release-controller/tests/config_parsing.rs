use std::{env, fs};

use release_controller::AmbiguityPolicy;
use release_controller::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("release-service.toml");

    let toml_content = r#"
[controller]
workers = 2
retry_base_delay_ms = 50
retry_max_delay_ms = 5000
ambiguous_target = "first_by_name"

[logging]
level = "debug"

[bootstrap]
seed_dir = "./seed"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.controller.workers, 2);
    assert_eq!(cfg.controller.retry_base_delay_ms, 50);
    assert_eq!(cfg.controller.event_capacity, 1024);
    assert_eq!(cfg.controller.ambiguous_target, AmbiguityPolicy::FirstByName);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.bootstrap.seed_dir.as_deref(), Some("./seed"));

    // 2) Env override should win over file
    unsafe {
        env::set_var("RELEASE_SERVICE__CONTROLLER__WORKERS", "9");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.controller.workers, 9);
    unsafe {
        env::remove_var("RELEASE_SERVICE__CONTROLLER__WORKERS");
    }

    // 3) Invalid config (base > max) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[controller]
retry_base_delay_ms = 10000
retry_max_delay_ms = 100
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("retry_base_delay_ms must be <="));

    // 4) Unknown policy is rejected at deserialization
    let bad_policy_path = dir.path().join("bad-policy.toml");
    fs::write(&bad_policy_path, "[controller]\nambiguous_target = \"random\"\n")
        .expect("write toml");
    let err = load_config(bad_policy_path.to_str()).expect_err("expected deserialize error");
    assert!(err.contains("config deserialize error"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");
    let cfg = load_config(path.to_str()).expect("defaults");
    assert_eq!(cfg.controller.ambiguous_target, AmbiguityPolicy::Strict);
    assert_eq!(cfg.logging.level, "info");
}
