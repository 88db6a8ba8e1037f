// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Dialflow configuration system.

use dialflow_config::diagnostic::ConfigError;
use dialflow_config::model::DialflowConfig;
use dialflow_config::{
    InterestPolicy, TelephonyMode, load_and_validate_str, load_config_from_path,
    load_config_from_str,
};
use dialflow_core::types::InterestLevel;

#[test]
fn valid_toml_deserializes_into_config() {
    let toml = r#"
[service]
name = "outbound-east"
log_level = "debug"

[storage]
database_path = "/tmp/dialflow-test.db"
wal_mode = false

[scheduler]
poll_interval_secs = 10
max_wait_secs = 60
drain_timeout_secs = 5
utc_offset_minutes = -300
interest_policy = "direct"

[telephony]
mode = "http"
endpoint = "https://voice.example/originate"
api_token = "tok_123"
from_number = "+15550100"
timeout_secs = 8

[campaign_defaults]
calls_per_hour = 12
start_time = "08:30"
end_time = "18:00"
interest_levels = ["cold", "warm"]
max_days_since_last_call = 3
max_customers = 200
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "outbound-east");
    assert_eq!(config.service.log_level, "debug");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.scheduler.utc_offset_minutes, -300);
    assert_eq!(config.scheduler.interest_policy, InterestPolicy::Direct);
    assert_eq!(config.telephony.mode, TelephonyMode::Http);
    assert_eq!(config.telephony.api_token.as_deref(), Some("tok_123"));
    assert_eq!(config.campaign_defaults.calls_per_hour, 12);
    assert_eq!(
        config.campaign_defaults.interest_levels,
        vec![InterestLevel::Cold, InterestLevel::Warm]
    );
    assert_eq!(config.campaign_defaults.max_customers, 200);
}

#[test]
fn missing_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "dialflow");
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.storage.database_path, "dialflow.db");
    assert!(config.storage.wal_mode);
    assert_eq!(config.scheduler.poll_interval_secs, 30);
    assert_eq!(config.scheduler.max_wait_secs, 300);
    assert_eq!(config.scheduler.interest_policy, InterestPolicy::Stepwise);
    assert_eq!(config.scheduler.default_callback_delay_hours, 24);
    assert_eq!(config.telephony.mode, TelephonyMode::DryRun);
    assert!(config.telephony.endpoint.is_none());
    assert_eq!(config.campaign_defaults.start_time, "09:00");
    assert_eq!(config.campaign_defaults.end_time, "17:00");
}

#[test]
fn unknown_field_is_rejected() {
    let err = load_config_from_str("[scheduler]\nmax_wiat_secs = 5\n")
        .expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("max_wiat_secs"),
        "error should mention the bad key, got: {err_str}"
    );
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[billing]\nplan = \"pro\"\n").expect_err("unknown section");
    assert!(format!("{err}").contains("billing"));
}

#[test]
fn env_style_override_wins_over_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: DialflowConfig = Figment::new()
        .merge(Serialized::defaults(DialflowConfig::default()))
        .merge(Toml::string("[scheduler]\nutc_offset_minutes = 60\n"))
        .merge(("scheduler.utc_offset_minutes", 120))
        .merge(("telephony.mode", "http"))
        .extract()
        .expect("should extract");

    assert_eq!(config.scheduler.utc_offset_minutes, 120);
    assert_eq!(config.telephony.mode, TelephonyMode::Http);
}

#[test]
fn missing_config_file_falls_back_to_defaults() {
    let dir = std::env::temp_dir().join("dialflow-config-tests-missing");
    let config = load_config_from_path(&dir.join("nope.toml")).expect("defaults");
    assert_eq!(config.storage.database_path, "dialflow.db");
}

#[test]
fn diagnostic_suggests_correction_for_typo() {
    let errors = load_and_validate_str("[campaign_defaults]\ncalls_per_hr = 4\n")
        .expect_err("typo should fail");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key,
            suggestion,
            valid_keys,
            ..
        } => {
            assert_eq!(key, "calls_per_hr");
            assert_eq!(suggestion.as_deref(), Some("calls_per_hour"));
            assert!(valid_keys.contains("max_customers"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn diagnostic_reports_invalid_type() {
    let errors = load_and_validate_str("[scheduler]\nmax_wait_secs = \"soon\"\n")
        .expect_err("string for integer should fail");
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { .. }),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn diagnostic_reports_unknown_enum_value() {
    let errors = load_and_validate_str("[telephony]\nmode = \"sip\"\n")
        .expect_err("unknown mode should fail");
    let rendered = errors[0].to_string();
    assert!(rendered.contains("sip"), "got: {rendered}");
}

#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let errors = load_and_validate_str("[telephony]\nmode = \"http\"\n")
        .expect_err("http without endpoint");
    let diagnostic: &dyn Diagnostic = &errors[0];
    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, diagnostic)
        .expect("render");
    assert!(buf.contains("telephony.endpoint"));
}

#[test]
fn load_and_validate_rejects_inverted_window() {
    let errors = load_and_validate_str(
        "[campaign_defaults]\nstart_time = \"17:00\"\nend_time = \"09:00\"\n",
    )
    .expect_err("inverted window");
    assert!(errors[0].to_string().contains("inverted"));
}

#[test]
fn load_and_validate_accepts_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.campaign_defaults.max_customers, 50);
}
