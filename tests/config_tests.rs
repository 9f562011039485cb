use liquid_jsonpath::config::Config;
use liquid_jsonpath::policy::DefaultPolicy;
use liquid_jsonpath::template::{TemplateError, UndefinedMode};
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_defaults() {
    let config = Config::default();

    assert_eq!(config.default_policy, DefaultPolicy::Undefined);
    assert!(!config.strict_undefined);
    assert!(config.globals.is_empty());
}

#[test]
fn test_load_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(
        temp_file,
        r#"
default_policy = "raise"
strict_undefined = true

[globals]
names = ["Sue", "Sally"]
"#
    )
    .unwrap();

    let config = Config::load_from(temp_file.path()).unwrap();
    assert_eq!(config.default_policy, DefaultPolicy::Raise);
    assert!(config.strict_undefined);
    assert_eq!(config.undefined_mode(), UndefinedMode::Strict);
    assert_eq!(config.globals["names"], json!(["Sue", "Sally"]));
}

#[test]
fn test_load_from_missing_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let err = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap_err();
    assert!(err.to_string().contains("nope.toml"));
}

#[test]
fn test_load_from_invalid_file_fails() {
    let mut temp_file = NamedTempFile::new().unwrap();
    write!(temp_file, "default_policy = \"sometimes\"").unwrap();
    assert!(Config::load_from(temp_file.path()).is_err());
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");

    let mut config = Config {
        default_policy: DefaultPolicy::Empty,
        strict_undefined: true,
        ..Config::default()
    };
    config.globals.insert("site".to_string(), json!("example"));
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_environment_from_config() {
    let config = Config {
        default_policy: DefaultPolicy::Raise,
        ..Config::default()
    };
    let env = config.environment();

    let template = env.parse("{{ data | find: '$.*' }}").unwrap();
    let err = template.render(&json!({"data": 1})).unwrap_err();
    assert!(matches!(err, TemplateError::FilterArgument { .. }));

    let template = env
        .parse("{% for x in data | '$.*' %}{{ x }}{% endfor %}")
        .unwrap();
    let err = template.render(&json!({"data": 1})).unwrap_err();
    assert!(matches!(err, TemplateError::Type { .. }));
}
