use super::*;
use std::collections::HashMap;

#[test]
fn test_defaults_match_documented_values() {
    let cfg = Config::default();
    assert_eq!(cfg.persona.name, "Yamato");
    assert_eq!(cfg.provider.model, "llama3-8b-8192");
    assert_eq!(cfg.provider.max_attempts, 3);
    assert_eq!(cfg.connection.base_delay_ms, 3_000);
    assert_eq!(cfg.connection.max_delay_ms, 60_000);
    assert_eq!(cfg.connection.max_retries, 10);
    assert_eq!(cfg.connection.max_connection_attempts, 50);
    assert_eq!(cfg.connection.fresh_session_delay_ms, 10_000);
    assert_eq!(cfg.connection.health_interval_secs, 30);
    assert_eq!(cfg.connection.connect_timeout_secs, 90);
    assert_eq!(cfg.commands.prefix, "/");
    assert_eq!(cfg.commands.reload_debounce_ms, 500);
    assert_eq!(cfg.api.port, 3000);
    assert_eq!(cfg.persona.fallback_replies.len(), 8);
}

#[test]
fn test_partial_toml_fills_defaults() {
    let toml_str = r#"
        [bot]
        name = "Test Bot"

        [connection]
        max_retries = 4
    "#;
    let cfg: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(cfg.bot.name, "Test Bot");
    assert_eq!(cfg.bot.log_level, "info");
    assert_eq!(cfg.connection.max_retries, 4);
    assert_eq!(cfg.connection.base_delay_ms, 3_000);
    assert_eq!(cfg.persona.greetings, vec!["hey", "hi", "hello"]);
}

#[test]
fn test_load_missing_file_uses_defaults() {
    let cfg = load("/nonexistent/__yamato_config__.toml").unwrap();
    assert_eq!(cfg.bot.name, "Yamato Bot");
}

#[test]
fn test_load_invalid_toml_is_config_error() {
    let tmp = std::env::temp_dir().join("__yamato_bad_config__.toml");
    std::fs::write(&tmp, "[bot\nname = ").unwrap();
    let err = load(tmp.to_str().unwrap()).unwrap_err();
    assert!(matches!(err, YamatoError::Config(_)));
    let _ = std::fs::remove_file(&tmp);
}

#[test]
fn test_env_overrides() {
    let env: HashMap<&str, &str> = [
        ("GROQ_API_KEY", "gsk_test"),
        ("ADMIN_NUMBER", "5511999887766"),
        ("PORT", "8080"),
    ]
    .into_iter()
    .collect();

    let mut cfg = Config::default();
    cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
    assert_eq!(cfg.provider.api_key, "gsk_test");
    assert_eq!(cfg.admin.numbers, vec!["5511999887766"]);
    assert_eq!(cfg.api.port, 8080);

    // Applying twice does not duplicate the admin entry.
    cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
    assert_eq!(cfg.admin.numbers.len(), 1);
}

#[test]
fn test_invalid_port_override_is_ignored() {
    let mut cfg = Config::default();
    cfg.apply_overrides(|k| (k == "PORT").then(|| "not-a-port".to_string()));
    assert_eq!(cfg.api.port, 3000);
}

#[test]
fn test_missing_api_key_stays_empty() {
    let mut cfg = Config::default();
    cfg.apply_overrides(|_| None);
    assert!(cfg.provider.api_key.is_empty());
}

#[test]
fn test_admin_matching_ignores_formatting() {
    let admin = AdminConfig {
        numbers: vec!["+55 11 99988-7766".into()],
    };
    assert!(admin.is_admin("5511999887766"));
    assert!(!admin.is_admin("5511000000000"));
    assert!(!admin.is_admin(""));
}

#[test]
fn test_derived_paths() {
    let mut cfg = Config::default();
    cfg.bot.data_dir = "/srv/yamato".into();
    assert_eq!(cfg.auth_dir(), PathBuf::from("/srv/yamato/auth"));
    assert_eq!(cfg.stickers_dir(), PathBuf::from("/srv/yamato/stickers"));
    assert_eq!(
        cfg.store_path(),
        PathBuf::from("/srv/yamato/data/database.json")
    );
    assert_eq!(cfg.commands_dir(), PathBuf::from("/srv/yamato/commands"));

    cfg.commands.dir = "/opt/commands".into();
    assert_eq!(cfg.commands_dir(), PathBuf::from("/opt/commands"));
}

#[test]
fn test_shellexpand_home() {
    if let Some(home) = std::env::var_os("HOME") {
        let expanded = shellexpand("~/.yamato");
        assert_eq!(expanded, format!("{}/.yamato", home.to_string_lossy()));
    }
    assert_eq!(shellexpand("/abs/path"), "/abs/path");
}
