use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("info".to_string());
    raw.auth.callback_timeout_seconds = Some(60);
    raw.browser.enabled = Some(true);

    let overrides = Overrides {
        log_level: Some("debug".to_string()),
        callback_timeout_seconds: Some(15),
        no_browser: true,
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert_eq!(settings.auth.callback_timeout, Some(Duration::from_secs(15)));
    assert!(!settings.browser.enabled);
}

#[test]
fn defaults_listen_on_loopback_7881() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.auth.redirect_uri.as_str(), DEFAULT_REDIRECT_URI);
    assert_eq!(settings.auth.client_id.as_str(), DEFAULT_CLIENT_ID);
    assert_eq!(
        settings.auth.callback_addr,
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 7881)
    );
    assert_eq!(
        settings.auth.callback_timeout,
        Some(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS))
    );
    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(settings.browser.enabled);
}

#[test]
fn zero_timeout_waits_forever() {
    let mut raw = RawSettings::default();
    raw.auth.callback_timeout_seconds = Some(0);
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.auth.callback_timeout, None);
}

#[test]
fn redirect_uri_must_be_loopback() {
    let mut raw = RawSettings::default();
    raw.auth.redirect_uri = Some("http://example.com:7881/".to_string());
    let err = Settings::from_raw(raw).expect_err("remote host rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "auth.redirect_uri",
            ..
        }
    ));
}

#[test]
fn redirect_uri_requires_explicit_port() {
    let mut raw = RawSettings::default();
    raw.auth.redirect_uri = Some("http://127.0.0.1/".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn redirect_uri_rejects_https() {
    let mut raw = RawSettings::default();
    raw.auth.redirect_uri = Some("https://localhost:7881/".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn ipv6_loopback_redirect_is_accepted() {
    let mut raw = RawSettings::default();
    raw.auth.redirect_uri = Some("http://[::1]:9000/callback".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.auth.callback_addr.ip().is_loopback());
    assert_eq!(settings.auth.callback_addr.port(), 9000);
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).expect_err("bad level");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.level",
            ..
        }
    ));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = Overrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn blank_editor_command_falls_back_to_environment() {
    let mut raw = RawSettings::default();
    raw.editor.command = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.editor.command, None);
}

#[test]
fn parse_get_token_arguments() {
    let args = CliArgs::parse_from(["entries", "get-token", "https://example.com/"]);
    match args.command {
        Command::GetToken(target) => assert_eq!(target.url, "https://example.com/"),
        other => panic!("wrong command parsed: {other:?}"),
    }
}

#[test]
fn global_overrides_follow_the_subcommand() {
    let args = CliArgs::parse_from([
        "entries",
        "create",
        "https://example.com/",
        "--no-browser",
        "--editor",
        "nano",
        "--callback-timeout-seconds",
        "30",
    ]);

    assert!(matches!(args.command, Command::Create(_)));
    assert_eq!(args.command.target(), "https://example.com/");
    assert!(args.overrides.no_browser);
    assert_eq!(args.overrides.editor.as_deref(), Some("nano"));
    assert_eq!(args.overrides.callback_timeout_seconds, Some(30));
}

#[test]
fn every_command_requires_a_url() {
    for command in ["get-token", "create", "update", "source", "delete"] {
        let result = CliArgs::try_parse_from(["entries", command]);
        assert!(result.is_err(), "{command} should require a URL");
    }
}
