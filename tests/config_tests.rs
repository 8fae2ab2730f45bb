//! Configuration loading and validation.

use std::io::Write;
use std::time::Duration;

use crossarb::domain::venue::Venue;
use crossarb::error::{ConfigError, Error};
use crossarb::infrastructure::config::settings::Config;
use rust_decimal_macros::dec;
use tempfile::NamedTempFile;

fn invalid_field(result: Result<Config, Error>) -> &'static str {
    match result {
        Err(Error::Config(ConfigError::InvalidValue { field, .. })) => field,
        other => panic!("expected an invalid value, got {other:?}"),
    }
}

#[test]
fn empty_file_yields_defaults() {
    let config = Config::parse_toml("").unwrap();

    assert!(config.symbols.is_empty());
    assert_eq!(config.execution.clip_size, dec!(1));
    assert_eq!(config.throttle.max_requests_per_sec, 5);

    let detector = config.detector_config();
    assert_eq!(detector.min_edge, None);
    assert_eq!(detector.buffer(dec!(10010)), dec!(1.001));
    assert_eq!(detector.max_quote_age.num_milliseconds(), 3000);

    let executor = config.executor_config();
    assert_eq!(executor.fill_timeout, Duration::from_secs(3));
    assert_eq!(executor.session_timeout, Duration::from_secs(120));

    let limits = config.risk_limits();
    assert_eq!(limits.max_position_per_symbol, dec!(100));
    assert_eq!(limits.pl_floor, dec!(-1000000));

    let retry = config.retry_policy();
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.base_delay(0), Duration::from_millis(200));
    assert_eq!(retry.base_delay(5), Duration::from_secs(2));
}

#[test]
fn loads_sections_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[detector]
min_edge = 15
clips_per_intent = 3

[fees]
krx = 0.0002
nxt = 0.0001

[execution]
clip_size = 5

[throttle]
max_requests_per_sec = 8
call_timeout_ms = 1500

[[symbols]]
code = "005930"
nxt_code = "005930_NX"
name = "Samsung Electronics"

[[symbols]]
code = "000660"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();

    let detector = config.detector_config();
    assert_eq!(detector.min_edge, Some(dec!(15)));
    assert_eq!(detector.target_qty(), dec!(15));

    let fees = config.fee_schedule();
    assert_eq!(fees.rate(Venue::Krx), dec!(0.0002));
    assert_eq!(fees.rate(Venue::Nxt), dec!(0.0001));

    let throttle = config.throttler_config();
    assert_eq!(throttle.max_requests_per_sec, 8);
    assert_eq!(throttle.call_timeout, Duration::from_millis(1500));

    let symbols = config.symbol_infos();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[0].code_for(Venue::Krx), "005930");
    assert_eq!(symbols[0].code_for(Venue::Nxt), "005930_NX");
    assert_eq!(symbols[1].code_for(Venue::Nxt), "000660");
}

#[test]
fn sample_config_is_valid() {
    let config = Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml")).unwrap();
    assert_eq!(config.symbols.len(), 2);
}

#[test]
fn missing_file_is_a_read_error() {
    let result = Config::load("/nonexistent/crossarb.toml");
    assert!(matches!(result, Err(Error::Config(ConfigError::ReadFile(_)))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let result = Config::parse_toml("[execution\nclip_size = 1");
    assert!(matches!(result, Err(Error::Config(ConfigError::Parse(_)))));
}

#[test]
fn rejects_out_of_range_values() {
    let cases = [
        ("[logging]\nformat = \"xml\"", "logging.format"),
        ("[execution]\nclip_size = 0", "clip_size"),
        ("[execution]\nfill_timeout_ms = 0", "fill_timeout_ms"),
        ("[detector]\nmin_edge = -1", "min_edge"),
        ("[detector]\ntick_size = 0", "tick_size"),
        ("[detector]\nclips_per_intent = 0", "clips_per_intent"),
        ("[risk]\npl_floor = 100", "pl_floor"),
        ("[risk]\nmax_consecutive_errors = 0", "max_consecutive_errors"),
        ("[throttle]\nmax_requests_per_sec = 0", "max_requests_per_sec"),
        (
            "[throttle.retry]\ninitial_delay_ms = 500\nmax_delay_ms = 100",
            "retry.max_delay_ms",
        ),
        (
            "[[symbols]]\ncode = \"005930\"\n[[symbols]]\ncode = \"005930\"",
            "symbols",
        ),
    ];

    for (toml, field) in cases {
        assert_eq!(invalid_field(Config::parse_toml(toml)), field, "{toml}");
    }
}

#[test]
fn blank_symbol_code_is_missing() {
    let result = Config::parse_toml("[[symbols]]\ncode = \" \"");
    assert!(matches!(
        result,
        Err(Error::Config(ConfigError::MissingField {
            field: "symbols.code"
        }))
    ));
}
