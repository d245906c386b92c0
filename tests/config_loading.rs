// tests/config_loading.rs

use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use toolrun::config::{EngineSection, load_and_validate, parse_and_validate};
use toolrun::errors::ToolrunError;
use toolrun_test_utils::builders::{ConfigFileBuilder, ToolConfigBuilder};

type TestResult = Result<(), Box<dyn Error>>;

fn config_error(doc: &str) -> String {
    match parse_and_validate(doc) {
        Err(ToolrunError::ConfigError(msg)) => msg,
        Err(other) => panic!("expected ConfigError, got {other:?}"),
        Ok(cfg) => panic!("expected ConfigError, got {cfg:?}"),
    }
}

#[test]
fn full_document_parses() -> TestResult {
    let cfg = parse_and_validate(
        r#"
[engine]
working_dir = "/var/tmp/toolrun"
timeout = "10m"

[tool.encode]
program = "/usr/bin/ffmpeg"
args = "-y -i 'my input.mkv' out.mp4"
progress = "ffmpeg"
require_success = true

[tool.probe]
program = "/usr/bin/ffprobe"
timeout = "30s"

[tool.custom]
program = "/opt/bin/render"
working_dir = "/srv/render"

[tool.custom.progress_patterns]
duration = 'frames: (?P<secs>\d+)'
position = 'frame (?P<secs>\d+)'
counter = 'tile (?P<done>\d+)/(?P<total>\d+)'
"#,
    )?;

    assert_eq!(cfg.engine.working_dir, Some(PathBuf::from("/var/tmp/toolrun")));
    assert_eq!(cfg.tool.len(), 3);

    let encode = &cfg.tool["encode"];
    assert!(encode.require_success);
    assert_eq!(encode.progress.as_deref(), Some("ffmpeg"));
    assert!(encode.progress_profile()?.is_some());
    assert_eq!(
        encode.effective_timeout(&cfg.engine)?,
        Some(Duration::from_secs(600))
    );

    let probe = &cfg.tool["probe"];
    assert_eq!(probe.args, "");
    assert!(!probe.require_success);
    assert!(probe.progress_profile()?.is_none());
    assert_eq!(
        probe.effective_timeout(&cfg.engine)?,
        Some(Duration::from_secs(30))
    );

    let custom = cfg.tool["custom"].invocation();
    assert_eq!(custom.program(), PathBuf::from("/opt/bin/render"));
    assert_eq!(custom.working_dir(), Some(PathBuf::from("/srv/render").as_path()));
    assert!(cfg.tool["custom"].progress_profile()?.is_some());
    Ok(())
}

#[test]
fn empty_config_is_rejected() {
    let msg = config_error("[engine]\ntimeout = \"5s\"\n");
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn empty_program_is_rejected() {
    let msg = config_error("[tool.blank]\nprogram = \"\"\n");
    assert!(msg.starts_with("tool 'blank':"), "{msg}");
}

#[test]
fn bad_durations_are_rejected() {
    let err = parse_and_validate("[engine]\ntimeout = \"soon\"\n[tool.a]\nprogram = \"/bin/true\"\n")
        .expect_err("engine timeout must parse");
    assert!(matches!(err, ToolrunError::ConfigError(_)), "{err:?}");

    let msg = config_error("[tool.a]\nprogram = \"/bin/true\"\ntimeout = \"5 parsecs\"\n");
    assert!(msg.starts_with("tool 'a':"), "{msg}");
}

#[test]
fn unknown_progress_profile_is_rejected() {
    let msg = config_error("[tool.a]\nprogram = \"/bin/true\"\nprogress = \"handbrake\"\n");
    assert!(msg.contains("unknown progress profile 'handbrake'"), "{msg}");
}

#[test]
fn progress_and_patterns_are_exclusive() {
    let msg = config_error(
        r#"
[tool.a]
program = "/bin/true"
progress = "ffmpeg"

[tool.a.progress_patterns]
duration = '(?P<secs>\d+)'
position = '(?P<secs>\d+)'
"#,
    );
    assert!(msg.contains("mutually exclusive"), "{msg}");
}

#[test]
fn broken_regex_is_an_invalid_pattern() {
    let err = parse_and_validate(
        r#"
[tool.a]
program = "/bin/true"

[tool.a.progress_patterns]
duration = '(?P<secs>\d+'
position = '(?P<secs>\d+)'
"#,
    )
    .expect_err("regex must compile");

    match err {
        ToolrunError::InvalidPattern { pattern, .. } => assert_eq!(pattern, r"(?P<secs>\d+"),
        other => panic!("expected InvalidPattern, got {other:?}"),
    }
}

#[cfg(unix)]
#[test]
fn unbalanced_quotes_are_rejected() {
    let msg = config_error("[tool.a]\nprogram = \"/bin/echo\"\nargs = \"'never closed\"\n");
    assert!(msg.contains("unbalanced quoting"), "{msg}");
}

#[test]
fn malformed_toml_is_a_toml_error() {
    let err = parse_and_validate("[tool.a\nprogram = 1").expect_err("toml must parse");
    assert!(matches!(err, ToolrunError::TomlError(_)), "{err:?}");
}

#[test]
fn loads_from_disk() -> TestResult {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "[tool.hello]\nprogram = \"/bin/echo\"\nargs = \"hello world\"")?;

    let cfg = load_and_validate(file.path())?;
    let invocation = cfg.tool["hello"].invocation();
    assert_eq!(invocation.arguments(), "hello world");
    assert_eq!(invocation.working_dir(), None);
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/Toolrun.toml").expect_err("no such file");
    assert!(matches!(err, ToolrunError::IoError(_)), "{err:?}");
}

#[test]
fn tool_timeout_overrides_engine_timeout() -> TestResult {
    let cfg = ConfigFileBuilder::new()
        .engine_timeout("1h")
        .with_tool("quick", ToolConfigBuilder::new("/bin/true").timeout("250ms").build())
        .with_tool("slow", ToolConfigBuilder::new("/bin/true").build())
        .build();

    assert_eq!(
        cfg.tool["quick"].effective_timeout(&cfg.engine)?,
        Some(Duration::from_millis(250))
    );
    assert_eq!(
        cfg.tool["slow"].effective_timeout(&cfg.engine)?,
        Some(Duration::from_secs(3600))
    );
    assert_eq!(
        cfg.tool["slow"].effective_timeout(&EngineSection::default())?,
        None
    );
    Ok(())
}

#[test]
fn demo_config_is_valid() -> TestResult {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/Toolrun.toml");
    let cfg = load_and_validate(&path)?;

    assert_eq!(
        cfg.tool.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["countdown", "fake-encode", "hello"]
    );
    for tool in cfg.tool.values() {
        assert!(tool.progress_profile().is_ok());
    }
    Ok(())
}
