// tests/tool_runner.rs
#![cfg(unix)]

use std::error::Error;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use toolrun::config::EngineSection;
use toolrun::errors::ToolrunError;
use toolrun::exec::run_tool;
use toolrun::progress::{ProgressEvent, ProgressUnit};
use toolrun_test_utils::builders::ToolConfigBuilder;
use toolrun_test_utils::{init_tracing, isolated_engine, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn drain(mut rx: mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn ffmpeg_profile_reports_progress() -> TestResult {
    init_tracing();
    let (engine, registry) = isolated_engine();
    let tool = ToolConfigBuilder::shell(
        "echo '  Duration: 00:00:10.00, start: 0.000000' >&2; \
         echo 'frame=1 time=00:00:02.50 bitrate=1' >&2; \
         echo 'frame=2 time=00:00:05.00 bitrate=1' >&2; \
         echo 'frame=3 time=00:00:10.00 bitrate=1' >&2; \
         echo encoded",
    )
    .progress("ffmpeg")
    .build();

    let (tx, rx) = mpsc::unbounded_channel();
    let result = with_timeout(run_tool(
        &engine,
        "encode",
        &tool,
        &EngineSection::default(),
        &CancellationToken::new(),
        Some(tx),
    ))
    .await?;

    assert_eq!(result.stdout(), "encoded\n");
    let fractions: Vec<f64> = drain(rx).iter().map(|e| e.fraction).collect();
    assert_eq!(fractions, vec![0.25, 0.5, 1.0]);
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn custom_patterns_with_counter() -> TestResult {
    init_tracing();
    let (engine, _registry) = isolated_engine();

    let mut tool = ToolConfigBuilder::shell("echo 'item 1/4'; echo 'item 2/4'; echo 'item 4/4'")
        .progress_patterns(r"len=(?P<secs>\d+)", r"at=(?P<secs>\d+)")
        .build();
    if let Some(patterns) = tool.progress_patterns.as_mut() {
        patterns.counter = Some(r"item (?P<done>\d+)/(?P<total>\d+)".to_string());
    }

    let (tx, rx) = mpsc::unbounded_channel();
    with_timeout(run_tool(
        &engine,
        "batch",
        &tool,
        &EngineSection::default(),
        &CancellationToken::new(),
        Some(tx),
    ))
    .await?;

    let events = drain(rx);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.unit == ProgressUnit::Items));
    assert_eq!(events[2].fraction, 1.0);
    Ok(())
}

#[tokio::test]
async fn tool_without_profile_sends_nothing() -> TestResult {
    init_tracing();
    let (engine, _registry) = isolated_engine();
    let tool = ToolConfigBuilder::shell("echo 'Duration: 00:00:10.00,'; echo 'time=00:00:05.00'").build();

    let (tx, rx) = mpsc::unbounded_channel();
    with_timeout(run_tool(
        &engine,
        "plain",
        &tool,
        &EngineSection::default(),
        &CancellationToken::new(),
        Some(tx),
    ))
    .await?;

    assert!(drain(rx).is_empty());
    Ok(())
}

#[tokio::test]
async fn timeout_kills_the_tool() -> TestResult {
    init_tracing();
    let (engine, registry) = isolated_engine();
    let tool = ToolConfigBuilder::shell("sleep 30").timeout("200ms").build();

    let started = Instant::now();
    let err = with_timeout(run_tool(
        &engine,
        "sleepy",
        &tool,
        &EngineSection::default(),
        &CancellationToken::new(),
        None,
    ))
    .await
    .expect_err("timeout must fail the run");

    match err {
        ToolrunError::TimedOut { program, after } => {
            assert_eq!(program, "sleepy");
            assert_eq!(after, Duration::from_millis(200));
        }
        other => panic!("expected TimedOut, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn engine_timeout_applies_when_tool_has_none() -> TestResult {
    init_tracing();
    let (engine, _registry) = isolated_engine();
    let tool = ToolConfigBuilder::shell("sleep 30").build();
    let engine_cfg = EngineSection {
        working_dir: None,
        timeout: Some("150ms".to_string()),
    };

    let err = with_timeout(run_tool(
        &engine,
        "sleepy",
        &tool,
        &engine_cfg,
        &CancellationToken::new(),
        None,
    ))
    .await
    .expect_err("engine timeout must apply");
    assert!(matches!(err, ToolrunError::TimedOut { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn caller_cancel_is_not_a_timeout() -> TestResult {
    init_tracing();
    let (engine, _registry) = isolated_engine();
    let tool = ToolConfigBuilder::shell("sleep 30").timeout("10s").build();

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let err = with_timeout(run_tool(
        &engine,
        "sleepy",
        &tool,
        &EngineSection::default(),
        &cancel,
        None,
    ))
    .await
    .expect_err("cancel must fail the run");
    canceller.await?;

    assert!(err.is_canceled(), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn require_success_turns_exit_code_into_error() -> TestResult {
    init_tracing();
    let (engine, _registry) = isolated_engine();

    let lenient = ToolConfigBuilder::shell("echo oops >&2; exit 4").build();
    let result = with_timeout(run_tool(
        &engine,
        "lenient",
        &lenient,
        &EngineSection::default(),
        &CancellationToken::new(),
        None,
    ))
    .await?;
    assert_eq!(result.exit_code(), 4);

    let strict = ToolConfigBuilder::shell("echo oops >&2; exit 4")
        .require_success(true)
        .build();
    let err = with_timeout(run_tool(
        &engine,
        "strict",
        &strict,
        &EngineSection::default(),
        &CancellationToken::new(),
        None,
    ))
    .await
    .expect_err("nonzero exit must fail");

    match err {
        ToolrunError::NonZeroExit {
            program,
            code,
            stderr,
        } => {
            assert_eq!(program, "strict");
            assert_eq!(code, 4);
            assert_eq!(stderr, "oops");
        }
        other => panic!("expected NonZeroExit, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn tool_working_dir_is_honoured() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let expected = dir.path().canonicalize()?;
    let (engine, _registry) = isolated_engine();

    let tool = ToolConfigBuilder::shell("pwd -P").working_dir(dir.path()).build();
    let result = with_timeout(run_tool(
        &engine,
        "where",
        &tool,
        &EngineSection::default(),
        &CancellationToken::new(),
        None,
    ))
    .await?;

    assert_eq!(result.stdout().trim_end(), expected.to_string_lossy());
    Ok(())
}
