use async_trait::async_trait;
use scriptrunner_core::config::{ENV_INTERPRETER, ENV_TIMEOUT_SECS};
use scriptrunner_core::runtime::{
    offset_for, parse_diagnostic, position_for, CompilerLineGrammar, DiagnosticGrammar,
    DiagnosticLocation,
};
use scriptrunner_core::{
    ConfigError, CursorRequest, ExecutionResult, LaunchError, RunController, RunFailure,
    RunState, RunStateMachine, RunnerConfig, ScriptBuffer,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

type Outcome = Result<ExecutionResult, LaunchError>;

/// Executor whose runs block until `release` is notified (when gated).
struct FakeExecutor {
    gated: bool,
    release: Arc<Notify>,
    calls: AtomicUsize,
    outcome: Box<dyn Fn(&str) -> Outcome + Send + Sync>,
}

impl FakeExecutor {
    fn immediate(outcome: impl Fn(&str) -> Outcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            gated: false,
            release: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
            outcome: Box::new(outcome),
        })
    }

    fn gated(outcome: impl Fn(&str) -> Outcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            gated: true,
            release: Arc::new(Notify::new()),
            calls: AtomicUsize::new(0),
            outcome: Box::new(outcome),
        })
    }
}

#[async_trait]
impl scriptrunner_script::ScriptExecutor for FakeExecutor {
    async fn execute(&self, script: &str) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.release.notified().await;
        }
        (self.outcome)(script)
    }
}

fn echo_success(script: &str) -> Outcome {
    Ok(ExecutionResult::Success {
        output: format!("{script}\n"),
        exit_code: 0,
    })
}

fn kts_grammar() -> Arc<dyn DiagnosticGrammar> {
    Arc::new(CompilerLineGrammar::kotlin_script().clone())
}

const KOTLIN_DIAG: &str = "/tmp/temp_script1234.kts:7:3: error: unresolved reference: foo";

// ============================================================================
// Offset Mapper Tests
// ============================================================================

#[test]
fn test_offset_matches_walking_line_breaks() {
    let text = "val a = 1\nval b = 2\n\nprintln(a + b)";
    let chars: Vec<char> = text.chars().collect();

    let (mut line, mut column) = (1, 1);
    for (idx, ch) in chars.iter().enumerate() {
        assert_eq!(offset_for(text, line, column), idx, "at {line}:{column}");
        if *ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
}

#[test]
fn test_offset_clamps_past_end() {
    let text = "one\ntwo";
    assert_eq!(offset_for(text, 99, 1), text.len());
    assert_eq!(offset_for(text, 2, 99), text.len());
    assert_eq!(offset_for(text, usize::MAX, usize::MAX), text.len());
}

#[test]
fn test_offset_clamps_zero_to_start() {
    assert_eq!(offset_for("abc", 0, 0), 0);
    assert_eq!(offset_for("abc", 1, 0), 0);
    assert_eq!(offset_for("", 5, 5), 0);
}

#[test]
fn test_offset_column_overrun_spills_into_next_line() {
    assert_eq!(offset_for("ab\ncd", 1, 5), 4);
}

#[test]
fn test_position_for_past_end() {
    assert_eq!(position_for("ab\nc", 100), (2, 2));
}

// ============================================================================
// Diagnostic Parser Tests
// ============================================================================

#[test]
fn test_parse_reference_diagnostic() {
    let loc = parse_diagnostic(KOTLIN_DIAG).unwrap();
    assert_eq!(
        loc,
        DiagnosticLocation {
            line: 7,
            column: 3,
            message: "unresolved reference: foo".to_string(),
        }
    );
    assert_eq!(loc.label(), "script:7:3: error: unresolved reference: foo");
    assert!(!loc.label().contains("temp_script"));
}

#[test]
fn test_parse_no_match() {
    assert!(parse_diagnostic("Segmentation fault").is_none());
    assert!(parse_diagnostic("").is_none());
    assert!(parse_diagnostic("/tmp/a.kts:1:2: warning: unused").is_none());
    assert!(parse_diagnostic("/tmp/a.py:1:2: error: nope").is_none());
}

#[test]
fn test_parse_first_match_only() {
    let text = "compiling...\n/tmp/x.kts:2:9: error: first\n/tmp/x.kts:5:1: error: second\n";
    let loc = parse_diagnostic(text).unwrap();
    assert_eq!((loc.line, loc.column), (2, 9));
    assert_eq!(loc.message, "first");
}

#[test]
fn test_parse_message_is_single_line() {
    let text = "/tmp/x.kts:1:1: error: expecting '}'\n    at line 1\n";
    assert_eq!(parse_diagnostic(text).unwrap().message, "expecting '}'");
}

#[test]
fn test_parse_rejects_zero_positions() {
    assert!(parse_diagnostic("/tmp/x.kts:0:3: error: bad").is_none());
    assert!(parse_diagnostic("/tmp/x.kts:3:0: error: bad").is_none());
    assert!(parse_diagnostic("/tmp/x.kts:99999999999999999999999:1: error: bad").is_none());
}

#[test]
fn test_custom_extension_grammar() {
    let grammar = CompilerLineGrammar::new("main.kts").unwrap();
    let loc = grammar
        .parse("/w/build.main.kts:4:2: error: unresolved reference")
        .unwrap();
    assert_eq!(loc.line, 4);
    assert!(grammar.parse(KOTLIN_DIAG).is_none());
}

// ============================================================================
// Run State Machine Tests
// ============================================================================

fn failure(output: &str, exit_code: i32) -> Outcome {
    Ok(ExecutionResult::Failure {
        output: output.to_string(),
        exit_code,
    })
}

#[test]
fn test_machine_starts_idle() {
    let machine = RunStateMachine::default();
    assert_eq!(machine.state(), &RunState::Idle);
    assert!(machine.state().can_run());
    assert!(machine.snapshot().is_none());
}

#[test]
fn test_run_while_running_is_noop() {
    let mut machine = RunStateMachine::default();
    let first = machine.begin_run(Arc::from("println(1)")).unwrap();
    assert!(machine.state().is_running());

    assert!(machine.begin_run(Arc::from("println(2)")).is_none());
    assert!(machine.state().is_running());
    assert_eq!(machine.current_run(), Some(first));
    assert_eq!(machine.snapshot().map(|s| &**s), Some("println(1)"));
}

#[test]
fn test_success_transition() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    assert!(machine.complete(id, echo_success("hello")));
    assert_eq!(
        machine.state(),
        &RunState::Succeeded {
            output: "hello\n".to_string(),
            exit_code: 0,
        }
    );
    assert!(machine.state().can_run());
    assert!(machine.current_run().is_none());
}

#[test]
fn test_failure_with_diagnostic() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(id, failure(KOTLIN_DIAG, 1));

    let RunState::Failed(fail) = machine.state() else {
        panic!("expected Failed, got {:?}", machine.state());
    };
    assert_eq!(fail.exit_code(), Some(1));
    assert_eq!(fail.message(), KOTLIN_DIAG);
    assert_eq!(fail.location().unwrap().line, 7);
    assert!(!fail.is_launch_failure());
}

#[test]
fn test_failure_without_diagnostic_keeps_raw_text() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(id, failure("Segmentation fault", 139));

    let RunState::Failed(fail) = machine.state().clone() else {
        panic!("expected Failed");
    };
    assert!(fail.location().is_none());
    assert_eq!(fail.message(), "Segmentation fault");
    assert!(!machine.activate_diagnostic());
    assert!(machine.take_cursor_request().is_none());
}

#[test]
fn test_launch_error_is_distinct() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    let err = LaunchError::TempFile(std::io::Error::other("disk full"));
    machine.complete(id, Err(err));

    let RunState::Failed(fail) = machine.state() else {
        panic!("expected Failed");
    };
    assert!(matches!(fail, RunFailure::Launch { .. }));
    assert!(fail.is_launch_failure());
    assert!(fail.exit_code().is_none());
    assert!(fail.message().contains("disk full"));
}

#[test]
fn test_timeout_maps_to_timed_out() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(
        id,
        Err(LaunchError::TimedOut {
            after: Duration::from_secs(5),
        }),
    );

    let RunState::Failed(fail) = machine.state() else {
        panic!("expected Failed");
    };
    assert_eq!(
        fail,
        &RunFailure::TimedOut {
            after: Duration::from_secs(5)
        }
    );
    assert!(fail.message().contains("5s"));
}

#[test]
fn test_activate_diagnostic_emits_once() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(id, failure(KOTLIN_DIAG, 1));
    let before = machine.state().clone();

    assert!(machine.activate_diagnostic());
    assert_eq!(machine.state(), &before);

    assert_eq!(
        machine.take_cursor_request(),
        Some(CursorRequest { line: 7, column: 3 })
    );
    assert_eq!(machine.take_cursor_request(), None);

    // Activating again queues a fresh request.
    assert!(machine.activate_diagnostic());
    assert!(machine.take_cursor_request().is_some());
    assert!(machine.take_cursor_request().is_none());
}

#[test]
fn test_activate_diagnostic_outside_failed() {
    let mut machine = RunStateMachine::default();
    assert!(!machine.activate_diagnostic());

    let id = machine.begin_run(Arc::from("x")).unwrap();
    assert!(!machine.activate_diagnostic());

    machine.complete(id, echo_success("ok"));
    assert!(!machine.activate_diagnostic());
    assert!(machine.take_cursor_request().is_none());
}

#[test]
fn test_stale_result_is_dropped() {
    let mut machine = RunStateMachine::default();
    let first = machine.begin_run(Arc::from("x")).unwrap();
    machine.reset();
    let second = machine.begin_run(Arc::from("y")).unwrap();

    assert!(!machine.complete(first, echo_success("late")));
    assert!(machine.state().is_running());
    assert!(machine.complete(second, echo_success("y")));
    assert!(!machine.complete(second, echo_success("twice")));
}

#[test]
fn test_reset_clears_everything() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(id, failure(KOTLIN_DIAG, 1));
    machine.activate_diagnostic();

    machine.reset();
    assert_eq!(machine.state(), &RunState::Idle);
    assert!(machine.snapshot().is_none());
    assert!(machine.take_cursor_request().is_none());
}

#[test]
fn test_new_run_clears_pending_cursor() {
    let mut machine = RunStateMachine::default();
    let id = machine.begin_run(Arc::from("x")).unwrap();
    machine.complete(id, failure(KOTLIN_DIAG, 1));
    machine.activate_diagnostic();

    machine.begin_run(Arc::from("x")).unwrap();
    assert!(machine.take_cursor_request().is_none());
}

#[test]
fn test_run_state_labels() {
    assert_eq!(RunState::Idle.label(), "idle");
    assert_eq!(RunState::Running.label(), "running");
    assert!(!RunState::Running.can_run());
}

// ============================================================================
// ScriptBuffer Tests
// ============================================================================

#[test]
fn test_buffer_cursor_request_clamps() {
    let mut buffer = ScriptBuffer::from_text("fun main() {\n    boom()\n}");
    assert_eq!(buffer.apply_cursor_request(CursorRequest { line: 2, column: 5 }), 17);
    assert_eq!(buffer.caret_position(), (2, 5));
    assert_eq!(buffer.caret_line(), "    boom()");

    let end = buffer.apply_cursor_request(CursorRequest { line: 40, column: 1 });
    assert_eq!(end, buffer.char_len());
}

#[test]
fn test_buffer_edits() {
    let mut buffer = ScriptBuffer::new();
    assert!(buffer.is_empty());
    buffer.push_line("val a = 1");
    buffer.push_line("println(a)");
    assert_eq!(buffer.text(), "val a = 1\nprintln(a)\n");

    assert_eq!(buffer.caret(), buffer.char_len());
    assert_eq!(buffer.caret_position(), (3, 1));

    let snap = buffer.snapshot();
    buffer.clear();
    assert_eq!(&*snap, "val a = 1\nprintln(a)\n");
    assert_eq!(buffer.caret(), 0);
}

// ============================================================================
// RunController Tests
// ============================================================================

#[tokio::test]
async fn test_controller_rejects_second_run() {
    let exec = FakeExecutor::gated(echo_success);
    let mut ctl = RunController::new(exec.clone(), kts_grammar());

    assert!(ctl.request_run("first"));
    assert!(!ctl.request_run("second"));
    assert!(ctl.state().is_running());

    exec.release.notify_one();
    let state = ctl.next_completion().await;
    assert_eq!(
        state,
        RunState::Succeeded {
            output: "first\n".to_string(),
            exit_code: 0,
        }
    );
    assert_eq!(exec.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_controller_next_completion_when_idle() {
    let exec = FakeExecutor::immediate(echo_success);
    let mut ctl = RunController::new(exec, kts_grammar());
    assert_eq!(ctl.next_completion().await, RunState::Idle);
}

#[tokio::test]
async fn test_controller_reset_aborts_in_flight_run() {
    let exec = FakeExecutor::gated(echo_success);
    let mut ctl = RunController::new(exec.clone(), kts_grammar());

    assert!(ctl.request_run("slow"));
    tokio::task::yield_now().await;
    ctl.request_reset();
    assert_eq!(ctl.state(), &RunState::Idle);

    exec.release.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(ctl.next_completion().await, RunState::Idle);

    assert!(ctl.request_run("again"));
    exec.release.notify_one();
    assert_eq!(
        ctl.next_completion().await,
        RunState::Succeeded {
            output: "again\n".to_string(),
            exit_code: 0,
        }
    );
}

#[tokio::test]
async fn test_controller_cursor_request_taken_once() {
    let exec = FakeExecutor::immediate(|_| failure(KOTLIN_DIAG, 1));
    let mut ctl = RunController::new(exec, kts_grammar());

    assert!(ctl.request_run("x"));
    assert!(matches!(ctl.next_completion().await, RunState::Failed(_)));

    assert!(ctl.take_cursor_request().is_none());
    assert!(ctl.activate_diagnostic());
    assert_eq!(
        ctl.take_cursor_request(),
        Some(CursorRequest { line: 7, column: 3 })
    );
    assert!(ctl.take_cursor_request().is_none());
}

#[tokio::test]
async fn test_controller_panicking_executor_fails_the_run() {
    let exec = FakeExecutor::immediate(|_| -> Outcome { panic!("executor blew up") });
    let mut ctl = RunController::new(exec, kts_grammar());

    assert!(ctl.request_run("x"));
    let state = tokio::time::timeout(Duration::from_secs(5), ctl.next_completion())
        .await
        .expect("next_completion hung after a panicked run");

    let RunState::Failed(fail) = state else {
        panic!("expected Failed, got {state:?}");
    };
    assert!(fail.is_launch_failure());
    assert!(fail.message().contains("panic"));

    // The controller is usable again.
    assert!(ctl.request_run("y"));
}

#[tokio::test]
async fn test_controller_missing_interpreter_is_launch_failure() {
    let mut config = RunnerConfig::default();
    config.interpreter.program = "scriptrunner-no-such-interpreter".to_string();
    let mut ctl = RunController::from_config(&config).unwrap();

    ctl.request_run("println(1)");
    let RunState::Failed(fail) = ctl.next_completion().await else {
        panic!("expected Failed");
    };
    assert!(fail.is_launch_failure());
    assert!(fail.message().contains("scriptrunner-no-such-interpreter"));
}

#[cfg(unix)]
fn sh_config() -> RunnerConfig {
    let mut config = RunnerConfig::default();
    config.interpreter.program = "sh".to_string();
    config.interpreter.script_args = Vec::new();
    config
}

#[cfg(unix)]
#[tokio::test]
async fn test_controller_hello_round_trip() {
    let mut ctl = RunController::from_config(&sh_config()).unwrap();
    ctl.request_run("echo hello");
    assert_eq!(
        ctl.next_completion().await,
        RunState::Succeeded {
            output: "hello\n".to_string(),
            exit_code: 0,
        }
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_end_to_end_error_to_caret() {
    // The "interpreter" reports an error on line 2, column 5 of its own file.
    let mut buffer = ScriptBuffer::from_text(
        "echo compiling\necho \"$0:2:5: error: boom\" >&2\nexit 1\n",
    );
    let mut ctl = RunController::from_config(&sh_config()).unwrap();

    assert!(ctl.request_run(buffer.snapshot()));
    let RunState::Failed(fail) = ctl.next_completion().await else {
        panic!("expected Failed");
    };
    assert_eq!(fail.exit_code(), Some(1));
    let loc = fail.location().cloned().unwrap();
    assert_eq!(loc.label(), "script:2:5: error: boom");

    assert!(ctl.activate_diagnostic());
    let req = ctl.take_cursor_request().unwrap();
    assert_eq!(req, CursorRequest { line: 2, column: 5 });
    assert_eq!(req.resolve(buffer.text()), 19);

    assert_eq!(buffer.apply_cursor_request(req), 19);
    assert_eq!(buffer.caret_position(), (2, 5));
}

/// Alive and not a zombie, per `/proc`.
#[cfg(target_os = "linux")]
fn process_running(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_reset_kills_interpreter_children() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("child.pid");
    let script = format!("sleep 30 &\necho $! > '{}'\nwait\n", pid_file.display());
    let mut ctl = RunController::from_config(&sh_config()).unwrap();

    assert!(ctl.request_run(script));
    let mut pid = None;
    for _ in 0..100 {
        if let Some(parsed) = std::fs::read_to_string(&pid_file)
            .ok()
            .and_then(|raw| raw.trim().parse::<i32>().ok())
        {
            pid = Some(parsed);
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let pid = pid.expect("script never reported its background pid");
    assert!(process_running(pid));

    ctl.request_reset();
    assert_eq!(ctl.state(), &RunState::Idle);

    let mut gone = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if !process_running(pid) {
            gone = true;
            break;
        }
    }
    assert!(gone, "background sleep {pid} outlived the reset");
}

/// Needs a real Kotlin toolchain on PATH.
#[tokio::test]
#[ignore]
async fn test_end_to_end_kotlinc() {
    let script = "fun main() { error(\"boom\") }\nval x: Int = \"nope\"\n";
    let mut buffer = ScriptBuffer::from_text(script);
    let mut ctl = RunController::from_config(&RunnerConfig::default()).unwrap();

    ctl.request_run(buffer.snapshot());
    let RunState::Failed(fail) = ctl.next_completion().await else {
        panic!("expected Failed");
    };
    assert!(fail.exit_code().unwrap() != 0);
    assert!(ctl.activate_diagnostic());
    let req = ctl.take_cursor_request().unwrap();
    let offset = buffer.apply_cursor_request(req);
    assert!(offset <= buffer.char_len());
}

// ============================================================================
// RunnerConfig Tests
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = RunnerConfig::default();
    assert_eq!(config.interpreter.program, "kotlinc");
    assert!(config.diagnostic_grammar().is_ok());
}

#[test]
fn test_config_env_overrides() {
    let mut config = RunnerConfig::default();
    config
        .apply_env_from(|var| match var {
            ENV_INTERPRETER => Some(" kotlin ".to_string()),
            ENV_TIMEOUT_SECS => Some("30".to_string()),
            _ => None,
        })
        .unwrap();
    assert_eq!(config.interpreter.program, "kotlin");
    assert_eq!(config.interpreter.timeout_secs, Some(30));
}

#[test]
fn test_config_env_ignores_blank_interpreter() {
    let mut config = RunnerConfig::default();
    config
        .apply_env_from(|var| (var == ENV_INTERPRETER).then(|| "  ".to_string()))
        .unwrap();
    assert_eq!(config.interpreter.program, "kotlinc");
}

#[test]
fn test_config_env_bad_timeout() {
    let mut config = RunnerConfig::default();
    let err = config
        .apply_env_from(|var| (var == ENV_TIMEOUT_SECS).then(|| "soon".to_string()))
        .unwrap_err();
    assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
    assert!(err.to_string().contains("soon"));
}

#[test]
fn test_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "interpreter": {{ "program": "kotlin", "extension": "main.kts" }} }}"#
    )
    .unwrap();

    let config = RunnerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.interpreter.program, "kotlin");
    assert_eq!(config.interpreter.extension, "main.kts");
    assert_eq!(config.interpreter.script_args, vec!["-script".to_string()]);
}

#[test]
fn test_config_parse_error_names_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();

    let err = RunnerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains(&file.path().display().to_string()));
}

#[test]
fn test_config_explicit_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = RunnerConfig::load(Some(&dir.path().join("absent.json"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
