use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::error::ExecError;
use super::events::{ExecEvent, ExecStatus};
use super::files::capture_files_from_dir;
use super::outputs::read_outputs;
use super::registry::Executable;
use super::script::{RunScratch, ScriptSetup};
use super::{FILES_DIR_ENV, OUTPUT_FILE_ENV};
use crate::session::{
    capture_environment, filter_captured_env, parse_env_pairs, SessionExecContext,
    SessionManager,
};
use crate::util::build_file_tree;

/// Wall-clock limit for a single run unless configured otherwise
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(300);

const LINE_QUEUE_CAPACITY: usize = 100;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long to keep reading output after the child exits. Background
/// processes that inherited the pipes would otherwise hold the run open.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// One script invocation
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub script: String,
    /// Explicit interpreter; otherwise detected from the shebang
    pub language: Option<String>,
    /// Applied over the session env for this run only
    pub env_overrides: HashMap<String, String>,
    /// Copy files written to `$RUNBOOK_FILES` into `output_dir`
    pub capture_files: bool,
    pub output_dir: Option<PathBuf>,
    /// Session snapshot taken at invocation time
    pub session: Option<SessionExecContext>,
}

impl ExecRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    /// Request for a registered executable with template values applied.
    pub fn from_executable(executable: &Executable, values: &HashMap<String, String>) -> Self {
        Self {
            script: executable.render(values),
            language: executable.language.clone(),
            ..Default::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_session(mut self, session: SessionExecContext) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_env_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.env_overrides = overrides;
        self
    }

    pub fn with_file_capture(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.capture_files = true;
        self.output_dir = Some(output_dir.into());
        self
    }

    fn validate(&self) -> Result<(), ExecError> {
        if self.script.trim().is_empty() {
            return Err(ExecError::Validation("script is empty".into()));
        }
        if self.capture_files && self.output_dir.is_none() {
            return Err(ExecError::Validation(
                "file capture requested without an output directory".into(),
            ));
        }
        Ok(())
    }
}

/// Everything a run owns. Dropping it removes all temp files.
struct PreparedRun {
    request: ExecRequest,
    setup: ScriptSetup,
    scratch: RunScratch,
}

enum Exit {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
}

/// Runs scripts and reports their progress as [`ExecEvent`]s.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    sessions: Arc<SessionManager>,
    timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            timeout: DEFAULT_EXEC_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Validate the request, write the script, and start running it in the
    /// background. Events arrive on the returned receiver and always end
    /// with [`ExecEvent::Done`].
    pub fn execute(&self, request: ExecRequest) -> Result<mpsc::Receiver<ExecEvent>, ExecError> {
        request.validate()?;

        let setup = ScriptSetup::prepare(&request.script, request.language.as_deref())?;
        let scratch = RunScratch::create(request.capture_files)?;
        let run = PreparedRun {
            request,
            setup,
            scratch,
        };

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.drive(run, tx).await;
        });

        Ok(rx)
    }

    /// Run to completion and collect every event.
    pub async fn run_to_completion(&self, request: ExecRequest) -> Result<Vec<ExecEvent>, ExecError> {
        let mut rx = self.execute(request)?;
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        Ok(events)
    }

    async fn drive(&self, run: PreparedRun, tx: mpsc::Sender<ExecEvent>) {
        let mut command = self.build_command(&run);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(source) => {
                let (program, _) = run.setup.command_line();
                let err = ExecError::Spawn {
                    interpreter: program.display().to_string(),
                    source,
                };
                tracing::error!(error = %err, "Failed to start script");
                emit(&tx, ExecEvent::Error {
                    message: err.to_string(),
                })
                .await;
                emit(&tx, ExecEvent::Done).await;
                return;
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            (stdout, _) => {
                let stream = if stdout.is_none() { "stdout" } else { "stderr" };
                let _ = child.start_kill();
                emit(&tx, ExecEvent::Error {
                    message: ExecError::PipeUnavailable(stream).to_string(),
                })
                .await;
                emit(&tx, ExecEvent::Done).await;
                return;
            }
        };

        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_QUEUE_CAPACITY);
        let stdout_task = tokio::spawn(forward_lines(stdout, line_tx.clone()));
        let stderr_task = tokio::spawn(forward_lines(stderr, line_tx));

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let exit = loop {
            tokio::select! {
                Some(line) = line_rx.recv() => {
                    emit(&tx, ExecEvent::log(line)).await;
                }
                status = child.wait() => break Exit::Exited(status),
                _ = &mut deadline => {
                    if let Err(e) = child.start_kill() {
                        tracing::warn!(error = %e, "Failed to kill timed out script");
                    }
                    let _ = child.wait().await;
                    break Exit::TimedOut;
                }
            }
        };

        let drain = async {
            while let Some(line) = line_rx.recv().await {
                emit(&tx, ExecEvent::log(line)).await;
            }
        };
        if tokio::time::timeout(DRAIN_GRACE, drain).await.is_err() {
            tracing::debug!("Script output still open after exit; dropping remainder");
        }
        stdout_task.abort();
        stderr_task.abort();

        let (exit_code, status) = match exit {
            Exit::TimedOut => {
                emit(
                    &tx,
                    ExecEvent::log(format!(
                        "Script execution timed out after {}",
                        describe_duration(self.timeout)
                    )),
                )
                .await;
                (-1, ExecStatus::Fail)
            }
            Exit::Exited(Ok(status)) => {
                // Killed by a signal reports no code
                let code = status.code().unwrap_or(1);
                (code, ExecStatus::from_exit_code(code))
            }
            Exit::Exited(Err(e)) => {
                tracing::warn!(error = %e, "Failed to wait for script");
                (1, ExecStatus::Fail)
            }
        };

        tracing::info!(exit_code, status = %status, "Script finished");
        emit(&tx, ExecEvent::Status { status, exit_code }).await;

        if status.is_ok() {
            self.finish_successful_run(&run, &tx).await;
        }

        emit(&tx, ExecEvent::Done).await;
    }

    async fn finish_successful_run(&self, run: &PreparedRun, tx: &mpsc::Sender<ExecEvent>) {
        match read_outputs(&run.scratch.outputs) {
            Ok(outputs) if !outputs.is_empty() => {
                emit(tx, ExecEvent::Outputs { outputs }).await;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to read block outputs"),
        }

        if let Err(message) = self.persist_environment(run) {
            emit(
                tx,
                ExecEvent::log(format!(
                    "Warning: could not persist environment changes: {}",
                    message
                )),
            )
            .await;
        }

        if let (Some(files_dir), Some(output_dir)) =
            (run.scratch.files_dir.as_ref(), run.request.output_dir.as_ref())
        {
            match capture_files_from_dir(files_dir.path(), output_dir) {
                Ok(files) if !files.is_empty() => {
                    let file_tree = build_file_tree(output_dir).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "Failed to list output directory");
                        Vec::new()
                    });
                    emit(
                        tx,
                        ExecEvent::FilesCaptured {
                            count: files.len(),
                            files,
                            file_tree,
                        },
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => {
                    emit(
                        tx,
                        ExecEvent::log(format!("Warning: Failed to capture files: {}", e)),
                    )
                    .await;
                }
            }
        }
    }

    /// Feed the captured environment back into the session.
    fn persist_environment(&self, run: &PreparedRun) -> Result<(), String> {
        let (Some(capture), Some(ctx)) = (run.setup.capture(), run.request.session.as_ref())
        else {
            return Ok(());
        };

        let captured = capture.parse();
        let Some(env) = captured.env else {
            tracing::debug!("No environment captured");
            return Ok(());
        };

        let scratch_dir = run.scratch.files_dir.as_ref().map(|d| d.path());
        let work_dir = next_work_dir(&captured.pwd, &ctx.work_dir, scratch_dir);
        let env = strip_overrides(
            filter_captured_env(env),
            &run.request.env_overrides,
            &parse_env_pairs(&ctx.env),
        );

        self.sessions
            .update_session_env(env, work_dir)
            .map_err(|e| e.to_string())
    }

    fn build_command(&self, run: &PreparedRun) -> Command {
        let (program, args) = run.setup.command_line();
        let request = &run.request;

        let mut env = match request.session.as_ref() {
            Some(ctx) => parse_env_pairs(&ctx.env),
            None => capture_environment(),
        };
        if !env.contains_key("PATH") {
            if let Ok(path) = std::env::var("PATH") {
                env.insert("PATH".to_string(), path);
            }
        }
        env.extend(
            request
                .env_overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env.insert(
            OUTPUT_FILE_ENV.to_string(),
            run.scratch.outputs.to_string_lossy().into_owned(),
        );

        let mut command = Command::new(&program);
        command
            .args(&args)
            .arg(run.setup.script_path())
            .env_clear()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(files_dir) = run.scratch.files_dir.as_ref() {
            env.insert(
                FILES_DIR_ENV.to_string(),
                files_dir.path().to_string_lossy().into_owned(),
            );
            command.current_dir(files_dir.path());
        } else if let Some(ctx) = request.session.as_ref() {
            command.current_dir(&ctx.work_dir);
        }
        command.envs(env);

        tracing::info!(
            interpreter = %program.display(),
            wrapped = run.setup.capture().is_some(),
            capture_files = request.capture_files,
            "Starting script"
        );

        command
    }
}

/// Working directory to persist after a run. A pwd inside the run's scratch
/// directory is discarded since the directory is deleted afterwards.
fn next_work_dir(captured_pwd: &str, current: &Path, scratch_dir: Option<&Path>) -> PathBuf {
    if captured_pwd.is_empty() {
        return current.to_path_buf();
    }
    let pwd = PathBuf::from(captured_pwd);
    if let Some(scratch) = scratch_dir {
        let canonical = std::fs::canonicalize(scratch).unwrap_or_else(|_| scratch.to_path_buf());
        if pwd.starts_with(scratch) || pwd.starts_with(&canonical) {
            return current.to_path_buf();
        }
    }
    pwd
}

/// Undo per-run overrides the script left untouched so they do not leak
/// into the session. Values the script changed itself are kept.
fn strip_overrides(
    mut captured: HashMap<String, String>,
    overrides: &HashMap<String, String>,
    session_env: &HashMap<String, String>,
) -> HashMap<String, String> {
    for (key, value) in overrides {
        if captured.get(key) != Some(value) {
            continue;
        }
        match session_env.get(key) {
            Some(previous) => {
                captured.insert(key.clone(), previous.clone());
            }
            None => {
                captured.remove(key);
            }
        }
    }
    captured
}

/// Forward each output line to `tx`. Bytes that are not valid UTF-8 are
/// replaced rather than ending the read, so the pipe keeps draining.
async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(decode_line(&buf)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading script output");
                break;
            }
        }
    }
}

/// Lossy UTF-8 decode without the trailing `\n` or `\r\n`.
fn decode_line(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

async fn emit(tx: &mpsc::Sender<ExecEvent>, event: ExecEvent) {
    // The run carries on if the listener went away so session state still
    // gets updated.
    let _ = tx.send(event).await;
}

/// "5 minutes", "1 minute", "30 seconds"
fn describe_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (n, unit) = if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if n == 1 {
        format!("{} {}", n, unit)
    } else {
        format!("{} {}s", n, unit)
    }
}
