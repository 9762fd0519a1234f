use std::{path::PathBuf, process::Stdio, sync::Arc};

use shipyard_core::ExecutionContext;
use shipyard_logbus::LogWriter;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

use crate::{
    error::ExecError,
    util::{TERM_TIMEOUT, kill_graceful},
};

const CHUNK: usize = 8 * 1024;

/// One program invocation.
#[derive(Clone, Debug)]
pub struct ProcConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
    /// Return an error if the exit code is not zero.
    pub fail_on_non_zero: bool,
    /// Keep a copy of stdout in [`ProcOutput::stdout`].
    pub capture_stdout: bool,
    /// Echo `$ program args` to the stdout stream before spawning.
    pub echo: bool,
}

impl Default for ProcConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            fail_on_non_zero: true,
            capture_stdout: false,
            echo: true,
        }
    }
}

impl ProcConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// `sh -c <script>`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.fail_on_non_zero = false;
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// Do not echo the command line, e.g. when arguments carry credentials.
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Program and arguments as one display string.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcOutput {
    /// `None` when the process ended by a signal.
    pub code: Option<i32>,
    /// Captured stdout, empty unless [`ProcConfig::capture_stdout`] was set.
    pub stdout: Vec<u8>,
}

impl ProcOutput {
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).trim().to_string()
    }
}

/// Run `cfg` to completion under `ctx`.
///
/// stdout/stderr go to the context's writers when present, otherwise to the worker's own
/// stdio. If the context ends first the process group is terminated and the call returns
/// [`ExecError::Interrupted`].
pub async fn run(ctx: &ExecutionContext, cfg: &ProcConfig) -> Result<ProcOutput, ExecError> {
    if cfg.program.trim().is_empty() {
        return Err(ExecError::MissingProgram);
    }
    ctx.ensure_active()?;

    let mut cmd = Command::new(&cfg.program);
    cmd.args(&cfg.args).stdin(Stdio::null()).kill_on_drop(true);
    if let Some(cwd) = &cfg.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &cfg.env {
        cmd.env(k, v);
    }
    #[cfg(target_family = "unix")]
    cmd.process_group(0);

    let out_writer = ctx.stdout().cloned();
    let err_writer = ctx.stderr().cloned();
    cmd.stdout(if out_writer.is_some() || cfg.capture_stdout {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });
    cmd.stderr(if err_writer.is_some() {
        Stdio::piped()
    } else {
        Stdio::inherit()
    });

    trace!(target: "shipyard.exec", program = %cfg.program, args = ?cfg.args, "spawn");
    if cfg.echo {
        ctx.log_stdout(&format!("$ {}", cfg.display())).await;
    }

    let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: cfg.program.clone(),
        source,
    })?;

    let out_pump = child
        .stdout
        .take()
        .map(|r| spawn_pump(r, out_writer.clone(), cfg.capture_stdout));
    let err_pump = child
        .stderr
        .take()
        .map(|r| spawn_pump(r, err_writer.clone(), false));

    let status = tokio::select! {
        status = child.wait() => status?,
        _ = ctx.cancelled() => {
            return Err(interrupt(ctx, &mut child, cfg, [out_pump, err_pump]).await);
        }
        _ = tokio::time::sleep_until(ctx.deadline()) => {
            return Err(interrupt(ctx, &mut child, cfg, [out_pump, err_pump]).await);
        }
    };

    let stdout = match out_pump {
        Some(pump) => join_pump(ctx, pump).await?,
        None => Vec::new(),
    };
    if let Some(pump) = err_pump {
        join_pump(ctx, pump).await?;
    }
    for writer in [&out_writer, &err_writer].into_iter().flatten() {
        if let Err(e) = writer.flush().await {
            warn!(target: "shipyard.exec", error = %e, "failed to flush process output");
        }
    }

    let output = ProcOutput {
        code: status.code(),
        stdout,
    };
    if cfg.fail_on_non_zero && !status.success() {
        return Err(match status.code() {
            Some(code) => ExecError::NonZeroExit {
                program: cfg.program.clone(),
                code,
            },
            None => ExecError::KilledBySignal {
                program: cfg.program.clone(),
            },
        });
    }
    debug!(target: "shipyard.exec", program = %cfg.program, code = ?output.code, "exit");
    Ok(output)
}

async fn interrupt(
    ctx: &ExecutionContext,
    child: &mut tokio::process::Child,
    cfg: &ProcConfig,
    pumps: [Option<JoinHandle<std::io::Result<Vec<u8>>>>; 2],
) -> ExecError {
    debug!(target: "shipyard.exec", program = %cfg.program, "context ended, terminating process");
    if let Err(e) = kill_graceful(child, TERM_TIMEOUT.min(ctx_grace(ctx))).await {
        warn!(target: "shipyard.exec", error = %e, "failed to kill process");
    }
    for pump in pumps.into_iter().flatten() {
        pump.abort();
    }
    let reason = if ctx.is_expired() {
        shipyard_core::ContextError::DeadlineExceeded
    } else {
        shipyard_core::ContextError::Cancelled
    };
    ExecError::Interrupted(reason)
}

/// TERM wait: the remaining budget, but at least 500 ms.
fn ctx_grace(ctx: &ExecutionContext) -> std::time::Duration {
    ctx.remaining().max(std::time::Duration::from_millis(500))
}

fn spawn_pump<R>(
    reader: R,
    writer: Option<Arc<LogWriter>>,
    capture: bool,
) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(pump(reader, writer, capture))
}

async fn pump<R>(
    mut reader: R,
    writer: Option<Arc<LogWriter>>,
    capture: bool,
) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; CHUNK];
    let mut captured = Vec::new();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        if let Some(w) = &writer {
            w.write(&buf[..n]).await;
        }
        if capture {
            captured.extend_from_slice(&buf[..n]);
        }
    }
    Ok(captured)
}

async fn join_pump(
    ctx: &ExecutionContext,
    pump: JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, ExecError> {
    let abort = pump.abort_handle();
    match ctx.guard(pump).await {
        Ok(Ok(res)) => Ok(res?),
        Ok(Err(join)) => Err(ExecError::Io(std::io::Error::other(join))),
        Err(e) => {
            abort.abort();
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use shipyard_core::ContextError;
    use shipyard_logbus::MemoryBus;
    use shipyard_model::{LogStream, TaskIds};

    use super::*;

    fn ctx(timeout: Duration) -> (ExecutionContext, Arc<MemoryBus>) {
        let bus = Arc::new(MemoryBus::new());
        let ids = TaskIds::new("d", "j", "s", "o");
        let out = Arc::new(LogWriter::new(bus.clone(), ids.clone(), LogStream::Stdout));
        let err = Arc::new(LogWriter::new(bus.clone(), ids, LogStream::Stderr));
        (ExecutionContext::new(timeout).with_writers(out, err), bus)
    }

    fn lines(bus: &MemoryBus, stream: LogStream) -> Vec<String> {
        bus.logs()
            .into_iter()
            .filter(|e| e.stream == stream)
            .map(|e| e.message)
            .collect()
    }

    #[tokio::test]
    async fn streams_both_outputs_into_writers() {
        let (ctx, bus) = ctx(Duration::from_secs(30));
        let cfg = ProcConfig::shell("echo hello; echo oops >&2; printf tail");
        let out = run(&ctx, &cfg).await.unwrap();

        assert_eq!(out.code, Some(0));
        assert_eq!(
            lines(&bus, LogStream::Stdout),
            ["$ sh -c echo hello; echo oops >&2; printf tail\n", "hello\n", "tail"]
        );
        assert_eq!(lines(&bus, LogStream::Stderr), ["oops\n"]);
    }

    #[tokio::test]
    async fn quiet_skips_the_command_echo() {
        let (ctx, bus) = ctx(Duration::from_secs(30));
        run(&ctx, &ProcConfig::new("echo").arg("secret").quiet()).await.unwrap();
        assert_eq!(lines(&bus, LogStream::Stdout), ["secret\n"]);
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let (ctx, _bus) = ctx(Duration::from_secs(30));
        let err = run(&ctx, &ProcConfig::shell("exit 3")).await.unwrap_err();
        assert!(matches!(err, ExecError::NonZeroExit { code: 3, .. }));

        let out = run(&ctx, &ProcConfig::shell("exit 3").allow_failure())
            .await
            .unwrap();
        assert_eq!(out.code, Some(3));
    }

    #[tokio::test]
    async fn capture_keeps_stdout() {
        let (ctx, bus) = ctx(Duration::from_secs(30));
        let cfg = ProcConfig::new("echo").arg("abc123").capture();
        let out = run(&ctx, &cfg).await.unwrap();
        assert_eq!(out.stdout_str(), "abc123");
        assert!(lines(&bus, LogStream::Stdout).contains(&"abc123\n".to_string()));
    }

    #[tokio::test]
    async fn env_and_cwd_are_applied() {
        let (ctx, _bus) = ctx(Duration::from_secs(30));
        let dir = std::env::temp_dir();
        let cfg = ProcConfig::shell("printf \"$GREETING:$(pwd)\"")
            .env("GREETING", "hi")
            .cwd(&dir)
            .capture();
        let out = run(&ctx, &cfg).await.unwrap();
        assert!(out.stdout_str().starts_with("hi:/"));
    }

    #[tokio::test]
    async fn cancellation_terminates_the_process() {
        let (ctx, _bus) = ctx(Duration::from_secs(30));
        let c = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            c.cancel();
        });

        let started = std::time::Instant::now();
        let err = run(&ctx, &ProcConfig::shell("sleep 30; echo late")).await.unwrap_err();
        assert!(matches!(err, ExecError::Interrupted(ContextError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn deadline_terminates_the_process() {
        let (ctx, _bus) = ctx(Duration::from_millis(200));
        let err = run(&ctx, &ProcConfig::new("sleep").arg("30")).await.unwrap_err();
        assert!(matches!(
            err,
            ExecError::Interrupted(ContextError::DeadlineExceeded)
        ));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let (ctx, _bus) = ctx(Duration::from_secs(30));
        let err = run(&ctx, &ProcConfig::new("definitely-not-a-real-binary-4711"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(matches!(
            run(&ctx, &ProcConfig::default()).await.unwrap_err(),
            ExecError::MissingProgram
        ));
    }

    #[tokio::test]
    async fn expired_context_never_spawns() {
        let (ctx, bus) = ctx(Duration::from_secs(30));
        ctx.cancel();
        let err = run(&ctx, &ProcConfig::new("true")).await.unwrap_err();
        assert!(matches!(err, ExecError::Interrupted(ContextError::Cancelled)));
        assert!(bus.logs().is_empty());
    }
}
