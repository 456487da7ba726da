//! Process-backed entry points.
//!
//! [`ProcessResolver`] maps an entry point's module path onto an executable
//! inside the facet directory (`lib.tools.run` resolves to `<base>/lib/tools`
//! and function `run`). [`ProcessEntryPoint`] spawns that executable per call
//! with the facet directory as the child's working directory, writes one
//! JSONL request line, reads one JSONL reply line, and enforces a timeout.
//!
//! Only the child's working directory is changed; the host process keeps its
//! own, so concurrent calls into different facets never observe each other's
//! base directory.

use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::entry::{EntryPoint, EntryPointSpec};
use crate::envelope::{FacetContext, RequestEnvelope, ResponseEnvelope};
use crate::error::{FacetError, ProcessError};
use crate::protocol::{ProcessReply, ProcessRequest};
use crate::resolver::{ModuleResolver, ResolutionScope, ResolveError};

/// Tracing target for process entry point operations.
const PROCESS_TARGET: &str = "polyapi_plugins::process";

/// Raw OS error for "text file busy", raised when exec races a writer.
const ETXTBSY: i32 = 26;

/// Spawn attempts made while the executable is busy.
const SPAWN_ATTEMPTS: u32 = 5;

const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resolves module paths onto executables inside the facet directory.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use std::time::Duration;
///
/// use polyapi_plugins::{PluginCatalog, ProcessResolver};
///
/// let resolver = ProcessResolver::new(Duration::from_secs(30));
/// let catalog = PluginCatalog::load(Path::new("./polys"), &resolver).expect("catalog loads");
/// println!("{} facets", catalog.len());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessResolver {
    timeout: Duration,
}

impl ProcessResolver {
    /// Creates a resolver whose entry points time out after `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the per-call timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ModuleResolver for ProcessResolver {
    fn resolve(
        &self,
        spec: &EntryPointSpec,
        scope: &ResolutionScope<'_>,
    ) -> Result<Arc<dyn EntryPoint>, ResolveError> {
        let executable = spec
            .module_segments()
            .fold(scope.base_dir().to_path_buf(), |path, segment| {
                path.join(segment)
            });
        check_executable(&executable).map_err(|message| ResolveError::UnknownModule {
            module: spec.module().to_owned(),
            message,
        })?;

        debug!(
            target: PROCESS_TARGET,
            facet = scope.facet(),
            executable = %executable.display(),
            function = spec.function(),
            "resolved process entry point"
        );

        // The function is forwarded in the request; the child validates it.
        Ok(Arc::new(ProcessEntryPoint {
            facet: scope.facet().to_owned(),
            spec: spec.clone(),
            executable,
            base_dir: scope.base_dir().to_path_buf(),
            timeout: self.timeout,
        }))
    }
}

fn check_executable(path: &Path) -> Result<(), String> {
    let metadata = std::fs::metadata(path)
        .map_err(|err| format!("no executable at '{}': {err}", path.display()))?;
    if !metadata.is_file() {
        return Err(format!("'{}' is not a regular file", path.display()));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(format!("'{}' is not executable", path.display()));
        }
    }
    Ok(())
}

/// Entry point that runs an executable per call.
#[derive(Debug, Clone)]
pub struct ProcessEntryPoint {
    facet: String,
    spec: EntryPointSpec,
    executable: PathBuf,
    base_dir: PathBuf,
    timeout: Duration,
}

impl ProcessEntryPoint {
    /// Returns the executable path.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Returns the function forwarded to the child.
    #[must_use]
    pub const fn function(&self) -> &str {
        self.spec.function()
    }

    fn run(
        &self,
        envelope: &RequestEnvelope,
        context: &FacetContext,
    ) -> Result<ResponseEnvelope, FacetError> {
        let name = self.facet.as_str();
        let request = ProcessRequest::new(self.spec.function(), envelope, context);
        let request_line =
            serde_json::to_string(&request).map_err(ProcessError::SerializeRequest)?;

        let mut child = self.spawn()?;
        let started = Instant::now();

        let stdin = child.stdin.take().ok_or_else(|| ProcessError::SpawnFailed {
            name: name.to_owned(),
            message: String::from("failed to capture stdin"),
            source: None,
        })?;
        let stdout = child.stdout.take().ok_or_else(|| ProcessError::SpawnFailed {
            name: name.to_owned(),
            message: String::from("failed to capture stdout"),
            source: None,
        })?;
        drain_stderr(name, child.stderr.take());

        let outcome = self
            .exchange(&mut child, stdin, stdout, request_line, started)
            .and_then(|reply| {
                let remaining = self.timeout.saturating_sub(started.elapsed());
                wait_for_exit(name, &mut child, remaining, self.timeout).map(|()| reply)
            });

        if outcome.is_err() {
            drop(child.kill());
            drop(child.wait());
        }

        let line = outcome?;
        let reply: ProcessReply =
            serde_json::from_str(line.trim()).map_err(|err| ProcessError::InvalidOutput {
                name: name.to_owned(),
                message: format!("reply is not a protocol line: {err}"),
            })?;
        reply.into_outcome()
    }

    fn spawn(&self) -> Result<Child, ProcessError> {
        let mut command = Command::new(&self.executable);
        command
            .current_dir(&self.base_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(
            target: PROCESS_TARGET,
            facet = self.facet.as_str(),
            executable = %self.executable.display(),
            "spawning entry point process"
        );

        let mut attempt = 1;
        loop {
            match command.spawn() {
                Ok(child) => return Ok(child),
                Err(err) if err.raw_os_error() == Some(ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                    attempt += 1;
                    thread::sleep(SPAWN_RETRY_DELAY);
                }
                Err(err) => {
                    return Err(ProcessError::SpawnFailed {
                        name: self.facet.clone(),
                        message: err.to_string(),
                        source: Some(Arc::new(err)),
                    });
                }
            }
        }
    }

    /// Writes the request and reads the reply line on a helper thread, so a
    /// child that never drains stdin is still bound by the timeout counted
    /// from `started`.
    fn exchange(
        &self,
        child: &mut Child,
        stdin: ChildStdin,
        stdout: ChildStdout,
        request_line: String,
        started: Instant,
    ) -> Result<String, ProcessError> {
        let name = self.facet.as_str();
        let facet = self.facet.clone();
        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = write_request(&facet, stdin, &request_line)
                .and_then(|()| read_reply_line(&facet, stdout));
            drop(sender.send(result));
        });

        match receiver.recv_timeout(self.timeout.saturating_sub(started.elapsed())) {
            Ok(Ok(line)) if line.trim().is_empty() => Err(ProcessError::InvalidOutput {
                name: name.to_owned(),
                message: String::from("entry point produced no output on stdout"),
            }),
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: PROCESS_TARGET,
                    facet = name,
                    timeout_secs = self.timeout.as_secs(),
                    "entry point timed out, killing process"
                );
                drop(child.kill());
                Err(ProcessError::Timeout {
                    name: name.to_owned(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ProcessError::InvalidOutput {
                name: name.to_owned(),
                message: String::from("stdout reader stopped unexpectedly"),
            }),
        }
    }
}

impl EntryPoint for ProcessEntryPoint {
    fn call(
        &self,
        envelope: &RequestEnvelope,
        context: &FacetContext,
    ) -> Result<ResponseEnvelope, FacetError> {
        self.run(envelope, context)
    }
}

/// Writes the request line and closes stdin.
fn write_request(name: &str, mut stdin: impl Write, line: &str) -> Result<(), ProcessError> {
    let io_error = |err: std::io::Error| ProcessError::Io {
        name: name.to_owned(),
        source: Arc::new(err),
    };
    match stdin
        .write_all(line.as_bytes())
        .and_then(|()| stdin.write_all(b"\n"))
        .and_then(|()| stdin.flush())
    {
        // A child that answers without reading its input closes the pipe early.
        Err(err) if err.kind() == IoErrorKind::BrokenPipe => {
            debug!(target: PROCESS_TARGET, facet = name, "entry point closed stdin early");
            Ok(())
        }
        other => other.map_err(io_error),
    }
}

/// Reads the single reply line from stdout.
fn read_reply_line(name: &str, stdout: ChildStdout) -> Result<String, ProcessError> {
    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .map(|_| line)
        .map_err(|err| ProcessError::Io {
            name: name.to_owned(),
            source: Arc::new(err),
        })
}

/// Drains stderr on a detached thread so the child never blocks on it.
fn drain_stderr(name: &str, stderr: Option<ChildStderr>) {
    let Some(reader) = stderr else {
        return;
    };
    let facet = name.to_owned();
    thread::spawn(move || {
        let mut buffer = String::new();
        if BufReader::new(reader).read_to_string(&mut buffer).is_ok() && !buffer.is_empty() {
            debug!(
                target: PROCESS_TARGET,
                facet = facet.as_str(),
                stderr = %buffer.trim(),
                "entry point stderr output"
            );
        }
    });
}

/// Waits for the child to exit within `remaining`.
fn wait_for_exit(
    name: &str,
    child: &mut Child,
    remaining: Duration,
    timeout: Duration,
) -> Result<(), ProcessError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(ProcessError::NonZeroExit {
                    name: name.to_owned(),
                    status: status.code().unwrap_or(-1),
                });
            }
            Ok(None) if start.elapsed() >= remaining => {
                return Err(ProcessError::Timeout {
                    name: name.to_owned(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
            Err(err) => {
                return Err(ProcessError::Io {
                    name: name.to_owned(),
                    source: Arc::new(err),
                });
            }
        }
    }
}
