//! OpenSCAD process invocation.
//!
//! Spawns the compiler natively or through the container engine, streams
//! its standard error into memory and reports one normalized
//! [`ExportResult`] for both execution modes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, trace, warn};

use crate::args::ExportArgs;
use crate::error::ExportError;
use crate::launch::{CONTAINER_ENGINE, CONTAINER_SCAD_BIN, CONTAINER_WORKDIR, LaunchSpec};
use crate::paths::{ensure_parent_dir, relative_to, resolve_in};

/// User/group id used when the host ids cannot be determined.
pub const FALLBACK_ID: u32 = 1000;

/// Size of a single stderr read.
const CHUNK_SIZE: usize = 8 * 1024;

/// One export job: a source file, its mesh, and the directory to run in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFiles {
    /// Directory the compiler runs in and, for containers, the mount source.
    pub working_dir: PathBuf,
    /// Source file, absolute or relative to `working_dir`.
    pub input: PathBuf,
    /// Mesh file, absolute or relative to `working_dir`.
    pub output: PathBuf,
}

impl ExportFiles {
    /// Describe an export job.
    pub fn new(
        working_dir: impl Into<PathBuf>,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            input: input.into(),
            output: output.into(),
        }
    }

    /// Source path as passed to the compiler.
    pub fn input_arg(&self) -> String {
        relative_to(&self.working_dir, &self.input)
    }

    /// Mesh path as passed to the compiler.
    pub fn output_arg(&self) -> String {
        relative_to(&self.working_dir, &self.output)
    }

    /// Source path resolved against the working directory.
    pub fn absolute_input(&self) -> PathBuf {
        resolve_in(&self.working_dir, &self.input)
    }

    /// Mesh path resolved against the working directory.
    pub fn absolute_output(&self) -> PathBuf {
        resolve_in(&self.working_dir, &self.output)
    }
}

/// Outcome of one compiler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    /// `true` only when the process exited with code 0.
    pub ok: bool,
    /// Stderr chunks in arrival order, or the spawn error message.
    pub diagnostics: Vec<String>,
    /// Exit code; `None` when killed by a signal or never started.
    pub exit_code: Option<i32>,
    /// Wall time measured from spawn to exit.
    #[serde(
        serialize_with = "serialize_duration_secs",
        deserialize_with = "deserialize_duration_secs"
    )]
    pub duration: Duration,
}

impl ExportResult {
    /// Result for a process that could not be started.
    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            diagnostics: vec![message.into()],
            exit_code: None,
            duration: Duration::ZERO,
        }
    }

    /// Duration in fractional seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Diagnostics split into non-empty lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .flat_map(|chunk| chunk.split('\n'))
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
    }
}

fn serialize_duration_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs: f64 = Deserialize::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// Numeric user and group ids mapped into the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIds {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

impl UserIds {
    /// Ids of the current process.
    #[cfg(unix)]
    pub fn current() -> Self {
        Self {
            uid: users::get_current_uid(),
            gid: users::get_current_gid(),
        }
    }

    /// Ids of the current process; the fallback off unix.
    #[cfg(not(unix))]
    pub fn current() -> Self {
        Self::fallback()
    }

    /// `1000:1000`.
    pub fn fallback() -> Self {
        Self {
            uid: FALLBACK_ID,
            gid: FALLBACK_ID,
        }
    }
}

impl fmt::Display for UserIds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Runs one export.
///
/// Implemented by [`ProcessInvoker`]; tests substitute their own.
#[async_trait]
pub trait MeshExporter: Send + Sync + fmt::Debug {
    /// Compile `files.input` into `files.output`.
    ///
    /// Compiler failures are reported through [`ExportResult::ok`]; only
    /// local filesystem problems are errors.
    async fn export(
        &self,
        launch: &LaunchSpec,
        files: &ExportFiles,
    ) -> Result<ExportResult, ExportError>;
}

/// Spawns OpenSCAD as a child process.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    args: ExportArgs,
    user: UserIds,
    engine: PathBuf,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessInvoker {
    /// Invoker with default arguments and the current user's ids.
    pub fn new() -> Self {
        Self {
            args: ExportArgs::default(),
            user: UserIds::current(),
            engine: PathBuf::from(CONTAINER_ENGINE),
        }
    }

    /// Override the compiler arguments.
    pub fn with_args(mut self, args: ExportArgs) -> Self {
        self.args = args;
        self
    }

    /// Override the ids mapped into the container.
    pub fn with_user(mut self, user: UserIds) -> Self {
        self.user = user;
        self
    }

    /// Override the container engine executable.
    pub fn with_engine(mut self, engine: impl Into<PathBuf>) -> Self {
        self.engine = engine.into();
        self
    }

    /// Program to spawn for `launch`.
    pub fn program<'a>(&'a self, launch: &'a LaunchSpec) -> &'a Path {
        match launch {
            LaunchSpec::Native { executable } => executable,
            LaunchSpec::Container { .. } => &self.engine,
        }
    }

    /// Arguments passed to [`ProcessInvoker::program`].
    pub fn command_line(&self, launch: &LaunchSpec, files: &ExportFiles) -> Vec<String> {
        let compiler_args = self.args.build(&files.input_arg(), &files.output_arg());

        let Some(image) = launch.image() else {
            return compiler_args;
        };

        let mount_source = std::path::absolute(&files.working_dir)
            .unwrap_or_else(|_| files.working_dir.clone());

        let mut argv = vec![
            "run".to_string(),
            "--rm".to_string(),
            "-u".to_string(),
            self.user.to_string(),
            "-v".to_string(),
            format!("{}:{CONTAINER_WORKDIR}", mount_source.display()),
            image,
            CONTAINER_SCAD_BIN.to_string(),
        ];
        argv.extend(compiler_args);
        argv
    }

    /// Spawn the compiler and wait for it to exit.
    pub async fn run_export(
        &self,
        launch: &LaunchSpec,
        files: &ExportFiles,
    ) -> Result<ExportResult, ExportError> {
        ensure_parent_dir(&files.absolute_output()).await?;

        let program = self.program(launch);
        let argv = self.command_line(launch, files);
        info!(
            "Executing OpenSCAD: program='{}', args={:?}, cwd='{}'",
            program.display(),
            argv,
            files.working_dir.display()
        );

        let mut cmd = Command::new(program);
        cmd.args(&argv)
            .current_dir(&files.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x0800_0000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to start '{}': {}", program.display(), e);
                return Ok(ExportResult::spawn_failure(format!(
                    "Failed to start {}: {e}",
                    program.display()
                )));
            }
        };

        let started = Instant::now();
        let stderr = child.stderr.take();
        let stdout = child.stdout.take();

        let (status, mut diagnostics, ()) = tokio::join!(
            child.wait(),
            collect_chunks(stderr),
            trace_lines(stdout)
        );
        let duration = started.elapsed();

        let exit_code = match status {
            Ok(status) => status.code(),
            Err(e) => {
                warn!("Failed to wait for '{}': {}", program.display(), e);
                diagnostics.push(e.to_string());
                None
            }
        };

        debug!(
            exit_code = ?exit_code,
            chunks = diagnostics.len(),
            duration_ms = duration.as_millis() as u64,
            "OpenSCAD exited"
        );

        Ok(ExportResult {
            ok: exit_code == Some(0),
            diagnostics,
            exit_code,
            duration,
        })
    }
}

#[async_trait]
impl MeshExporter for ProcessInvoker {
    async fn export(
        &self,
        launch: &LaunchSpec,
        files: &ExportFiles,
    ) -> Result<ExportResult, ExportError> {
        self.run_export(launch, files).await
    }
}

/// Read a stream to the end, one entry per chunk.
///
/// A multi-byte character split across two reads is carried over to the
/// next entry. Invalid bytes become U+FFFD.
async fn collect_chunks<R>(stream: Option<R>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut chunks = Vec::new();
    let Some(mut stream) = stream else {
        return chunks;
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut pending = Vec::new();
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                if let Some(text) = take_complete_utf8(&mut pending) {
                    chunks.push(text);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading OpenSCAD stderr: {}", e);
                drain(&mut stream).await;
                break;
            }
        }
    }
    if !pending.is_empty() {
        chunks.push(String::from_utf8_lossy(&pending).into_owned());
    }
    chunks
}

/// Decode everything in `pending` except an incomplete UTF-8 sequence at
/// its end, which stays in `pending`.
fn take_complete_utf8(pending: &mut Vec<u8>) -> Option<String> {
    let cut = pending.len() - incomplete_tail_len(pending);
    if cut == 0 {
        return None;
    }
    let rest = pending.split_off(cut);
    let text = String::from_utf8_lossy(&pending[..]).into_owned();
    *pending = rest;
    Some(text)
}

/// Length of a truncated multi-byte sequence at the end of `bytes`.
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let window = bytes.len().min(3);
    for back in 1..=window {
        let byte = bytes[bytes.len() - back];
        if byte & 0xC0 == 0x80 {
            continue;
        }
        let needed = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        return if back < needed { back } else { 0 };
    }
    0
}

/// Trace stdout line by line until EOF.
///
/// Lines are decoded lossily. The pipe is read to the end even after a
/// read error so the compiler never writes into a closed pipe.
async fn trace_lines<R>(stream: Option<R>)
where
    R: AsyncRead + Unpin,
{
    let Some(stream) = stream else {
        return;
    };
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                trace!(target: "scad_export::stdout", "{}", text.trim_end());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!("Error reading OpenSCAD stdout: {}", e);
                drain(&mut reader).await;
                break;
            }
        }
    }
}

/// Discard whatever is left in `stream`.
async fn drain<R>(stream: &mut R)
where
    R: AsyncRead + Unpin,
{
    if let Err(e) = tokio::io::copy(stream, &mut tokio::io::sink()).await {
        debug!("Stopped draining OpenSCAD output: {}", e);
    }
}
