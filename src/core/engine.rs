//! Fetch engine seam for mediafetch
//!
//! The engine does the actual transfer. mediafetch only hands it a locator,
//! an options bag and an optional credential source, then reads back either a
//! saved path or an opaque failure message.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use url::Url;

use crate::core::credentials::AuthConfig;

/// Progress callback function type (downloaded, total)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Default engine binary
pub const DEFAULT_ENGINE: &str = "yt-dlp";

/// One request to the engine; never mutated once issued
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub locator: Url,
    pub auth: Option<AuthConfig>,
}

impl FetchRequest {
    pub fn anonymous(locator: Url) -> Self {
        Self { locator, auth: None }
    }

    pub fn with_auth(locator: Url, auth: AuthConfig) -> Self {
        Self {
            locator,
            auth: Some(auth),
        }
    }
}

/// Options bag passed to the engine with every request
#[derive(Clone)]
pub struct FetchOptions {
    /// Optional progress callback
    pub progress: Option<ProgressCallback>,

    /// Directory the resource is written to
    pub destination: PathBuf,

    /// Engine file name template, relative to `destination`
    pub output_template: String,

    /// Format selection policy
    pub format: String,

    /// Container used when separate streams are merged
    pub merge_output_format: String,

    /// Replace an existing file with the same name
    pub force_overwrite: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            progress: None,
            destination: PathBuf::from("."),
            output_template: "%(title)s.%(ext)s".to_string(),
            format: "bestvideo+bestaudio/best".to_string(),
            merge_output_format: "mp4".to_string(),
            force_overwrite: false,
        }
    }
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("progress", &self.progress.is_some())
            .field("destination", &self.destination)
            .field("output_template", &self.output_template)
            .field("format", &self.format)
            .field("merge_output_format", &self.merge_output_format)
            .field("force_overwrite", &self.force_overwrite)
            .finish()
    }
}

/// Failure text surfaced by the engine, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineFailure {
    pub message: String,
}

impl EngineFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// External fetch engine
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Fetches the resource once; returns where it was saved
    async fn fetch(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
    ) -> std::result::Result<PathBuf, EngineFailure>;
}

/// Engine backed by the `yt-dlp` command-line program
#[derive(Debug, Clone)]
pub struct YtDlpEngine {
    binary: PathBuf,
}

impl Default for YtDlpEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE)
    }
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Command-line arguments for one request
    pub fn build_args(request: &FetchRequest, options: &FetchOptions) -> Vec<String> {
        let output = options.destination.join(&options.output_template);
        let mut args = vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-o".to_string(),
            output.to_string_lossy().into_owned(),
            "-f".to_string(),
            options.format.clone(),
            "--merge-output-format".to_string(),
            options.merge_output_format.clone(),
        ];

        if options.force_overwrite {
            args.push("--force-overwrites".to_string());
        }

        match &request.auth {
            Some(AuthConfig::FileCredential { path }) => {
                args.push("--cookies".to_string());
                args.push(path.to_string_lossy().into_owned());
            }
            Some(AuthConfig::BrowserCredential {
                browser_name,
                profile_name,
            }) => {
                args.push("--cookies-from-browser".to_string());
                args.push(match profile_name {
                    Some(profile) => format!("{browser_name}:{profile}"),
                    None => browser_name.clone(),
                });
            }
            None => {}
        }

        // Locator goes last, after `--` so it is never read as an option
        args.push("--".to_string());
        args.push(request.locator.to_string());
        args
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    async fn fetch(
        &self,
        request: &FetchRequest,
        options: &FetchOptions,
    ) -> std::result::Result<PathBuf, EngineFailure> {
        let args = Self::build_args(request, options);
        log::debug!("Running {} {}", self.binary.display(), args.join(" "));

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineFailure::new(format!("Failed to start {}: {e}", self.binary.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineFailure::new("engine stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineFailure::new("engine stderr was not captured"))?;

        let progress = options.progress.clone();
        let (stdout_lines, stderr_lines) = tokio::join!(
            collect_lines(stdout, progress.clone()),
            collect_lines(stderr, progress)
        );

        let status = child
            .wait()
            .await
            .map_err(|e| EngineFailure::new(format!("Failed to wait for engine: {e}")))?;

        if status.success() {
            let saved = stdout_lines
                .iter()
                .rev()
                .map(|line| line.trim())
                .find(|line| !line.is_empty() && parse_progress(line).is_none())
                .map(PathBuf::from)
                .unwrap_or_else(|| options.destination.clone());
            Ok(saved)
        } else {
            Err(EngineFailure::new(failure_message(&stderr_lines, status.code())))
        }
    }
}

/// Reads a stream to the end, forwarding progress lines
///
/// Lines are decoded lossily so console code pages that are not UTF-8 never
/// stop the read. The pipe stays open until the engine closes it.
async fn collect_lines<R>(reader: R, progress: Option<ProgressCallback>) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut collected = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(&['\r', '\n'][..]);
                if let Some(permille) = parse_progress(line) {
                    if let Some(ref progress) = progress {
                        progress(permille, 1000);
                    }
                } else {
                    log::debug!("engine: {line}");
                    collected.push(line.to_string());
                }
            }
            Err(e) => {
                log::debug!("Stopped reading engine output: {e}");
                break;
            }
        }
    }

    collected
}

/// Parses `[download]  42.3% of ...` into per-mille progress
fn parse_progress(line: &str) -> Option<u64> {
    let rest = line.trim().strip_prefix("[download]")?;
    let percent = rest.split_whitespace().next()?.strip_suffix('%')?;
    let percent: f64 = percent.parse().ok()?;
    if !(0.0..=100.0).contains(&percent) {
        return None;
    }
    Some((percent * 10.0).round() as u64)
}

/// Raw failure text: `ERROR:` lines, else all of stderr, else the exit status
fn failure_message(stderr_lines: &[String], code: Option<i32>) -> String {
    let errors: Vec<&str> = stderr_lines
        .iter()
        .map(String::as_str)
        .filter(|line| line.trim_start().starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }

    let all = stderr_lines.join("\n");
    if !all.trim().is_empty() {
        return all;
    }

    match code {
        Some(code) => format!("engine exited with status {code}"),
        None => "engine terminated by signal".to_string(),
    }
}
