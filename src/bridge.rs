//! Bridge to the external document converter (pandoc)
//!
//! Every conversion spawns the converter once, feeds it the whole payload
//! and captures the whole output. No partial output ever escapes: either the
//! converter exits successfully and its output is returned, or the call
//! fails with a classified [`DocumentError`].
//!
//! # Argument Contract
//!
//! ```text
//! pandoc [+RTS -M<limit>m -RTS] --from <fmt> --to <fmt> [--standalone] [--output -]
//! ```
//!
//! The memory ceiling always precedes the format selection and is omitted
//! when the limit is configured as 0. HTML targets get `--standalone` so the
//! output is a complete document whose head carries the source metadata.
//! `--output -` is added in [`OutputMode::Binary`] so binary writers deliver
//! their bytes on stdout.
//!
//! # Locating The Executable
//!
//! Location is pluggable through [`ExecutableLocator`].
//! [`default_locator`] cascades through an explicitly configured path, a
//! copy packaged next to the running executable, a development copy under
//! the working directory and finally `PATH`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, warn};

use crate::charset::decode_text;
use crate::config::BridgeOptions;
use crate::error::{DocumentError, Result};
use crate::process::{run_buffered, silent_command};

/// Program name of the converter
pub const CONVERTER_PROGRAM: &str = "pandoc";

/// Targets rendered as complete documents
const STANDALONE_TARGETS: &[&str] = &["html", "html4", "html5"];

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "pandoc.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "pandoc";

/// How converter output is captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Decode stdout as text
    Text,
    /// Return stdout bytes unaltered
    Binary,
}

/// A single conversion job
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    pub payload: &'a [u8],
    pub from: &'a str,
    pub to: &'a str,
    pub mode: OutputMode,
}

impl<'a> ConversionRequest<'a> {
    /// Text-mode request
    pub fn text(payload: &'a [u8], from: &'a str, to: &'a str) -> Self {
        Self {
            payload,
            from,
            to,
            mode: OutputMode::Text,
        }
    }

    /// Binary-mode request
    pub fn binary(payload: &'a [u8], from: &'a str, to: &'a str) -> Self {
        Self {
            payload,
            from,
            to,
            mode: OutputMode::Binary,
        }
    }
}

/// Successful converter output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutput {
    Text(String),
    Binary(Vec<u8>),
}

impl ConversionOutput {
    /// Text output; binary output is decoded strictly
    ///
    /// # Errors
    ///
    /// - `DocumentError::Encoding` if binary output is not decodable text
    pub fn into_text(self) -> Result<String> {
        match self {
            ConversionOutput::Text(text) => Ok(text),
            ConversionOutput::Binary(bytes) => decode_text(&bytes),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            ConversionOutput::Text(text) => text.into_bytes(),
            ConversionOutput::Binary(bytes) => bytes,
        }
    }
}

/// Anything able to convert documents between formats
///
/// Adapters only see this trait, so tests can drive them with in-memory
/// doubles instead of a real converter process.
pub trait Converter {
    fn convert(&self, request: &ConversionRequest<'_>) -> Result<ConversionOutput>;
}

// ============================================================================
// Executable location
// ============================================================================

/// Strategy for finding the converter executable
pub trait ExecutableLocator {
    /// Absolute path of the executable, if this strategy finds one
    fn locate(&self) -> Option<PathBuf>;

    /// Human-readable description for error messages
    fn describe(&self) -> String;
}

/// `<application dir>/pandoc/pandoc[.exe]`, the layout of packaged builds
#[derive(Debug, Clone)]
pub struct PackagedLocator {
    app_dir: Option<PathBuf>,
}

impl PackagedLocator {
    /// Locate relative to the running executable's directory
    pub fn new() -> Self {
        let app_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self { app_dir }
    }

    /// Locate relative to an explicit application directory
    pub fn in_dir(app_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_dir: Some(app_dir.into()),
        }
    }

    fn candidate(&self) -> Option<PathBuf> {
        self.app_dir
            .as_ref()
            .map(|dir| dir.join(CONVERTER_PROGRAM).join(EXECUTABLE_NAME))
    }
}

impl Default for PackagedLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableLocator for PackagedLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.candidate().filter(|path| path.is_file())
    }

    fn describe(&self) -> String {
        match self.candidate() {
            Some(path) => path.display().to_string(),
            None => "packaged converter (application directory unknown)".to_string(),
        }
    }
}

/// `<working dir>/.pandoc/pandoc[.exe]`, used when running from a checkout
#[derive(Debug, Clone)]
pub struct DevelopmentLocator {
    root: Option<PathBuf>,
}

impl DevelopmentLocator {
    pub fn new() -> Self {
        Self {
            root: std::env::current_dir().ok(),
        }
    }

    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn candidate(&self) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|dir| dir.join(format!(".{CONVERTER_PROGRAM}")).join(EXECUTABLE_NAME))
    }
}

impl Default for DevelopmentLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutableLocator for DevelopmentLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.candidate().filter(|path| path.is_file())
    }

    fn describe(&self) -> String {
        match self.candidate() {
            Some(path) => path.display().to_string(),
            None => "development converter (working directory unknown)".to_string(),
        }
    }
}

/// An explicitly configured path, used as-is
#[derive(Debug, Clone)]
pub struct FixedLocator(pub PathBuf);

impl ExecutableLocator for FixedLocator {
    fn locate(&self) -> Option<PathBuf> {
        Some(self.0.clone())
    }

    fn describe(&self) -> String {
        self.0.display().to_string()
    }
}

/// Looks the converter up on `PATH`
#[derive(Debug, Clone)]
pub struct SearchPathLocator {
    program: String,
}

impl SearchPathLocator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SearchPathLocator {
    fn default() -> Self {
        Self::new(CONVERTER_PROGRAM)
    }
}

impl ExecutableLocator for SearchPathLocator {
    fn locate(&self) -> Option<PathBuf> {
        which::which(&self.program).ok()
    }

    fn describe(&self) -> String {
        format!("{} on PATH", self.program)
    }
}

/// Tries each locator in order
pub struct CascadeLocator {
    locators: Vec<Box<dyn ExecutableLocator>>,
}

impl CascadeLocator {
    pub fn new(locators: Vec<Box<dyn ExecutableLocator>>) -> Self {
        Self { locators }
    }
}

impl ExecutableLocator for CascadeLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.locators.iter().find_map(|locator| locator.locate())
    }

    fn describe(&self) -> String {
        self.locators
            .iter()
            .map(|locator| locator.describe())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Debug for CascadeLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeLocator")
            .field("candidates", &self.describe())
            .finish()
    }
}

/// Locator cascade for `options`
///
/// An explicit executable wins outright. Otherwise the packaged copy, the
/// development copy and `PATH` are tried in that order.
pub fn default_locator(options: &BridgeOptions) -> Box<dyn ExecutableLocator> {
    match &options.executable {
        Some(path) => Box::new(FixedLocator(path.clone())),
        None => Box::new(CascadeLocator::new(vec![
            Box::new(PackagedLocator::new()),
            Box::new(DevelopmentLocator::new()),
            Box::new(SearchPathLocator::default()),
        ])),
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Process-backed [`Converter`]
pub struct ConverterBridge {
    locator: Box<dyn ExecutableLocator>,
    options: BridgeOptions,
}

impl ConverterBridge {
    /// Bridge using the [`default_locator`] cascade
    pub fn new(options: BridgeOptions) -> Self {
        let locator = default_locator(&options);
        Self { locator, options }
    }

    /// Bridge using a custom locator
    pub fn with_locator(options: BridgeOptions, locator: Box<dyn ExecutableLocator>) -> Self {
        Self { locator, options }
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Resolve the converter executable
    ///
    /// # Errors
    ///
    /// - `DocumentError::ConverterNotFound` if no strategy finds it
    pub fn executable(&self) -> Result<PathBuf> {
        self.locator.locate().ok_or_else(|| {
            DocumentError::ConverterNotFound(format!("looked for {}", self.locator.describe()))
        })
    }

    /// Converter arguments for `request`, in contract order
    pub fn build_args(&self, request: &ConversionRequest<'_>) -> Vec<String> {
        let mut args = Vec::with_capacity(10);

        if self.options.memory_limit_mb > 0 {
            args.push("+RTS".to_string());
            args.push(format!("-M{}m", self.options.memory_limit_mb));
            args.push("-RTS".to_string());
        }

        args.push("--from".to_string());
        args.push(request.from.to_string());
        args.push("--to".to_string());
        args.push(request.to.to_string());

        if STANDALONE_TARGETS.contains(&request.to) {
            args.push("--standalone".to_string());
        }

        if request.mode == OutputMode::Binary {
            args.push("--output".to_string());
            args.push("-".to_string());
        }

        args
    }
}

impl Converter for ConverterBridge {
    fn convert(&self, request: &ConversionRequest<'_>) -> Result<ConversionOutput> {
        let executable = self.executable()?;
        let args = self.build_args(request);

        debug!(
            converter = %executable.display(),
            from = request.from,
            to = request.to,
            mode = ?request.mode,
            payload_bytes = request.payload.len(),
            "starting conversion"
        );

        let started = Instant::now();
        let mut cmd = silent_command(&executable);
        cmd.args(&args);

        let output = match run_buffered(cmd, request.payload, self.options.timeout) {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, from = request.from, to = request.to, "converter did not complete");
                return Err(e);
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                status = ?output.status.code(),
                stderr = %stderr,
                from = request.from,
                to = request.to,
                "conversion failed"
            );
            return Err(DocumentError::Conversion {
                status: output.status.code(),
                stderr,
            });
        }

        let result = match request.mode {
            OutputMode::Binary => ConversionOutput::Binary(output.stdout),
            OutputMode::Text => match decode_text(&output.stdout) {
                Ok(text) => ConversionOutput::Text(text),
                Err(e) => {
                    warn!(error = %e, "converter output is not decodable text");
                    return Err(e);
                }
            },
        };

        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "conversion finished"
        );
        Ok(result)
    }
}

impl fmt::Debug for ConverterBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterBridge")
            .field("locator", &self.locator.describe())
            .field("options", &self.options)
            .finish()
    }
}
