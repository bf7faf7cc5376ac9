//! Step outputs in the hosted-CI output file format.
//!
//! Single-line values are written as `name=value`. Multi-line values use a
//! heredoc-style capture:
//!
//! ```text
//! package_paths<<ghadelimiter_4f1c...
//! /downloads/windows_x86_64/msquic-v2.4.8_windows_x86_64.zip
//! /downloads/android/msquic-v2.4.8_android.tar.gz
//! ghadelimiter_4f1c...
//! ```
//!
//! The capture ends at the first line equal to the delimiter, so the
//! delimiter is derived from a digest of the content and re-derived until no
//! content line equals it.

use camino::{Utf8Path, Utf8PathBuf};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use thiserror::Error;

/// Prefix shared by generated delimiters.
const DELIMITER_PREFIX: &str = "ghadelimiter_";

/// Errors raised while writing step outputs.
#[derive(Debug, Error)]
pub enum StepOutputError {
    /// The output name is empty or contains reserved characters.
    #[error("invalid step output name \"{0}\"")]
    InvalidName(String),

    /// A single-line output value contains a line break.
    #[error("step output {name} must not contain a line break; write it as a multi-line value")]
    MultilineValue {
        /// The output name.
        name: String,
    },

    /// Writing to the output sink failed.
    #[error("failed to write step output: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`StepOutputError`].
pub type Result<T> = std::result::Result<T, StepOutputError>;

/// Format a single-line output record.
///
/// # Errors
///
/// Returns [`StepOutputError::InvalidName`] for an unusable name and
/// [`StepOutputError::MultilineValue`] if `value` contains a line break.
///
/// # Examples
///
/// ```
/// use msquic_pipeline::step_output::format_value;
///
/// let record = format_value("package_name", "msquic-v2.4.8_ios.tar.gz").expect("valid");
/// assert_eq!(record, "package_name=msquic-v2.4.8_ios.tar.gz\n");
/// ```
pub fn format_value(name: &str, value: &str) -> Result<String> {
    validate_name(name)?;
    if value.contains(['\n', '\r']) {
        return Err(StepOutputError::MultilineValue {
            name: name.to_owned(),
        });
    }
    Ok(format!("{name}={value}\n"))
}

/// Format a multi-line output record with a collision-free delimiter.
///
/// # Errors
///
/// Returns [`StepOutputError::InvalidName`] for an unusable name.
pub fn format_lines<S: AsRef<str>>(name: &str, lines: &[S]) -> Result<String> {
    validate_name(name)?;
    let delimiter = choose_delimiter(lines);
    let mut record = format!("{name}<<{delimiter}\n");
    for line in lines {
        record.push_str(line.as_ref());
        record.push('\n');
    }
    record.push_str(&delimiter);
    record.push('\n');
    Ok(record)
}

/// Derive a delimiter that no content line equals.
#[must_use]
pub fn choose_delimiter<S: AsRef<str>>(lines: &[S]) -> String {
    let mut hasher = Sha256::new();
    for line in lines {
        hasher.update(line.as_ref().as_bytes());
        hasher.update(b"\n");
    }
    delimiter_from_seed(hasher.finalize(), lines)
}

/// Walk the hash chain starting at `seed` until a candidate misses `lines`.
fn delimiter_from_seed<S: AsRef<str>>(mut seed: Output<Sha256>, lines: &[S]) -> String {
    loop {
        let candidate = delimiter_candidate(&seed);
        if !lines.iter().any(|line| line.as_ref() == candidate) {
            return candidate;
        }
        seed = Sha256::digest(seed);
    }
}

fn delimiter_candidate(seed: &Output<Sha256>) -> String {
    let hex = format!("{seed:x}");
    format!("{DELIMITER_PREFIX}{}", hex.get(..32).unwrap_or(&hex))
}

/// Parse an output file back into `(name, value)` pairs.
///
/// Multi-line values are joined with `\n`. Used to read outputs handed over
/// between steps of a local run.
#[must_use]
pub fn parse_outputs(contents: &str) -> Vec<(String, String)> {
    let mut outputs = Vec::new();
    let mut lines = contents.lines();
    while let Some(line) = lines.next() {
        let heredoc = line
            .split_once("<<")
            .filter(|(name, _)| !name.contains('='));
        if let Some((name, delimiter)) = heredoc {
            let mut captured = Vec::new();
            for inner in lines.by_ref() {
                if inner == delimiter {
                    break;
                }
                captured.push(inner);
            }
            outputs.push((name.to_owned(), captured.join("\n")));
        } else if let Some((name, value)) = line.split_once('=') {
            outputs.push((name.to_owned(), value.to_owned()));
        }
    }
    outputs
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(['=', '<', '\n', '\r']) {
        return Err(StepOutputError::InvalidName(name.to_owned()));
    }
    Ok(())
}

/// Where step outputs are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutputs {
    /// Append to an output file (the hosted CI's `GITHUB_OUTPUT`).
    File(Utf8PathBuf),
    /// Write records to standard output.
    Stdout,
}

impl StepOutputs {
    /// Select the output file when one is configured, else standard output.
    #[must_use]
    pub fn from_path(path: Option<&Utf8Path>) -> Self {
        path.map_or(Self::Stdout, |p| Self::File(p.to_owned()))
    }

    /// Write a single-line output.
    ///
    /// # Errors
    ///
    /// Returns a formatting error from [`format_value`] or an I/O error.
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        let record = format_value(name, value)?;
        self.append(&record)
    }

    /// Write a multi-line output.
    ///
    /// # Errors
    ///
    /// Returns a formatting error from [`format_lines`] or an I/O error.
    pub fn set_lines<S: AsRef<str>>(&self, name: &str, lines: &[S]) -> Result<()> {
        let record = format_lines(name, lines)?;
        self.append(&record)
    }

    fn append(&self, record: &str) -> Result<()> {
        match self {
            Self::File(path) => {
                let mut file = OpenOptions::new().create(true).append(true).open(path)?;
                file.write_all(record.as_bytes())?;
            }
            Self::Stdout => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(record.as_bytes())?;
            }
        }
        Ok(())
    }
}
