#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel geometry simplification.
//!
//! Runs `mapshaper` over the stripped parcel collection, keeping a fixed
//! share of vertices while preserving every shape, and writes the
//! collection the viewer loads.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

use thiserror::Error;

/// Stripped parcels produced by `parcel_map_prepare strip`.
pub const DEFAULT_INPUT: &str = "parcels-stripped.geojson";

/// Simplified parcels loaded by the viewer.
pub const DEFAULT_OUTPUT: &str = "public/parcels-web.geojson";

/// `mapshaper` as installed by `npm install`.
pub const DEFAULT_TOOL: &str = "node_modules/.bin/mapshaper";

/// Share of vertices kept.
pub const RETENTION: &str = "10%";

/// What to run before this tool when its input is missing.
pub const PRECEDING_STEP: &str = "Run 'parcel_map_prepare strip' first.";

/// Errors from a simplification run.
#[derive(Debug, Error)]
pub enum SimplifyError {
    /// The stripped parcel file does not exist.
    #[error("Input not found: {}", path.display())]
    InputMissing {
        /// The path that was checked.
        path: PathBuf,
    },

    /// Reading file metadata or starting the tool failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The tool ran but exited unsuccessfully.
    #[error("{tool} failed: {status}")]
    ToolFailed {
        /// The tool that was run.
        tool: String,
        /// How it exited.
        status: ExitStatus,
    },
}

/// One simplification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimplifyJob {
    /// Collection to simplify.
    pub input: PathBuf,
    /// Where to write the result.
    pub output: PathBuf,
    /// The `mapshaper` executable.
    pub tool: PathBuf,
}

impl Default for SimplifyJob {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            tool: PathBuf::from(DEFAULT_TOOL),
        }
    }
}

impl SimplifyJob {
    /// The job with every path resolved against `root`.
    #[must_use]
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            input: root.join(defaults.input),
            output: root.join(defaults.output),
            tool: root.join(defaults.tool),
        }
    }

    /// Arguments passed to the tool.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        vec![
            self.input.clone().into_os_string(),
            "-simplify".into(),
            RETENTION.into(),
            "keep-shapes".into(),
            "-o".into(),
            self.output.clone().into_os_string(),
            "format=geojson".into(),
        ]
    }

    /// Size of the input in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SimplifyError::InputMissing`] if the input does not exist.
    pub fn input_size(&self) -> Result<u64, SimplifyError> {
        if !self.input.exists() {
            return Err(SimplifyError::InputMissing {
                path: self.input.clone(),
            });
        }
        Ok(std::fs::metadata(&self.input)?.len())
    }

    /// Runs the tool and returns the output size in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SimplifyError::InputMissing`] if the input does not exist,
    /// [`SimplifyError::Io`] if the tool cannot be started, or
    /// [`SimplifyError::ToolFailed`] if it exits unsuccessfully.
    pub fn run(&self) -> Result<u64, SimplifyError> {
        self.input_size()?;
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        log::info!("Running {} {:?}", self.tool.display(), self.args());
        let status = Command::new(&self.tool).args(self.args()).status()?;
        if !status.success() {
            return Err(SimplifyError::ToolFailed {
                tool: self.tool.display().to_string(),
                status,
            });
        }

        Ok(std::fs::metadata(&self.output)?.len())
    }
}

/// File size in whole megabytes (10^6 bytes).
#[must_use]
pub fn megabytes(bytes: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let mb = bytes as f64 / 1e6;
    format!("{mb:.0}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let job = SimplifyJob::rooted_at(dir.path());
        let err = job.run().unwrap_err();
        assert!(matches!(err, SimplifyError::InputMissing { .. }), "{err:?}");
        assert_eq!(
            err.to_string(),
            format!("Input not found: {}", dir.path().join(DEFAULT_INPUT).display())
        );
        assert!(!job.output.exists());
    }

    #[test]
    fn arguments_keep_shapes_at_fixed_retention() {
        let job = SimplifyJob::default();
        let args: Vec<String> = job
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "parcels-stripped.geojson",
                "-simplify",
                "10%",
                "keep-shapes",
                "-o",
                "public/parcels-web.geojson",
                "format=geojson",
            ]
        );
    }

    #[test]
    fn megabytes_rounds() {
        assert_eq!(megabytes(1_600_000), "2");
        assert_eq!(megabytes(400_000), "0");
    }

    #[cfg(unix)]
    fn fake_tool(dir: &Path, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt as _;

        let path = dir.join("mapshaper");
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn runs_tool_and_reports_output_size() {
        let dir = tempfile::tempdir().unwrap();
        let job = SimplifyJob {
            tool: fake_tool(dir.path(), r#"cp "$1" "$6""#),
            ..SimplifyJob::rooted_at(dir.path())
        };
        std::fs::write(&job.input, "{\"type\":\"FeatureCollection\",\"features\":[]}").unwrap();

        assert_eq!(job.input_size().unwrap(), 42);
        assert_eq!(job.run().unwrap(), 42);
        assert!(job.output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let job = SimplifyJob {
            tool: fake_tool(dir.path(), "exit 3"),
            ..SimplifyJob::rooted_at(dir.path())
        };
        std::fs::write(&job.input, "{}").unwrap();

        let err = job.run().unwrap_err();
        let SimplifyError::ToolFailed { status, .. } = err else {
            panic!("expected ToolFailed, got {err:?}");
        };
        assert_eq!(status.code(), Some(3));
    }
}
