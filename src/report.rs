//! Check reports - batch validation of document files.
//!
//! Validates every document under a path and summarizes the results:
//! - located schema errors per document
//! - documents that declare no schema, or whose schema is missing
//! - schema failures (schemas that do not compile, unreadable documents)

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ValidateError;
use crate::locate::LocatedError;
use crate::types::Span;
use crate::workspace::{is_document, ValidationOutcome, Workspace};

/// A single located error in a report.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    /// JSON Pointer to the failing value (e.g., "/children/1/type")
    pub path: String,
    pub keyword: String,
    pub message: String,
    /// Source range of the deepest resolved hop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Span>,
}

impl From<&LocatedError> for ErrorReport {
    fn from(located: &LocatedError) -> Self {
        Self {
            path: located.error.pointer.clone(),
            keyword: located.error.keyword.clone(),
            message: located.error.message.clone(),
            location: located.jump_target().copied(),
        }
    }
}

/// Status of a checked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Valid,
    Invalid,
    /// No `$schema` declared, or the schema is unavailable.
    Skipped,
    Error,
}

/// Result of checking a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorReport>,
    /// Failure message for `FileStatus::Error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip)]
    exit_code: i32,
}

impl FileReport {
    /// Build a report from one validation result.
    pub fn new(
        file: &Path,
        result: &Result<Option<ValidationOutcome>, ValidateError>,
    ) -> Self {
        let mut report = Self {
            file: file.to_path_buf(),
            status: FileStatus::Skipped,
            schema: None,
            errors: Vec::new(),
            failure: None,
            exit_code: 0,
        };

        match result {
            Ok(None) => {}
            Ok(Some(outcome)) => {
                report.schema = Some(outcome.schema.clone());
                report.errors = outcome.errors.iter().map(ErrorReport::from).collect();
                if outcome.is_valid() {
                    report.status = FileStatus::Valid;
                } else {
                    report.status = FileStatus::Invalid;
                    report.exit_code = 1;
                }
            }
            Err(e) => {
                report.status = FileStatus::Error;
                report.failure = Some(e.to_string());
                report.exit_code = e.exit_code();
            }
        }

        report
    }
}

/// Result of checking a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub results: Vec<FileReport>,
}

impl CheckResult {
    /// Returns true if no file was invalid or failed.
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }

    /// Process exit code: the highest code of any file, 0 when all passed.
    pub fn exit_code(&self) -> i32 {
        self.results.iter().map(|r| r.exit_code).max().unwrap_or(0)
    }
}

/// Check a file or directory.
///
/// If path is a directory, recursively finds all markdown documents.
/// Results are recorded on the workspace's outcome board as well.
pub fn check(workspace: &Workspace, path: &Path) -> CheckResult {
    let files = collect_documents(path);
    let results: Vec<FileReport> = workspace
        .sweep(&files)
        .iter()
        .map(|(file, result)| FileReport::new(file, result))
        .collect();

    let count = |status: FileStatus| results.iter().filter(|r| r.status == status).count();
    let passed = count(FileStatus::Valid);
    let skipped = count(FileStatus::Skipped);
    let failed = count(FileStatus::Invalid) + count(FileStatus::Error);
    let errors = results.iter().map(|r| r.errors.len()).sum();

    tracing::info!(
        path = %path.display(),
        files = files.len(),
        passed,
        failed,
        skipped,
        "check finished"
    );

    CheckResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed,
        failed,
        skipped,
        errors,
        results,
    }
}

/// Collect all documents in a path (file or directory), sorted.
pub fn collect_documents(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_document(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_document(&path) {
            files.push(path);
        }
    }
}
