use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use log::{info, warn};
use thiserror::Error;
use crate::analysis::backend::AnalysisBackend;
use crate::analysis::pages::Page;
use crate::analysis::params::ParamBundle;
use crate::analysis::session::Notice;
use crate::utils::workspace::Workspace;

pub const EXTERNAL_FILES: &str = "external_files.txt";
const CSV_PATH_KEYS: [&str; 2] = ["csv_path", "input_file"];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> UploadError + '_ {
    move |source| UploadError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub saved: Vec<String>,
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

impl UploadReport {
    pub fn notices(&self, success: &str) -> Vec<Notice> {
        let mut notices: Vec<Notice> = self.warnings.iter().map(Notice::warning).collect();
        notices.extend(self.skipped.iter().map(Notice::info));
        if !self.saved.is_empty() {
            notices.push(Notice::success(success));
        }
        notices
    }
}

/// Keeps only the final component of a browser-supplied name.
fn clean_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

pub fn save_uploaded_csv(workspace: &Workspace, files: &[UploadedFile]) -> Result<UploadReport, UploadError> {
    let mut report = UploadReport::default();
    let csv_dir = workspace.csv_dir();
    fs::create_dir_all(&csv_dir).map_err(io_error(&csv_dir))?;

    if files.iter().all(|file| file.name.trim().is_empty()) {
        report.warnings.push("Upload some CSV files first.".to_string());
        return Ok(report);
    }

    for file in files {
        let Some(name) = clean_name(&file.name) else {
            continue;
        };
        if !is_csv(&name) {
            report.skipped.push(format!("{} is not a CSV file", name));
            continue;
        }
        let target = csv_dir.join(&name);
        if target.exists() {
            report.skipped.push(format!("{} already exists", name));
            continue;
        }
        fs::write(&target, &file.bytes).map_err(io_error(&target))?;
        info!("Saved upload {} ({} bytes)", target.display(), file.bytes.len());
        report.saved.push(name);
    }

    Ok(report)
}

/// Copies `*.csv` of a local folder into the workspace, or records their paths
/// in `csv-files/external_files.txt` when `make_copy` is false.
pub fn copy_local_csv_files(workspace: &Workspace, dir: &Path, make_copy: bool) -> Result<UploadReport, UploadError> {
    if !dir.is_dir() {
        return Err(UploadError::NotADirectory(dir.display().to_string()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.file_name().map(|name| is_csv(&name.to_string_lossy())).unwrap_or(false))
        .collect();
    files.sort();

    let mut report = UploadReport::default();
    if files.is_empty() {
        report.warnings.push("No CSV files found in specified folder.".to_string());
        return Ok(report);
    }

    let csv_dir = workspace.csv_dir();
    fs::create_dir_all(&csv_dir).map_err(io_error(&csv_dir))?;

    if make_copy {
        for path in files {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let target = csv_dir.join(&name);
            fs::copy(&path, &target).map_err(io_error(&path))?;
            report.saved.push(name);
        }
    } else {
        let list_path = csv_dir.join(EXTERNAL_FILES);
        let listed = fs::read_to_string(&list_path).unwrap_or_default();
        let mut list = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&list_path)
            .map_err(io_error(&list_path))?;
        for path in files {
            let line = path.display().to_string();
            if listed.lines().any(|existing| existing == line) {
                report.skipped.push(format!("{} is already linked", line));
                continue;
            }
            writeln!(list, "{}", line).map_err(io_error(&list_path))?;
            report.saved.push(line);
        }
    }

    info!("Added {} local CSV files from {}", report.saved.len(), dir.display());
    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub references_dropped: usize,
}

fn refers_to(value: &str, names: &[String]) -> bool {
    names.iter().any(|name| {
        value == name
            || Path::new(value)
                .file_name()
                .map(|file| file.to_string_lossy() == name.as_str())
                .unwrap_or(false)
    })
}

/// Removes references to deleted files: list items are dropped, and a bundle whose
/// input CSV was deleted is discarded so it cannot be run against a missing file.
fn drop_references(bundles: &mut HashMap<Page, ParamBundle>, names: &[String]) -> usize {
    let mut dropped = 0;
    for bundle in bundles.values_mut() {
        dropped += bundle.retain_list_items(|_| true, |item| !refers_to(item, names));
    }

    let stale: Vec<Page> = bundles
        .iter()
        .filter(|(_, bundle)| {
            CSV_PATH_KEYS
                .iter()
                .filter_map(|key| bundle.get_str(key))
                .any(|value| refers_to(value, names))
        })
        .map(|(page, _)| *page)
        .collect();
    for page in stale {
        bundles.remove(&page);
        dropped += 1;
    }
    dropped
}

pub fn remove_selected_csv_files(
    workspace: &Workspace,
    names: &[String],
    bundles: &mut HashMap<Page, ParamBundle>,
) -> Result<RemovalReport, UploadError> {
    let csv_dir = workspace.csv_dir();
    let mut report = RemovalReport::default();

    for name in names.iter().filter_map(|name| clean_name(name)) {
        let target = csv_dir.join(&name);
        if !target.is_file() {
            warn!("Asked to remove {} which does not exist", target.display());
            continue;
        }
        fs::remove_file(&target).map_err(io_error(&target))?;
        report.removed.push(name);
    }

    report.references_dropped = drop_references(bundles, &report.removed);
    info!("Removed {} CSV files", report.removed.len());
    Ok(report)
}

/// Removes every top-level file of `csv-files/`; derived output folders stay.
pub fn remove_all_csv_files(
    workspace: &Workspace,
    bundles: &mut HashMap<Page, ParamBundle>,
) -> Result<RemovalReport, UploadError> {
    let csv_names = workspace.list_csv_files().map_err(io_error(workspace.root()))?;
    let mut report = remove_selected_csv_files(workspace, &csv_names, bundles)?;

    let list_path = workspace.csv_dir().join(EXTERNAL_FILES);
    if list_path.exists() {
        fs::remove_file(&list_path).map_err(io_error(&list_path))?;
    }

    for bundle in bundles.values_mut() {
        report.references_dropped += bundle.retain_list_items(|key| key.contains("csv"), |_| false);
    }
    Ok(report)
}

/// Sends each saved upload to the analysis service so it sees the same files.
pub async fn forward_uploads<B: AnalysisBackend>(
    backend: &B,
    url: &str,
    workspace: &Workspace,
    files: &[UploadedFile],
    saved: &[String],
) -> Vec<Notice> {
    let target_dir = workspace.csv_dir().display().to_string();
    let mut notices = Vec::new();

    for file in files {
        let Some(name) = clean_name(&file.name) else {
            continue;
        };
        if !saved.contains(&name) {
            continue;
        }
        match backend.forward_csv(url, &name, file.bytes.clone(), &target_dir).await {
            Ok(_) => notices.push(Notice::success(format!("{} uploaded to the analysis service successfully!", name))),
            Err(e) => notices.push(Notice::error(format!("Failed to upload {}: {}", name, e))),
        }
    }
    notices
}
