use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use log::{error, info};
use thiserror::Error;
use crate::analysis::backend::{AnalysisBackend, BackendError, BackendReply, JobRequest};
use crate::analysis::pages::{ItemKind, Page, ReplyKind, ResultLayout, ONTOLOGIES};
use crate::analysis::params::ParamBundle;
use crate::analysis::session::Notice;
use crate::parsers::settings_parser::Settings;
use crate::utils::archive::{build_download, unpack_archive, ArchiveError, Download};
use crate::utils::workspace::Workspace;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("Please configure parameters first in the 'Configure' tab.")]
    NotConfigured,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("failed to extract results: {0}")]
    Archive(#[from] ArchiveError),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("no output location for {0}; configure the page first")]
    NoOutput(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Message {
        message: Option<String>,
        stdout: Option<String>,
    },
    Saved {
        path: PathBuf,
    },
    Unpacked {
        dir: PathBuf,
        entries: Vec<String>,
    },
}

/// Sends the stored bundle of `page` and stores whatever comes back in the workspace.
/// Any error leaves the workspace as it was.
pub async fn run_page<B: AnalysisBackend>(
    backend: &B,
    settings: &Settings,
    page: Page,
    workspace: &Workspace,
    bundle: Option<&ParamBundle>,
) -> Result<RunOutcome, RunError> {
    let bundle = bundle.ok_or(RunError::NotConfigured)?;
    let request = JobRequest::for_page(page, settings, bundle.clone());
    info!("Running {} against {}", page.key(), request.url);

    match backend.submit(request).await? {
        BackendReply::Message { message, stdout, .. } => Ok(RunOutcome::Message { message, stdout }),
        BackendReply::Payload(bytes) if page.reply() == ReplyKind::Document => {
            let path = page
                .bundle_document_path(workspace, Some(bundle))
                .ok_or_else(|| RunError::NoOutput(page.key().to_string()))?;
            write_document(&path, &bytes)?;
            info!("Saved {} ({} bytes)", path.display(), bytes.len());
            Ok(RunOutcome::Saved { path })
        }
        BackendReply::Payload(bytes) => {
            let dir = page
                .output_dir(workspace, Some(bundle))
                .ok_or_else(|| RunError::NoOutput(page.key().to_string()))?;
            let archive_name = match page.reply() {
                ReplyKind::Archive { archive_name } => archive_name.to_string(),
                _ => format!("{}.zip", page.key()),
            };
            let entries = unpack_archive(&bytes, &dir, &archive_name)?;
            Ok(RunOutcome::Unpacked { dir, entries })
        }
    }
}

fn write_document(path: &Path, bytes: &[u8]) -> Result<(), RunError> {
    let io_error = |source: io::Error| RunError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, bytes).map_err(io_error)
}

pub fn run_notices(page: Page, result: &Result<RunOutcome, RunError>) -> Vec<Notice> {
    match result {
        Ok(RunOutcome::Message { message, stdout }) => {
            let mut notices = vec![Notice::success(
                message
                    .clone()
                    .unwrap_or_else(|| format!("{} completed successfully!", page.title())),
            )];
            if let Some(stdout) = stdout {
                notices.push(Notice::info(stdout.clone()));
            }
            notices
        }
        Ok(RunOutcome::Saved { path }) => {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            vec![Notice::success(format!("{} generated: {}", page.title(), name))]
        }
        Ok(RunOutcome::Unpacked { dir, entries }) => vec![Notice::success(format!(
            "{} completed. {} files extracted to {}",
            page.title(),
            entries.len(),
            dir.display()
        ))],
        Err(RunError::NotConfigured) => vec![Notice::warning(RunError::NotConfigured.to_string())],
        Err(e) => {
            error!("{} failed: {}", page.key(), e);
            vec![Notice::error(format!("Error: {}", e))]
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultItem {
    Present {
        label: String,
        path: PathBuf,
        kind: ItemKind,
    },
    Missing {
        label: String,
    },
}

impl ResultItem {
    fn expected(label: impl Into<String>, path: PathBuf, kind: ItemKind) -> Self {
        let label = label.into();
        if path.is_file() {
            ResultItem::Present { label, path, kind }
        } else {
            ResultItem::Missing {
                label: format!("{} not found", label),
            }
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ResultItem::Present { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultSection {
    pub title: String,
    pub items: Vec<ResultItem>,
}

impl ResultSection {
    fn new(title: impl Into<String>, items: Vec<ResultItem>) -> Self {
        ResultSection {
            title: title.into(),
            items,
        }
    }

    fn missing(title: impl Into<String>, label: impl Into<String>) -> Self {
        ResultSection::new(title, vec![ResultItem::Missing { label: label.into() }])
    }
}

fn kind_for(ext: &str) -> ItemKind {
    if ext.eq_ignore_ascii_case("csv") {
        ItemKind::Table
    } else {
        ItemKind::Image
    }
}

fn scan_files(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .map(|found| found.to_string_lossy().eq_ignore_ascii_case(ext))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn present(paths: Vec<PathBuf>, kind: ItemKind) -> Vec<ResultItem> {
    paths
        .into_iter()
        .map(|path| ResultItem::Present {
            label: file_label(&path),
            path,
            kind,
        })
        .collect()
}

/// Expected result files of `page`, each marked present or missing.
pub fn list_results(page: Page, workspace: &Workspace, bundle: Option<&ParamBundle>) -> Vec<ResultSection> {
    match page.layout(workspace, bundle) {
        ResultLayout::Document { path, caption } => {
            vec![ResultSection::new(caption, vec![ResultItem::expected(file_label(&path), path, ItemKind::Image)])]
        }
        ResultLayout::ComboFiles { root, combos, pattern, kind } => {
            if combos.is_empty() {
                return vec![ResultSection::missing(page.title(), "No combos available")];
            }
            combos
                .iter()
                .map(|combo| {
                    let combo_dir = root.join(combo);
                    let items = if pattern.contains("{ont}") {
                        ONTOLOGIES
                            .iter()
                            .map(|ont| {
                                let file = pattern.replace("{ont}", ont);
                                ResultItem::expected(file.clone(), combo_dir.join(&file), kind)
                            })
                            .collect()
                    } else {
                        vec![ResultItem::expected(pattern.clone(), combo_dir.join(&pattern), kind)]
                    };
                    ResultSection::new(combo.clone(), items)
                })
                .collect()
        }
        ResultLayout::OntologyFiles { dir, pattern, kind } => ONTOLOGIES
            .iter()
            .map(|ont| {
                let file = pattern.replace("{ont}", ont);
                ResultSection::new(*ont, vec![ResultItem::expected(file.clone(), dir.join(&file), kind)])
            })
            .collect(),
        ResultLayout::OntologyScan { dir, ext, delimited } => {
            let files = scan_files(&dir, &ext);
            ONTOLOGIES
                .iter()
                .map(|ont| {
                    let needle = if delimited { format!("_{}_", ont) } else { ont.to_string() };
                    let matching: Vec<PathBuf> = files
                        .iter()
                        .filter(|path| file_label(path).contains(&needle))
                        .cloned()
                        .collect();
                    if matching.is_empty() {
                        ResultSection::missing(*ont, format!("No {} results found", ont))
                    } else {
                        ResultSection::new(*ont, present(matching, kind_for(&ext)))
                    }
                })
                .collect()
        }
        ResultLayout::Scan { dir, ext, contains } => {
            let files: Vec<PathBuf> = scan_files(&dir, &ext)
                .into_iter()
                .filter(|path| contains.as_ref().map_or(true, |needle| file_label(path).contains(needle.as_str())))
                .collect();
            if files.is_empty() {
                vec![ResultSection::missing(page.title(), format!("No results found in {}", dir.display()))]
            } else {
                vec![ResultSection::new(page.title(), present(files, kind_for(&ext)))]
            }
        }
        ResultLayout::SubdirScan { dir, ext } => {
            let mut subdirs: Vec<PathBuf> = fs::read_dir(&dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| entry.path())
                        .filter(|path| path.is_dir())
                        .collect()
                })
                .unwrap_or_default();
            subdirs.sort();
            if subdirs.is_empty() {
                return vec![ResultSection::missing(page.title(), format!("No results found in {}", dir.display()))];
            }
            subdirs
                .into_iter()
                .map(|subdir| {
                    let files = scan_files(&subdir, &ext);
                    let title = file_label(&subdir);
                    if files.is_empty() {
                        ResultSection::missing(title, format!("No .{} files found", ext))
                    } else {
                        ResultSection::new(title, present(files, kind_for(&ext)))
                    }
                })
                .collect()
        }
        ResultLayout::Unavailable { reason } => vec![ResultSection::missing(page.title(), reason)],
    }
}

pub fn prepare_download(
    page: Page,
    workspace: &Workspace,
    bundle: Option<&ParamBundle>,
) -> Result<Option<Download>, ArchiveError> {
    build_download(&page.download_plan(workspace, bundle))
}
