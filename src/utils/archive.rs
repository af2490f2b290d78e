use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use log::info;
use tempfile::TempDir;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};
use crate::utils::workspace::reset_directory;

pub const ZIP_MIME: &str = "application/zip";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive entry '{0}' escapes the output directory")]
    UnsafeEntry(String),
}

/// Replaces `output_dir` with the content of a ZIP archive.
///
/// The directory is deleted and recreated, the bytes are written to
/// `output_dir/archive_name`, extracted in place and the archive file removed.
/// Returns the extracted entry names as stored in the archive.
pub fn unpack_archive(
    bytes: &[u8],
    output_dir: &Path,
    archive_name: &str,
) -> Result<Vec<String>, ArchiveError> {
    reset_directory(output_dir)?;

    let archive_path = output_dir.join(archive_name);
    fs::write(&archive_path, bytes)?;

    let extracted = extract_zip(&archive_path, output_dir);

    if archive_path.exists() {
        fs::remove_file(&archive_path)?;
    }

    let entries = extracted?;
    info!("Extracted {} entries into {}", entries.len(), output_dir.display());
    Ok(entries)
}

fn extract_zip(archive_path: &Path, output_dir: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut archive = ZipArchive::new(File::open(archive_path)?)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative: PathBuf = entry
            .enclosed_name()
            .map(Path::to_path_buf)
            .ok_or_else(|| ArchiveError::UnsafeEntry(entry.name().to_string()))?;
        let target = output_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
        }
        entries.push(entry.name().to_string());
    }

    Ok(entries)
}

fn collect_files(dir: &Path, prefix: &str, files: &mut Vec<(String, PathBuf)>, dirs: &mut Vec<String>) -> io::Result<()> {
    let mut children: Vec<_> = fs::read_dir(dir)?.filter_map(Result::ok).collect();
    children.sort_by_key(|entry| entry.file_name());

    for child in children {
        let name = child.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() { name } else { format!("{}/{}", prefix, name) };
        let path = child.path();
        if path.is_dir() {
            dirs.push(format!("{}/", relative));
            collect_files(&path, &relative, files, dirs)?;
        } else if path.is_file() {
            files.push((relative, path));
        }
    }
    Ok(())
}

/// Zips everything under `dir`, entry names relative to it.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>, ArchiveError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    collect_files(dir, "", &mut files, &mut dirs)?;

    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for name in dirs {
        writer.add_directory(name, options)?;
    }
    for (name, path) in files {
        writer.start_file(name, options)?;
        let mut content = Vec::new();
        File::open(&path)?.read_to_end(&mut content)?;
        writer.write_all(&content)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Copies the named subfolders of `root` that exist into a scratch directory and zips it.
/// Returns `None` when none of them exist.
pub fn pack_subfolders(root: &Path, names: &[String]) -> Result<Option<Vec<u8>>, ArchiveError> {
    let scratch = TempDir::new()?;
    let mut copied = 0;

    for name in names {
        let src = root.join(name);
        if src.is_dir() {
            copy_dir_recursive(&src, &scratch.path().join(name))?;
            copied += 1;
        }
    }

    if copied == 0 {
        return Ok(None);
    }
    pack_directory(scratch.path()).map(Some)
}

/// Zips every file under `root` whose name ends with `suffix`, keeping the relative layout.
pub fn pack_matching_files(root: &Path, suffix: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    collect_files(root, "", &mut files, &mut dirs)?;

    let scratch = TempDir::new()?;
    let mut copied = 0;
    for (relative, path) in files.iter().filter(|(relative, _)| relative.ends_with(suffix)) {
        let target = scratch.path().join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &target)?;
        copied += 1;
    }

    if copied == 0 {
        return Ok(None);
    }
    pack_directory(scratch.path()).map(Some)
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPlan {
    Subfolders {
        root: PathBuf,
        names: Vec<String>,
        file_name: String,
    },
    Directory {
        dir: PathBuf,
        file_name: String,
    },
    MatchingFiles {
        root: PathBuf,
        suffix: String,
        file_name: String,
    },
    SingleFile {
        path: PathBuf,
        mime: String,
    },
    Nothing,
}

#[derive(Debug, Clone)]
pub struct Download {
    pub file_name: String,
    pub mime: String,
    pub content: Vec<u8>,
}

impl Download {
    fn zip(file_name: &str, content: Vec<u8>) -> Self {
        Download {
            file_name: file_name.to_string(),
            mime: ZIP_MIME.to_string(),
            content,
        }
    }
}

pub fn build_download(plan: &DownloadPlan) -> Result<Option<Download>, ArchiveError> {
    match plan {
        DownloadPlan::Subfolders { root, names, file_name } => {
            Ok(pack_subfolders(root, names)?.map(|content| Download::zip(file_name, content)))
        }
        DownloadPlan::Directory { dir, file_name } => {
            if !dir.is_dir() || fs::read_dir(dir)?.next().is_none() {
                return Ok(None);
            }
            Ok(Some(Download::zip(file_name, pack_directory(dir)?)))
        }
        DownloadPlan::MatchingFiles { root, suffix, file_name } => {
            if !root.is_dir() {
                return Ok(None);
            }
            Ok(pack_matching_files(root, suffix)?.map(|content| Download::zip(file_name, content)))
        }
        DownloadPlan::SingleFile { path, mime } => {
            if !path.is_file() {
                return Ok(None);
            }
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".to_string());
            Ok(Some(Download {
                file_name,
                mime: mime.clone(),
                content: fs::read(path)?,
            }))
        }
        DownloadPlan::Nothing => Ok(None),
    }
}

pub fn archive_entries(bytes: &[u8]) -> Result<Vec<String>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        names.push(archive.by_index(index)?.name().to_string());
    }
    Ok(names)
}
