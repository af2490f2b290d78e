use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

pub const CSV_DIR: &str = "csv-files";
pub const DEG_DIR: &str = "Deg";
pub const COMBO_NAMES_FILE: &str = "combo_names.csv";
pub const ANALYSIS_INFO_FILE: &str = "analysis_info.csv";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(CSV_DIR))?;
        Ok(Workspace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.root.join(CSV_DIR)
    }

    pub fn csv_output_dir(&self) -> PathBuf {
        self.csv_dir().join("output")
    }

    pub fn deg_dir(&self) -> PathBuf {
        self.root.join(DEG_DIR)
    }

    pub fn combo_names_csv(&self) -> PathBuf {
        self.deg_dir().join(COMBO_NAMES_FILE)
    }

    pub fn analysis_info_csv(&self) -> PathBuf {
        self.csv_output_dir().join(ANALYSIS_INFO_FILE)
    }

    pub fn gsea_results_dir(&self) -> PathBuf {
        self.root.join("gsea-results")
    }

    pub fn list_csv_files(&self) -> io::Result<Vec<String>> {
        let csv_dir = self.csv_dir();
        if !csv_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&csv_dir)?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| name.to_lowercase().ends_with(".csv"))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Maps a browser-supplied relative path into the workspace; absolute paths and `..` are refused.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !safe || relative.as_os_str().is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }

    pub fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root).ok().map(|relative| {
            relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
    }
}

pub fn reset_directory(path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    fs::create_dir_all(path)
}

pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lists_only_csv_files_sorted() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::write(workspace.csv_dir().join("b.csv"), "x").unwrap();
        fs::write(workspace.csv_dir().join("a.CSV"), "x").unwrap();
        fs::write(workspace.csv_dir().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(workspace.csv_dir().join("output")).unwrap();

        assert_eq!(workspace.list_csv_files().unwrap(), vec!["a.CSV", "b.csv"]);
    }

    #[test]
    fn resolve_refuses_escaping_paths() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();

        assert_eq!(
            workspace.resolve("Deg/FC1.5_p0.05/filtered_gene_list.csv"),
            Some(dir.path().join("Deg/FC1.5_p0.05/filtered_gene_list.csv"))
        );
        assert_eq!(workspace.resolve("../etc/passwd"), None);
        assert_eq!(workspace.resolve("/etc/passwd"), None);
        assert_eq!(workspace.resolve(""), None);
    }

    #[test]
    fn relative_uses_forward_slashes() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let path = workspace.join("Cnet").join("FC2_p0.01").join("cnet_BP.svg");
        assert_eq!(workspace.relative(&path).unwrap(), "Cnet/FC2_p0.01/cnet_BP.svg");
    }

    #[test]
    fn reset_directory_empties_contents() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Deg");
        fs::create_dir_all(target.join("old")).unwrap();
        fs::write(target.join("old").join("x.csv"), "1").unwrap();

        reset_directory(&target).unwrap();
        assert!(target.is_dir());
        assert_eq!(fs::read_dir(&target).unwrap().count(), 0);
        assert_eq!(file_stem("sample.csv"), "sample");
    }
}
