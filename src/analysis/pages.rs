use std::env;
use std::path::PathBuf;
use std::time::Duration;
use log::warn;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use crate::analysis::params::ParamBundle;
use crate::parsers::combo_parser::{parse_combos, read_combo_names, select_combos};
use crate::parsers::settings_parser::Settings;
use crate::utils::archive::DownloadPlan;
use crate::utils::workspace::{file_stem, Workspace};

pub const ONTOLOGIES: [&str; 3] = ["BP", "CC", "MF"];
pub const SVG_MIME: &str = "image/svg+xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Page {
    Deg,
    Volcano,
    EnhancedVolcano,
    Pca,
    Heatmap,
    Enrichplot,
    Cnetplot,
    Emapplot,
    Gsego,
    GseaplotTotal,
    GseaplotTerm,
    Ridgeplot,
    PathwayGene,
    StringNetwork,
    Enrichkegg,
    EnrichkeggDotplot,
    Pathview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Section {
    BasicAnalysis,
    Deg,
    GoPathway,
    GseaGo,
    Network,
    Kegg,
}

impl Section {
    pub fn title(&self) -> &'static str {
        match self {
            Section::BasicAnalysis => "Basic analysis",
            Section::Deg => "DEG",
            Section::GoPathway => "GO Pathway analysis",
            Section::GseaGo => "GSEA GO",
            Section::Network => "Network",
            Section::Kegg => "KEGG Pathway analysis",
        }
    }

    pub fn pages(&self) -> Vec<Page> {
        Page::iter().filter(|page| page.section() == *self).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    Form,
}

/// What a successful run is expected to send back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A JSON status message; figures are written by the backend itself.
    Message,
    /// A ZIP archive unpacked into the output directory.
    Archive { archive_name: &'static str },
    /// A single rendered figure stored next to the input CSV's name.
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Image,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultLayout {
    Document {
        path: PathBuf,
        caption: String,
    },
    /// `root/<combo>/<pattern>`; a `{ont}` placeholder expands to BP/CC/MF.
    ComboFiles {
        root: PathBuf,
        combos: Vec<String>,
        pattern: String,
        kind: ItemKind,
    },
    /// `dir/<pattern>` with `{ont}` expanded.
    OntologyFiles {
        dir: PathBuf,
        pattern: String,
        kind: ItemKind,
    },
    /// Files in `dir` with extension `ext`, grouped by the ontology code in their name.
    OntologyScan {
        dir: PathBuf,
        ext: String,
        delimited: bool,
    },
    Scan {
        dir: PathBuf,
        ext: String,
        contains: Option<String>,
    },
    /// Each subdirectory of `dir` listed with its `ext` files.
    SubdirScan {
        dir: PathBuf,
        ext: String,
    },
    Unavailable {
        reason: String,
    },
}

impl Page {
    pub fn key(&self) -> &str {
        self.as_ref()
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Deg => "DEG",
            Page::Volcano => "Volcano Plot",
            Page::EnhancedVolcano => "EnhancedVolcano Plot",
            Page::Pca => "PCA",
            Page::Heatmap => "Heatmap",
            Page::Enrichplot => "Enrichplot",
            Page::Cnetplot => "Cnetplot",
            Page::Emapplot => "Emapplot",
            Page::Gsego => "GseGO",
            Page::GseaplotTotal => "GSEA Plot (total)",
            Page::GseaplotTerm => "GSEA Term Plot",
            Page::Ridgeplot => "Ridgeplot",
            Page::PathwayGene => "Heatmaplike functional classification",
            Page::StringNetwork => "STRING Network",
            Page::Enrichkegg => "Enrichkegg",
            Page::EnrichkeggDotplot => "Enrichkegg Dotplot",
            Page::Pathview => "Pathview",
        }
    }

    pub fn section(&self) -> Section {
        match self {
            Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => Section::BasicAnalysis,
            Page::Deg => Section::Deg,
            Page::Enrichplot | Page::Cnetplot | Page::Emapplot => Section::GoPathway,
            Page::Gsego | Page::GseaplotTotal | Page::GseaplotTerm | Page::Ridgeplot | Page::PathwayGene => {
                Section::GseaGo
            }
            Page::StringNetwork => Section::Network,
            Page::Enrichkegg | Page::EnrichkeggDotplot | Page::Pathview => Section::Kegg,
        }
    }

    pub fn endpoint_var(&self) -> &'static str {
        match self {
            Page::Deg => "FASTAPI_DEG",
            Page::Volcano | Page::EnhancedVolcano => "FASTAPI_VOLCANO",
            Page::Pca => "FASTAPI_PCA",
            Page::Heatmap => "FASTAPI_HEATMAP",
            Page::Enrichplot => "FASTAPI_ENRICHPLOT",
            Page::Cnetplot => "FASTAPI_CNETPLOT",
            Page::Emapplot => "FASTAPI_EMAPPLOT",
            Page::Gsego => "FASTAPI_GSEGO",
            Page::GseaplotTotal => "FASTAPI_GSEAPLOT_TOTAL",
            Page::GseaplotTerm => "FASTAPI_GSEAPLOT_TERM",
            Page::Ridgeplot => "FASTAPI_RIDGEPLOT",
            Page::PathwayGene => "FASTAPI_PATHWAY_GENE",
            Page::StringNetwork => "FASTAPI_STRING",
            Page::Enrichkegg => "FASTAPI_ENRICHKEGG",
            Page::EnrichkeggDotplot => "FASTAPI_ENRICHKEGG_DOTPLOT",
            Page::Pathview => "FASTAPI_PATHVIEW",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Page::Deg => "http://design-pathway-backend:8000/api/deg/",
            Page::Volcano | Page::EnhancedVolcano => "http://fastapi:8000/api/volcano/",
            Page::Pca => "http://localhost:8000/api/pca/run-pca",
            Page::Heatmap => "http://design-pathway-backend:8000/api/heatmap/",
            Page::Enrichplot => "http://design-pathway-backend:8000/api/enrichgo/",
            Page::Cnetplot => "http://fastapi:8000/run-cnetplot/",
            Page::Emapplot => "http://fastapi:8000/run-emapplot/",
            Page::Gsego => "http://design-pathway-backend:8000/api/gsego",
            Page::GseaplotTotal => "http://localhost:8000/run_gseaplot_total",
            Page::GseaplotTerm => "http://localhost:8000/run_gseaplot_term",
            Page::Ridgeplot => "http://design-pathway-backend:8000/api/ridgeplot",
            Page::PathwayGene => "http://localhost:8000/api/pathway_gene/",
            Page::StringNetwork => "http://localhost:8000/run_string",
            Page::Enrichkegg => "http://design-pathway-backend:8000/api/enrichkegg/",
            Page::EnrichkeggDotplot => "http://design-pathway-backend:8000/api/enrichkegg-dotplot/",
            Page::Pathview => "http://design-pathway-backend:8000/api/pathview/",
        }
    }

    pub fn endpoint(&self, settings: &Settings) -> String {
        self.endpoint_with(settings, |var| env::var(var).ok())
    }

    pub fn endpoint_with<F>(&self, settings: &Settings, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        settings.resolve_endpoint(self.key(), self.endpoint_var(), self.default_endpoint(), lookup)
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Page::Deg | Page::Volcano | Page::EnhancedVolcano | Page::Heatmap => Encoding::Form,
            _ => Encoding::Json,
        }
    }

    /// Fixed per-page timeout; `None` falls back to the configured default.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Page::Enrichplot | Page::Cnetplot | Page::Emapplot => Some(Duration::from_secs(300)),
            Page::GseaplotTotal
            | Page::GseaplotTerm
            | Page::Ridgeplot
            | Page::StringNetwork
            | Page::Enrichkegg
            | Page::EnrichkeggDotplot
            | Page::Pathview => Some(Duration::from_secs(600)),
            _ => None,
        }
    }

    pub fn effective_timeout(&self, settings: &Settings) -> Duration {
        self.timeout().unwrap_or_else(|| settings.default_timeout())
    }

    pub fn reply(&self) -> ReplyKind {
        match self {
            Page::Deg => ReplyKind::Archive { archive_name: "deg.zip" },
            Page::Enrichplot => ReplyKind::Archive { archive_name: "enrichgo.zip" },
            Page::Gsego => ReplyKind::Archive { archive_name: "gsego.zip" },
            Page::Ridgeplot => ReplyKind::Archive { archive_name: "ridgeplot_results.zip" },
            Page::PathwayGene => ReplyKind::Archive { archive_name: "heatplot_results.zip" },
            Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => ReplyKind::Document,
            _ => ReplyKind::Message,
        }
    }

    pub fn run_label(&self) -> String {
        format!("Run {}", self.title())
    }

    fn document_suffix(&self) -> Option<&'static str> {
        match self {
            Page::Volcano => Some("_volcano.svg"),
            Page::EnhancedVolcano => Some("_enhanced_volcano.svg"),
            Page::Pca => Some("_PCA.svg"),
            Page::Heatmap => Some("_heatmap.svg"),
            _ => None,
        }
    }

    /// `<workspace>/<csv stem><suffix>` for pages that render one figure per input CSV.
    pub fn document_path(&self, workspace: &Workspace, csv_name: &str) -> Option<PathBuf> {
        self.document_suffix()
            .map(|suffix| workspace.join(format!("{}{}", file_stem(csv_name), suffix)))
    }

    pub fn bundle_document_path(&self, workspace: &Workspace, bundle: Option<&ParamBundle>) -> Option<PathBuf> {
        let csv_path = bundle?.get_str("csv_path")?;
        let csv_name = PathBuf::from(csv_path)
            .file_name()?
            .to_string_lossy()
            .into_owned();
        self.document_path(workspace, &csv_name)
    }

    /// Directory owned by this page's results; `None` when it depends on an unconfigured choice.
    pub fn output_dir(&self, workspace: &Workspace, bundle: Option<&ParamBundle>) -> Option<PathBuf> {
        let dir = match self {
            Page::Deg => workspace.deg_dir(),
            Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => workspace.root().to_path_buf(),
            Page::Enrichplot => workspace.join("Enrichment").join("out"),
            Page::Cnetplot => workspace.join("Cnet"),
            Page::Emapplot => workspace.join("Emap").join("emapplots"),
            Page::Gsego => {
                let method = bundle?.get_str("analysis_method")?;
                workspace.csv_output_dir().join(method).join("gsego")
            }
            Page::GseaplotTotal => workspace.gsea_results_dir().join("gseaplot_total"),
            Page::GseaplotTerm => workspace.gsea_results_dir().join("gseaplot"),
            Page::Ridgeplot => workspace.join("Ridgeplot"),
            Page::PathwayGene => workspace.gsea_results_dir().join("heatplot"),
            Page::StringNetwork => workspace.join("STRING"),
            Page::Enrichkegg | Page::EnrichkeggDotplot => workspace.join("Enrichkegg"),
            Page::Pathview => {
                let combo = bundle?.get_str("combo")?;
                workspace.join("pathview").join(combo)
            }
        };
        Some(dir)
    }

    pub fn layout(&self, workspace: &Workspace, bundle: Option<&ParamBundle>) -> ResultLayout {
        if let Some(suffix) = self.document_suffix() {
            return match self.bundle_document_path(workspace, bundle) {
                Some(path) => ResultLayout::Document {
                    path,
                    caption: self.title().to_string(),
                },
                None => ResultLayout::Unavailable {
                    reason: format!("Configure an input CSV to locate the {} figure ({}).", self.title(), suffix),
                },
            };
        }

        let Some(dir) = self.output_dir(workspace, bundle) else {
            return ResultLayout::Unavailable {
                reason: "Configure this page first to locate its results.".to_string(),
            };
        };

        let combo_files = |pattern: &str, kind: ItemKind| ResultLayout::ComboFiles {
            root: dir.clone(),
            combos: page_combos(workspace, bundle),
            pattern: pattern.to_string(),
            kind,
        };

        match self {
            Page::Deg => combo_files("filtered_gene_list.csv", ItemKind::Table),
            Page::Enrichplot => combo_files("GO_{ont}_result.csv", ItemKind::Table),
            Page::Cnetplot => combo_files("cnet_{ont}.svg", ItemKind::Image),
            Page::Emapplot => combo_files("emap_{ont}.svg", ItemKind::Image),
            Page::Enrichkegg => combo_files("KEGG_result.csv", ItemKind::Table),
            Page::EnrichkeggDotplot => combo_files("figure/Enrichkegg_dotplot.svg", ItemKind::Image),
            Page::Gsego => ResultLayout::OntologyFiles {
                dir,
                pattern: "gse_{ont}.csv".to_string(),
                kind: ItemKind::Table,
            },
            Page::GseaplotTotal => ResultLayout::OntologyScan {
                dir,
                ext: "svg".to_string(),
                delimited: true,
            },
            Page::Ridgeplot | Page::PathwayGene => ResultLayout::OntologyScan {
                dir,
                ext: "svg".to_string(),
                delimited: false,
            },
            Page::GseaplotTerm => ResultLayout::Scan {
                dir,
                ext: "svg".to_string(),
                contains: None,
            },
            Page::Pathview => ResultLayout::Scan {
                dir,
                ext: "png".to_string(),
                contains: Some(".FC".to_string()),
            },
            Page::StringNetwork => ResultLayout::SubdirScan {
                dir,
                ext: "svg".to_string(),
            },
            Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => ResultLayout::Unavailable {
                reason: String::new(),
            },
        }
    }

    pub fn download_plan(&self, workspace: &Workspace, bundle: Option<&ParamBundle>) -> DownloadPlan {
        if self.document_suffix().is_some() {
            return match self.bundle_document_path(workspace, bundle) {
                Some(path) => DownloadPlan::SingleFile {
                    path,
                    mime: SVG_MIME.to_string(),
                },
                None => DownloadPlan::Nothing,
            };
        }

        let Some(dir) = self.output_dir(workspace, bundle) else {
            return DownloadPlan::Nothing;
        };

        let subfolders = |file_name: &str| DownloadPlan::Subfolders {
            root: dir.clone(),
            names: page_combos(workspace, bundle),
            file_name: file_name.to_string(),
        };
        let directory = |file_name: String| DownloadPlan::Directory {
            dir: dir.clone(),
            file_name,
        };

        match self {
            Page::Deg => subfolders("Deg_combos.zip"),
            Page::Enrichplot => subfolders("GO_enrichment_combos.zip"),
            Page::Cnetplot => subfolders("Cnetplots_combos.zip"),
            Page::Emapplot => subfolders("Emapplots_combos.zip"),
            Page::Gsego => directory("GSEA_GO_results.zip".to_string()),
            Page::GseaplotTotal => directory("gseaplot2_total_results.zip".to_string()),
            Page::GseaplotTerm => directory("gseaplot_term_results.zip".to_string()),
            Page::Ridgeplot => directory("ridgeplot_results.zip".to_string()),
            Page::PathwayGene => directory("heatplot_results.zip".to_string()),
            Page::StringNetwork => directory("STRING_results.zip".to_string()),
            Page::Pathview => {
                let combo = bundle.and_then(|bundle| bundle.get_str("combo")).unwrap_or("pathview");
                directory(format!("pathview_{}.zip", combo))
            }
            Page::Enrichkegg => DownloadPlan::MatchingFiles {
                root: dir.clone(),
                suffix: "KEGG_result.csv".to_string(),
                file_name: "Enrichkegg_results.zip".to_string(),
            },
            Page::EnrichkeggDotplot => DownloadPlan::MatchingFiles {
                root: dir.clone(),
                suffix: "Enrichkegg_dotplot.svg".to_string(),
                file_name: "Enrichkegg_dotplots.zip".to_string(),
            },
            Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => DownloadPlan::Nothing,
        }
    }
}

/// Combos a page works on: an explicit `combo_names` list, else the ones matching the
/// configured thresholds, else every combo of the DEG run.
pub fn page_combos(workspace: &Workspace, bundle: Option<&ParamBundle>) -> Vec<String> {
    if let Some(bundle) = bundle {
        let explicit = bundle.get_list("combo_names");
        if !explicit.is_empty() {
            return explicit;
        }
    }

    let names = match read_combo_names(workspace.combo_names_csv()) {
        Ok(names) => names,
        Err(e) => {
            warn!("No combos for {}: {}", workspace.root().display(), e);
            return Vec::new();
        }
    };

    match bundle.and_then(|bundle| Some((bundle.get_f64("fc_threshold")?, bundle.get_f64("pval_threshold")?))) {
        Some((fc, pval)) => {
            let (combos, rejected) = parse_combos(&names);
            for e in rejected {
                warn!("Skipping combo: {}", e);
            }
            select_combos(&combos, fc, pval)
        }
        None => names,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::str::FromStr;
    use tempfile::tempdir;

    #[test]
    fn keys_round_trip_through_strum() {
        for page in Page::iter() {
            assert_eq!(Page::from_str(page.key()).unwrap(), page);
        }
        assert_eq!(Page::StringNetwork.key(), "string_network");
        assert!(Page::from_str("unknown").is_err());
    }

    #[test]
    fn every_page_belongs_to_a_section() {
        let total: usize = Section::iter().map(|section| section.pages().len()).sum();
        assert_eq!(total, Page::iter().count());
    }

    #[test]
    fn encoding_and_timeouts_follow_the_catalogue() {
        let settings = Settings::default();
        assert_eq!(Page::Deg.encoding(), Encoding::Form);
        assert_eq!(Page::Gsego.encoding(), Encoding::Json);
        assert_eq!(Page::Cnetplot.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(Page::Gsego.effective_timeout(&settings), Duration::from_secs(600));
        assert_eq!(
            Page::Deg.endpoint_with(&settings, |_| None),
            "http://design-pathway-backend:8000/api/deg/"
        );
    }

    #[test]
    fn document_path_uses_csv_stem() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        assert_eq!(
            Page::Pca.document_path(&workspace, "counts.csv"),
            Some(dir.path().join("counts_PCA.svg"))
        );
        assert_eq!(Page::Deg.document_path(&workspace, "counts.csv"), None);
    }

    #[test]
    fn gsego_output_depends_on_method() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        assert_eq!(Page::Gsego.output_dir(&workspace, None), None);

        let mut bundle = ParamBundle::new();
        bundle.insert("analysis_method", "wald");
        assert_eq!(
            Page::Gsego.output_dir(&workspace, Some(&bundle)),
            Some(dir.path().join("csv-files").join("output").join("wald").join("gsego"))
        );
    }

    #[test]
    fn page_combos_filter_by_thresholds() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::create_dir_all(workspace.deg_dir()).unwrap();
        fs::write(
            workspace.combo_names_csv(),
            "combo\nFC1.5_p0.05\nFC1.5_p0.01\nFC2_p0.05\n",
        )
        .unwrap();

        assert_eq!(page_combos(&workspace, None).len(), 3);

        let mut bundle = ParamBundle::new();
        bundle.insert("fc_threshold", 1.5);
        bundle.insert("pval_threshold", 0.05);
        assert_eq!(page_combos(&workspace, Some(&bundle)), vec!["FC1.5_p0.05"]);

        bundle.insert("combo_names", vec!["FC2_p0.05".to_string()]);
        assert_eq!(page_combos(&workspace, Some(&bundle)), vec!["FC2_p0.05"]);
    }

    #[test]
    fn malformed_combo_is_listed_but_skipped_by_thresholds() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::create_dir_all(workspace.deg_dir()).unwrap();
        fs::write(workspace.combo_names_csv(), "combo\nFC2_p0.01\nbadcombo\n").unwrap();

        assert_eq!(page_combos(&workspace, None), vec!["FC2_p0.01", "badcombo"]);

        let mut bundle = ParamBundle::new();
        bundle.insert("fc_threshold", 2.0);
        bundle.insert("pval_threshold", 0.01);
        assert_eq!(page_combos(&workspace, Some(&bundle)), vec!["FC2_p0.01"]);
    }
}
