use std::collections::HashMap;
use std::path::Path;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use crate::analysis::pages::{Page, ONTOLOGIES};
use crate::analysis::params::{Field, ParamBundle};
use crate::parsers::combo_parser::{parse_combos, read_combo_names, select_combos, threshold_options, Combo};
use crate::parsers::table_parser::{count_rows, unique_column_values};
use crate::utils::workspace::Workspace;

lazy_static! {
    static ref PATHWAY_ID: Regex = Regex::new(r"^[a-z]{2,4}\d{5}$").unwrap();
}

pub const ORGDB_OPTIONS: [&str; 2] = ["org.Hs.eg.db", "org.Mm.eg.db"];
pub const TAXON_OPTIONS: [&str; 2] = ["9606", "10090"];
const CSV_KEYS: [&str; 2] = ["csv_path", "input_file"];

/// Raw form submission: field name to every value posted under it.
pub type FormInput = HashMap<String, Vec<String>>;

/// Workspace state the Configure stage depends on.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub csv_files: Vec<String>,
    /// Every name of the `combo` column, as written.
    pub combo_ids: Vec<String>,
    /// The names among `combo_ids` that carry parseable thresholds.
    pub combos: Vec<Combo>,
    pub methods: Vec<String>,
    pub warnings: Vec<String>,
    /// One entry per malformed combo name; never blocks a page.
    pub combo_warnings: Vec<String>,
}

impl PageContext {
    pub fn load(workspace: &Workspace) -> Self {
        let mut ctx = PageContext::default();

        match workspace.list_csv_files() {
            Ok(files) if files.is_empty() => {
                ctx.warnings
                    .push("No CSV files found in the workspace csv-files folder. Please upload a CSV file first.".to_string());
            }
            Ok(files) => ctx.csv_files = files,
            Err(e) => ctx.warnings.push(format!("Failed to list CSV files: {}", e)),
        }

        let combo_csv = workspace.combo_names_csv();
        if combo_csv.exists() {
            match read_combo_names(&combo_csv) {
                Ok(names) => {
                    let (combos, rejected) = parse_combos(&names);
                    ctx.combo_warnings = rejected
                        .iter()
                        .map(|e| format!("Skipped combo name: {}", e))
                        .collect();
                    ctx.combo_ids = names;
                    ctx.combos = combos;
                }
                Err(e) => ctx.warnings.push(format!("Failed to read combo_names.csv: {}", e)),
            }
        } else {
            ctx.warnings
                .push("combo_names.csv not found in Deg directory. Run the DEG analysis first.".to_string());
        }

        let info_csv = workspace.analysis_info_csv();
        if info_csv.exists() {
            match unique_column_values(&info_csv, "analysis_type") {
                Ok(methods) => ctx.methods = methods,
                Err(e) => ctx.warnings.push(format!("Failed to read analysis_info.csv: {}", e)),
            }
        } else {
            ctx.warnings
                .push("analysis_info.csv not found. Run the DESeq2 analysis first.".to_string());
        }

        ctx
    }

    pub fn combo_names(&self) -> Vec<String> {
        self.combo_ids.clone()
    }

    fn threshold_fields(&self) -> Vec<Field> {
        let (fc_values, pval_values) = threshold_options(&self.combos);
        vec![
            Field::choice("fc_threshold", "Select FC threshold", to_options(&fc_values)),
            Field::choice("pval_threshold", "Select P-value threshold", to_options(&pval_values)),
        ]
    }
}

fn to_options(values: &[f64]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

fn owned(options: &[&str]) -> Vec<String> {
    options.iter().map(|option| option.to_string()).collect()
}

fn path_string(path: impl AsRef<Path>) -> String {
    path.as_ref().display().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prerequisite {
    CsvFiles,
    Combos,
    Methods,
}

impl Page {
    fn prerequisites(&self) -> &'static [Prerequisite] {
        match self {
            Page::Deg | Page::Volcano | Page::EnhancedVolcano | Page::Pca | Page::Heatmap => &[Prerequisite::CsvFiles],
            Page::Ridgeplot | Page::PathwayGene => &[Prerequisite::CsvFiles],
            Page::Enrichplot
            | Page::Cnetplot
            | Page::Emapplot
            | Page::StringNetwork
            | Page::Enrichkegg
            | Page::EnrichkeggDotplot => &[Prerequisite::Combos],
            Page::Pathview => &[Prerequisite::Combos, Prerequisite::CsvFiles],
            Page::Gsego => &[Prerequisite::Methods],
            Page::GseaplotTotal | Page::GseaplotTerm => &[],
        }
    }

    /// Warnings from `ctx` that concern this page.
    pub fn context_warnings(&self, ctx: &PageContext) -> Vec<String> {
        let mut warnings = Vec::new();
        for prerequisite in self.prerequisites() {
            let (missing, marker) = match prerequisite {
                Prerequisite::CsvFiles => (ctx.csv_files.is_empty(), "CSV"),
                Prerequisite::Combos => (ctx.combo_ids.is_empty(), "combo_names.csv"),
                Prerequisite::Methods => (ctx.methods.is_empty(), "analysis_info.csv"),
            };
            if missing {
                warnings.extend(ctx.warnings.iter().filter(|warning| warning.contains(marker)).cloned());
            }
        }
        if *self == Page::Gsego && ctx.methods.is_empty() && warnings.is_empty() {
            warnings.push("No analysis method found. Run the DESeq2 analysis first.".to_string());
        }
        warnings
    }

    /// Malformed combo names, reported on pages that work on combos.
    pub fn combo_warnings(&self, ctx: &PageContext) -> Vec<String> {
        if self.prerequisites().contains(&Prerequisite::Combos) {
            ctx.combo_warnings.clone()
        } else {
            Vec::new()
        }
    }

    /// User-facing options of this page, with choices filled from the workspace.
    pub fn fields(&self, ctx: &PageContext) -> Vec<Field> {
        let csv_choice = |name: &'static str| Field::choice(name, "Select CSV file", ctx.csv_files.clone());

        match self {
            Page::Deg => vec![
                csv_choice("csv_path"),
                Field::text("fc_input", "Fold Change thresholds (comma-separated)", "1.5,2"),
                Field::text("pval_input", "P-value thresholds (comma-separated)", "0.05,0.01"),
            ],
            Page::Volcano | Page::EnhancedVolcano => vec![
                csv_choice("csv_path"),
                Field::number("fc_cutoff", "Fold Change Cutoff (log2)", 1.0, 0.1),
                Field::number("pval_cutoff", "P-value Cutoff", 0.05, 0.0001),
            ],
            Page::Pca => vec![
                csv_choice("csv_path"),
                Field::number("width", "Plot Width", 8.0, 0.5),
                Field::number("height", "Plot Height", 6.0, 0.5),
                Field::integer("pointshape", "Point Shape", 16, None, None),
                Field::number("pointsize", "Point Size", 3.5, 0.5),
                Field::number("text_size", "Label Text Size", 4.0, 0.5),
            ],
            Page::Heatmap => vec![
                csv_choice("csv_path"),
                Field::number("width", "Plot Width", 8.0, 0.5),
                Field::number("height", "Plot Height", 10.0, 0.5),
                Field::integer("top_n_genes", "Top N genes (by p-value)", 50, Some(1), None),
            ],
            Page::Enrichplot => {
                let mut fields = ctx.threshold_fields();
                fields.push(Field::choice("orgdb", "OrgDb", owned(&ORGDB_OPTIONS)));
                fields.push(Field::bounded_number("p_cut", "p-value cutoff", 0.05, 0.01, 0.0, 1.0));
                fields
            }
            Page::Cnetplot => {
                let mut fields = ctx.threshold_fields();
                fields.push(Field::integer("showCategory", "Number of categories to show", 10, Some(1), None));
                fields.push(Field::number("plot_width", "Plot width", 9.0, 0.5));
                fields.push(Field::number("plot_height", "Plot height", 7.0, 0.5));
                fields
            }
            Page::Emapplot => {
                let mut fields = ctx.threshold_fields();
                fields.push(Field::integer("show_n", "Number of categories to show", 20, Some(1), None));
                fields.push(Field::number("plot_width", "Plot width", 9.0, 0.5));
                fields.push(Field::number("plot_height", "Plot height", 7.0, 0.5));
                fields
            }
            Page::Gsego => vec![
                Field::choice("analysis_method", "Analysis method", ctx.methods.clone()),
                Field::choice("orgdb", "OrgDb", owned(&ORGDB_OPTIONS)),
                Field::integer("min_gs_size", "Minimum gene set size", 10, Some(1), None),
                Field::integer("max_gs_size", "Maximum gene set size", 500, Some(1), None),
                Field::number("pvalue_cutoff", "P-value cutoff", 0.05, 0.01),
                Field::number("plot_width", "Plot width", 8.0, 0.5),
                Field::number("plot_height", "Plot height", 6.0, 0.5),
            ],
            Page::GseaplotTotal => vec![
                Field::integer("topN", "Top N terms to plot", 10, Some(1), None),
                Field::number("width", "Plot width", 12.0, 0.5),
                Field::number("height", "Plot height", 8.0, 0.5),
            ],
            Page::GseaplotTerm => vec![
                Field::choice("ont", "Select ontology", owned(&ONTOLOGIES)),
                Field::integer("idx", "Row index (1-based) for GSEA Term Plot", 1, Some(1), None),
                Field::number("width", "Plot width", 8.0, 0.5),
                Field::number("height", "Plot height", 8.0, 0.5),
            ],
            Page::Ridgeplot => vec![
                csv_choice("input_file"),
                Field::number("width", "Plot width", 10.0, 0.5),
                Field::number("height", "Plot height", 8.0, 0.5),
            ],
            Page::PathwayGene => vec![
                csv_choice("csv_path"),
                Field::integer("top_pathways", "Max pathways to display", 5, Some(1), None),
                Field::integer("top_genes_per_pathway", "Max genes per pathway", 20, Some(1), None),
                Field::number("width", "Plot width", 12.0, 0.5),
                Field::number("height", "Plot height", 6.0, 0.5),
            ],
            Page::StringNetwork => vec![
                Field::choice("taxon_id", "Taxon ID (9606=Human, 10090=Mouse)", owned(&TAXON_OPTIONS)),
                Field::bounded_number("cutoff", "Confidence cutoff", 0.5, 0.05, 0.0, 1.0),
                Field::integer("limit", "Max interactions per gene (0=all)", 0, Some(0), None),
            ],
            Page::Enrichkegg => vec![
                Field::text("orgDb", "OrgDb for conversion (e.g., org.Hs.eg.db)", "org.Hs.eg.db"),
                Field::bounded_number("p_cut", "p-value cutoff", 0.9, 0.05, 0.0, 1.0),
            ],
            Page::EnrichkeggDotplot => vec![
                Field::integer("showCategory", "Number of categories to show", 10, Some(1), None),
                Field::number("plot_width", "Plot width", 8.0, 0.5),
                Field::number("plot_height", "Plot height", 6.0, 0.5),
            ],
            Page::Pathview => vec![
                Field::choice("combo", "Select a combo case", ctx.combo_names()),
                Field::required_text("pathway_id", "Pathway ID (e.g., hsa00230)"),
                Field::choice("csv_path", "Gene fold-change CSV", ctx.csv_files.clone()),
            ],
        }
    }
}

/// Outcome of the Configure stage: a bundle ready to run, or the reasons there is none.
#[derive(Debug, Clone, Default)]
pub struct Configured {
    pub bundle: Option<ParamBundle>,
    pub warnings: Vec<String>,
}

impl Configured {
    fn rejected(warnings: Vec<String>) -> Self {
        Configured { bundle: None, warnings }
    }
}

pub fn configure(page: Page, workspace: &Workspace, form: &FormInput) -> Configured {
    let ctx = PageContext::load(workspace);
    configure_with(page, workspace, &ctx, form)
}

pub fn configure_with(page: Page, workspace: &Workspace, ctx: &PageContext, form: &FormInput) -> Configured {
    let prerequisite_warnings = page.context_warnings(ctx);
    if !prerequisite_warnings.is_empty() {
        return Configured::rejected(prerequisite_warnings);
    }

    let mut bundle = ParamBundle::new();
    let mut warnings = Vec::new();
    let empty = Vec::new();

    for field in page.fields(ctx) {
        let raw = form.get(field.name).unwrap_or(&empty);
        match field.parse(raw) {
            Ok(value) => bundle.insert(field.name, value),
            Err(e) => warnings.push(e.to_string()),
        }
    }
    if !warnings.is_empty() {
        return Configured::rejected(warnings);
    }

    for key in CSV_KEYS {
        if let Some(name) = bundle.get_str(key).map(str::to_string) {
            bundle.insert(key, path_string(workspace.csv_dir().join(&name)));
        }
    }

    if let Err(warning) = add_derived(page, workspace, ctx, &mut bundle) {
        warn!("Configure {} rejected: {}", page.key(), warning);
        return Configured::rejected(vec![warning]);
    }

    Configured {
        bundle: Some(bundle),
        warnings: page.combo_warnings(ctx),
    }
}

fn numeric_choice(bundle: &mut ParamBundle, key: &str) {
    if let Some(value) = bundle.get_f64(key) {
        bundle.insert(key, value);
    }
}

/// Fills the workspace paths and fixed values each backend expects next to the user's options.
fn add_derived(page: Page, workspace: &Workspace, ctx: &PageContext, bundle: &mut ParamBundle) -> Result<(), String> {
    match page {
        Page::Deg | Page::Heatmap => {}
        Page::Volcano => bundle.insert("plot_type", "volcano"),
        Page::EnhancedVolcano => bundle.insert("plot_type", "enhanced"),
        Page::Pca => {
            let csv_path = bundle.get_str("csv_path").unwrap_or_default().to_string();
            let csv_name = Path::new(&csv_path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(output_svg) = page.document_path(workspace, &csv_name) {
                bundle.insert("output_svg", path_string(output_svg));
            }
        }
        Page::Enrichplot | Page::Emapplot => {
            let fc = bundle.get_f64("fc_threshold").unwrap_or_default();
            let pval = bundle.get_f64("pval_threshold").unwrap_or_default();
            let selected = select_combos(&ctx.combos, fc, pval);
            if selected.is_empty() {
                return Err("No combos match the selected FC/P-value thresholds.".to_string());
            }
            bundle.remove("fc_threshold");
            bundle.remove("pval_threshold");
            bundle.insert("combo_names", selected);

            if page == Page::Enrichplot {
                bundle.insert("input_root", path_string(workspace.deg_dir()));
                bundle.insert("output_root", path_string(workspace.join("Enrichment").join("out")));
                bundle.insert("file_name", "filtered_gene_list.csv");
            } else {
                bundle.insert("result_root", path_string(workspace.join("Enrichment").join("out")));
                bundle.insert("figure_root", path_string(workspace.join("Emap").join("emapplots")));
            }
        }
        Page::Cnetplot => {
            numeric_choice(bundle, "fc_threshold");
            numeric_choice(bundle, "pval_threshold");
            bundle.insert("result_root", path_string(workspace.join("Enrichment").join("out")));
            bundle.insert("figure_root", path_string(workspace.join("Cnet")));
            bundle.insert("combo_root", path_string(workspace.deg_dir()));
        }
        Page::Gsego => {
            let method = bundle.get_str("analysis_method").unwrap_or_default().to_string();
            let method_dir = workspace.csv_output_dir().join(&method);
            bundle.insert("file_path", path_string(method_dir.join(format!("merged_results_{}.csv", method))));
            bundle.insert("out_dir", path_string(method_dir.join("gsego")));
        }
        Page::GseaplotTotal => {
            bundle.insert("input_dir", path_string(workspace.gsea_results_dir()));
            bundle.insert("output_dir", path_string(workspace.gsea_results_dir().join("gseaplot_total")));
        }
        Page::GseaplotTerm => {
            let ont = bundle.get_str("ont").unwrap_or("BP").to_string();
            let file_name = format!("gse_{}.csv", ont);
            let table = workspace.gsea_results_dir().join(&file_name);
            if !table.is_file() {
                return Err(format!("{} not found in {}.", file_name, workspace.gsea_results_dir().display()));
            }
            let rows = count_rows(&table).map_err(|e| e.to_string())?;
            if rows == 0 {
                return Err(format!("{} is empty.", file_name));
            }
            let idx = bundle.get_f64("idx").unwrap_or(1.0);
            if idx > rows as f64 {
                return Err(format!("Row index {} exceeds the {} rows of {}.", idx, rows, file_name));
            }
            bundle.insert("input_dir", path_string(workspace.gsea_results_dir()));
            bundle.insert("output_dir", path_string(workspace.gsea_results_dir().join("gseaplot")));
        }
        Page::Ridgeplot => {
            bundle.insert("output_dir", path_string(workspace.join("Ridgeplot")));
        }
        Page::PathwayGene => {
            bundle.insert("edox_dir", path_string(workspace.gsea_results_dir()));
            bundle.insert("output_dir", path_string(workspace.gsea_results_dir().join("heatplot")));
        }
        Page::StringNetwork => {
            if let Some(taxon) = bundle.get_str("taxon_id").and_then(|taxon| taxon.parse::<i64>().ok()) {
                bundle.insert("taxon_id", taxon);
            }
            bundle.insert("input_root", path_string(workspace.deg_dir()));
            bundle.insert("combo_file", "combo_names.rds");
            bundle.insert("output_dir", path_string(workspace.join("STRING")));
        }
        Page::Enrichkegg => {
            bundle.insert("input_root", path_string(workspace.deg_dir()));
            bundle.insert("output_root", path_string(workspace.join("Enrichkegg")));
            bundle.insert("file_name", "filtered_gene_list.csv");
            bundle.insert("combo_names", ctx.combo_names());
        }
        Page::EnrichkeggDotplot => {
            bundle.insert("enrich_root", path_string(workspace.join("Enrichkegg")));
            bundle.insert("combo_names", ctx.combo_names());
        }
        Page::Pathview => {
            let pathway_id = bundle.get_str("pathway_id").unwrap_or_default().trim().to_string();
            if !PATHWAY_ID.is_match(&pathway_id) {
                return Err(format!("'{}' is not a KEGG pathway ID (e.g., hsa00230).", pathway_id));
            }
            bundle.insert("pathway_id", pathway_id);
            bundle.insert("kegg_root", path_string(workspace.join("Enrichkegg")));
            bundle.insert("pathview_root", path_string(workspace.join("pathview")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::ParamValue;
    use std::fs;
    use tempfile::tempdir;

    fn form(pairs: &[(&str, &str)]) -> FormInput {
        let mut input = FormInput::new();
        for (name, value) in pairs {
            input.entry(name.to_string()).or_default().push(value.to_string());
        }
        input
    }

    fn workspace_with_combos() -> (tempfile::TempDir, Workspace) {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::create_dir_all(workspace.deg_dir()).unwrap();
        fs::write(
            workspace.combo_names_csv(),
            "combo\nFC1.5_p0.05\nFC1.5_p0.01\nFC2_p0.05\nFC2_p0.01\n",
        )
        .unwrap();
        (dir, workspace)
    }

    #[test]
    fn missing_csv_files_warn_instead_of_failing() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();

        let configured = configure(Page::Deg, &workspace, &FormInput::new());
        assert!(configured.bundle.is_none());
        assert!(configured.warnings[0].contains("CSV"));
    }

    #[test]
    fn deg_bundle_uses_workspace_path() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::write(workspace.csv_dir().join("counts.csv"), "gene,s1\nTP53,1\n").unwrap();

        let configured = configure(Page::Deg, &workspace, &form(&[("fc_input", "1.5,2,3")]));
        let bundle = configured.bundle.unwrap();
        assert_eq!(
            bundle.get_str("csv_path").unwrap(),
            workspace.csv_dir().join("counts.csv").display().to_string()
        );
        assert_eq!(bundle.get_str("fc_input"), Some("1.5,2,3"));
        assert_eq!(bundle.get_str("pval_input"), Some("0.05,0.01"));
    }

    #[test]
    fn volcano_pages_fix_plot_type() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::write(workspace.csv_dir().join("res.csv"), "gene\n").unwrap();

        let plain = configure(Page::Volcano, &workspace, &FormInput::new()).bundle.unwrap();
        let enhanced = configure(Page::EnhancedVolcano, &workspace, &FormInput::new()).bundle.unwrap();
        assert_eq!(plain.get_str("plot_type"), Some("volcano"));
        assert_eq!(enhanced.get_str("plot_type"), Some("enhanced"));
        assert_eq!(plain.get_f64("fc_cutoff"), Some(1.0));
    }

    #[test]
    fn malformed_combo_name_only_warns() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::create_dir_all(workspace.deg_dir()).unwrap();
        fs::write(workspace.combo_names_csv(), "combo\nFC2_p0.01\nbadcombo\n").unwrap();

        let ctx = PageContext::load(&workspace);
        assert_eq!(ctx.combo_names(), vec!["FC2_p0.01", "badcombo"]);
        assert_eq!(ctx.combos.len(), 1);
        assert_eq!(ctx.combo_warnings.len(), 1);
        assert!(ctx.combo_warnings[0].contains("badcombo"));

        let configured = configure_with(
            Page::Emapplot,
            &workspace,
            &ctx,
            &form(&[("fc_threshold", "2"), ("pval_threshold", "0.01")]),
        );
        let bundle = configured.bundle.unwrap();
        assert_eq!(bundle.get_list("combo_names"), vec!["FC2_p0.01"]);
        assert_eq!(configured.warnings, ctx.combo_warnings);
        assert!(Page::Gsego.combo_warnings(&ctx).is_empty());
    }

    #[test]
    fn emapplot_selects_matching_combos() {
        let (_dir, workspace) = workspace_with_combos();

        let configured = configure(
            Page::Emapplot,
            &workspace,
            &form(&[("fc_threshold", "2"), ("pval_threshold", "0.01")]),
        );
        let bundle = configured.bundle.unwrap();
        assert_eq!(bundle.get_list("combo_names"), vec!["FC2_p0.01"]);
        assert!(bundle.get("fc_threshold").is_none());
        assert_eq!(bundle.get_f64("show_n"), Some(20.0));
    }

    #[test]
    fn cnetplot_sends_numeric_thresholds() {
        let (_dir, workspace) = workspace_with_combos();

        let bundle = configure(Page::Cnetplot, &workspace, &FormInput::new()).bundle.unwrap();
        assert_eq!(bundle.get("fc_threshold"), Some(&ParamValue::Float(1.5)));
        assert_eq!(bundle.get("pval_threshold"), Some(&ParamValue::Float(0.01)));
    }

    #[test]
    fn pathview_validates_pathway_id() {
        let (_dir, workspace) = workspace_with_combos();
        fs::write(workspace.csv_dir().join("genes.csv"), "geneid,foldchange\n").unwrap();

        let bad = configure(Page::Pathview, &workspace, &form(&[("pathway_id", "00230")]));
        assert!(bad.bundle.is_none());
        assert!(bad.warnings[0].contains("KEGG pathway ID"));

        let missing = configure(Page::Pathview, &workspace, &FormInput::new());
        assert!(missing.bundle.is_none());

        let good = configure(
            Page::Pathview,
            &workspace,
            &form(&[("pathway_id", "hsa00230"), ("combo", "FC2_p0.05")]),
        );
        let bundle = good.bundle.unwrap();
        assert_eq!(bundle.get_str("combo"), Some("FC2_p0.05"));
        assert_eq!(bundle.get_str("pathway_id"), Some("hsa00230"));
    }

    #[test]
    fn gseaplot_term_bounds_index_by_rows() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();

        let missing = configure(Page::GseaplotTerm, &workspace, &FormInput::new());
        assert!(missing.warnings[0].contains("gse_BP.csv not found"));

        fs::create_dir_all(workspace.gsea_results_dir()).unwrap();
        fs::write(
            workspace.gsea_results_dir().join("gse_CC.csv"),
            "ID,Description\nGO:1,a\nGO:2,b\n",
        )
        .unwrap();

        let too_far = configure(Page::GseaplotTerm, &workspace, &form(&[("ont", "CC"), ("idx", "3")]));
        assert!(too_far.bundle.is_none());

        let ok = configure(Page::GseaplotTerm, &workspace, &form(&[("ont", "CC"), ("idx", "2")]));
        assert_eq!(ok.bundle.unwrap().get("idx"), Some(&ParamValue::Int(2)));
    }

    #[test]
    fn gsego_paths_follow_method() {
        let dir = tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        fs::create_dir_all(workspace.csv_output_dir()).unwrap();
        fs::write(workspace.analysis_info_csv(), "analysis_type\nwald\nLRT\nwald\n").unwrap();

        let bundle = configure(Page::Gsego, &workspace, &form(&[("analysis_method", "LRT")]))
            .bundle
            .unwrap();
        assert!(bundle.get_str("file_path").unwrap().ends_with("merged_results_LRT.csv"));
        assert!(bundle.get_str("out_dir").unwrap().ends_with("gsego"));
    }

    #[test]
    fn invalid_number_is_a_warning() {
        let (_dir, workspace) = workspace_with_combos();
        let configured = configure(Page::StringNetwork, &workspace, &form(&[("cutoff", "2")]));
        assert!(configured.bundle.is_none());
        assert_eq!(configured.warnings.len(), 1);

        let bundle = configure(Page::StringNetwork, &workspace, &form(&[("taxon_id", "10090")]))
            .bundle
            .unwrap();
        assert_eq!(bundle.get("taxon_id"), Some(&ParamValue::Int(10090)));
    }
}
