use std::fmt::Write;
use strum::IntoEnumIterator;
use crate::analysis::controller::{ResultItem, ResultSection};
use crate::analysis::pages::{ItemKind, Page, Section};
use crate::analysis::params::{Field, FieldKind, ParamBundle, ParamValue};
use crate::analysis::session::Notice;
use crate::parsers::table_parser::{read_table_preview, CsvTable};
use crate::utils::export::EXPORT_FORMATS;
use crate::utils::workspace::Workspace;

const STYLE: &str = r#"
body { font-family: 'Arial', sans-serif; margin: 0; background-color: #f5f5f5; color: #333; }
.shell { display: flex; min-height: 100vh; }
nav { width: 240px; background: #1f2d3d; color: #fff; padding: 20px; }
nav a { color: #cfd8e3; text-decoration: none; display: block; padding: 3px 0; }
nav a.active { color: #fff; font-weight: bold; }
nav h3 { font-size: 13px; text-transform: uppercase; color: #8fa3b8; margin: 18px 0 6px; }
main { flex: 1; padding: 20px 30px; max-width: 1200px; }
.panel { background: white; border-radius: 5px; box-shadow: 0 2px 5px rgba(0,0,0,0.1); padding: 15px; margin-bottom: 20px; }
.notice { padding: 8px 12px; border-radius: 4px; margin-bottom: 8px; white-space: pre-wrap; }
.notice.success { background: #e6f4ea; } .notice.info { background: #e8f0fe; }
.notice.warning { background: #fef7e0; } .notice.error { background: #fce8e6; }
.field { margin-bottom: 10px; } .field label { display: block; font-size: 14px; color: #666; }
table { border-collapse: collapse; font-size: 13px; } td, th { border: 1px solid #ddd; padding: 3px 6px; }
img.result { max-width: 100%; border: 1px solid #eee; }
.missing { color: #999; font-style: italic; }
"#;

pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Percent-encodes everything outside the unreserved set, keeping `/`.
pub fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => encoded.push(byte as char),
            _ => {
                let _ = write!(encoded, "%{:02X}", byte);
            }
        }
    }
    encoded
}

pub fn layout(app_name: &str, title: &str, active: Option<Page>, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title} · {app}</title>
    <style>{style}</style>
</head>
<body>
<div class="shell">
{nav}
<main>
<h1>{title}</h1>
{body}
</main>
</div>
</body>
</html>"#,
        title = escape(title),
        app = escape(app_name),
        style = STYLE,
        nav = navigation(app_name, active),
        body = body,
    )
}

fn navigation(app_name: &str, active: Option<Page>) -> String {
    let mut html = format!("<nav><h2>{}</h2>", escape(app_name));
    let upload_class = if active.is_none() { "active" } else { "" };
    let _ = write!(html, r#"<h3>Start</h3><a class="{}" href="/upload">File Upload</a>"#, upload_class);

    for section in Section::iter() {
        let _ = write!(html, "<h3>{}</h3>", escape(section.title()));
        for page in section.pages() {
            let class = if Some(page) == active { "active" } else { "" };
            let _ = write!(
                html,
                r#"<a class="{}" href="/page/{}">{}</a>"#,
                class,
                page.key(),
                escape(page.title())
            );
        }
    }
    html.push_str("</nav>");
    html
}

pub fn notices(notices: &[Notice]) -> String {
    notices
        .iter()
        .map(|notice| {
            format!(
                r#"<div class="notice {}"><small>{}</small> {}</div>"#,
                notice.level.css_class(),
                notice.timestamp(),
                escape(&notice.text)
            )
        })
        .collect()
}

fn warnings(texts: &[String]) -> String {
    texts
        .iter()
        .map(|text| format!(r#"<div class="notice warning">{}</div>"#, escape(text)))
        .collect()
}

fn is_selected(current: Option<&ParamValue>, option: &str) -> bool {
    match current {
        Some(ParamValue::List(items)) => items.iter().any(|item| item == option),
        Some(value) => value
            .to_form_value()
            .map(|text| text == option || text.ends_with(&format!("/{}", option)))
            .unwrap_or(false),
        None => false,
    }
}

fn field_input(field: &Field, current: Option<&ParamValue>) -> String {
    let name = escape(field.name);
    let value = |default: String| {
        current
            .and_then(ParamValue::to_form_value)
            .map(|text| escape(&text))
            .unwrap_or(default)
    };
    let bound = |attr: &str, limit: Option<String>| {
        limit.map(|limit| format!(r#" {}="{}""#, attr, limit)).unwrap_or_default()
    };

    match &field.kind {
        FieldKind::Number { default, step, min, max } => format!(
            r#"<input type="number" name="{}" step="{}" value="{}"{}{}>"#,
            name,
            step,
            value(default.to_string()),
            bound("min", min.map(|m| m.to_string())),
            bound("max", max.map(|m| m.to_string())),
        ),
        FieldKind::Integer { default, min, max } => format!(
            r#"<input type="number" name="{}" step="1" value="{}"{}{}>"#,
            name,
            value(default.to_string()),
            bound("min", min.map(|m| m.to_string())),
            bound("max", max.map(|m| m.to_string())),
        ),
        FieldKind::Text { default, required } => format!(
            r#"<input type="text" name="{}" value="{}"{}>"#,
            name,
            value(escape(default)),
            if *required { " required" } else { "" }
        ),
        FieldKind::Choice { options } | FieldKind::MultiChoice { options } => {
            if options.is_empty() {
                return format!(r#"<select name="{}" disabled><option>No options available</option></select>"#, name);
            }
            let multiple = matches!(field.kind, FieldKind::MultiChoice { .. });
            let mut html = format!(r#"<select name="{}"{}>"#, name, if multiple { " multiple" } else { "" });
            for option in options {
                let selected = if is_selected(current, option) { " selected" } else { "" };
                let _ = write!(
                    html,
                    r#"<option value="{0}"{1}>{0}</option>"#,
                    escape(option),
                    selected
                );
            }
            html.push_str("</select>");
            html
        }
    }
}

pub fn configure_form(page: Page, fields: &[Field], bundle: Option<&ParamBundle>) -> String {
    let mut html = format!(r#"<form method="post" action="/page/{}/configure">"#, page.key());
    for field in fields {
        let _ = write!(
            html,
            r#"<div class="field"><label>{}</label>{}</div>"#,
            escape(&field.label),
            field_input(field, bundle.and_then(|bundle| bundle.get(field.name)))
        );
    }
    html.push_str(r#"<button type="submit">Save Configuration</button></form>"#);
    html
}

fn table_html(table: &CsvTable) -> String {
    let mut html = String::from("<table><tr>");
    for header in &table.headers {
        let _ = write!(html, "<th>{}</th>", escape(header));
    }
    html.push_str("</tr>");
    for row in &table.rows {
        html.push_str("<tr>");
        for cell in row {
            let _ = write!(html, "<td>{}</td>", escape(cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</table>");
    if table.total_rows > table.rows.len() {
        let _ = write!(html, "<p><small>Showing {} of {} rows.</small></p>", table.rows.len(), table.total_rows);
    }
    html
}

fn result_item(page: Page, item: &ResultItem, workspace: &Workspace, preview_rows: usize) -> String {
    match item {
        ResultItem::Missing { label } => format!(r#"<p class="missing">{}</p>"#, escape(label)),
        ResultItem::Present { label, path, kind } => {
            let relative = workspace.relative(path).unwrap_or_default();
            let url = format!("/files/{}", encode_path(&relative));
            match kind {
                ItemKind::Image => format!(
                    r#"<figure><img class="result" src="{}" alt="{}"><figcaption>{}</figcaption></figure>"#,
                    url,
                    escape(label),
                    escape(label)
                ),
                ItemKind::Table => {
                    let preview = match read_table_preview(path, preview_rows) {
                        Ok(table) => table_html(&table),
                        Err(e) => format!(r#"<div class="notice warning">{}</div>"#, escape(&e.to_string())),
                    };
                    let exports: Vec<String> = EXPORT_FORMATS
                        .iter()
                        .map(|format| {
                            format!(
                                r#"<a href="/page/{}/export?path={}&amp;format={}">{}</a>"#,
                                page.key(),
                                encode_path(&relative),
                                format,
                                format.to_uppercase()
                            )
                        })
                        .collect();
                    format!(
                        "<h4>{}</h4>{}<p>Download: {}</p>",
                        escape(label),
                        preview,
                        exports.join(" · ")
                    )
                }
            }
        }
    }
}

pub fn results(page: Page, sections: &[ResultSection], workspace: &Workspace, preview_rows: usize) -> String {
    let mut html = String::new();
    for section in sections {
        let _ = write!(html, "<h3>{}</h3>", escape(&section.title));
        for item in &section.items {
            html.push_str(&result_item(page, item, workspace, preview_rows));
        }
    }
    html
}

/// Everything the four panels of an analysis page need.
pub struct PageView<'a> {
    pub page: Page,
    pub fields: &'a [Field],
    pub bundle: Option<&'a ParamBundle>,
    pub prerequisite_warnings: &'a [String],
    pub notices: &'a [Notice],
    pub sections: &'a [ResultSection],
    pub workspace: &'a Workspace,
    pub preview_rows: usize,
    pub endpoint: String,
}

pub fn analysis_page(app_name: &str, view: &PageView) -> String {
    let page = view.page;
    let mut body = notices(view.notices);

    let _ = write!(
        body,
        r#"<section class="panel"><h2>Configure</h2>{}{}</section>"#,
        warnings(view.prerequisite_warnings),
        configure_form(page, view.fields, view.bundle)
    );

    let run = if view.bundle.is_some() {
        format!(
            r#"<form method="post" action="/page/{}/run"><button type="submit">{}</button></form><p><small>Endpoint: {}</small></p>"#,
            page.key(),
            escape(&page.run_label()),
            escape(&view.endpoint)
        )
    } else {
        warnings(&["Please configure parameters first in the 'Configure' tab.".to_string()])
    };
    let _ = write!(body, r#"<section class="panel"><h2>Run</h2>{}</section>"#, run);

    let _ = write!(
        body,
        r#"<section class="panel"><h2>Results</h2>{}</section>"#,
        results(page, view.sections, view.workspace, view.preview_rows)
    );

    let _ = write!(
        body,
        r#"<section class="panel"><h2>Download</h2><a href="/page/{}/download">Download results</a></section>"#,
        page.key()
    );

    layout(app_name, page.title(), Some(page), &body)
}

/// File Upload page state.
pub struct UploadView<'a> {
    pub csv_files: &'a [String],
    pub notices: &'a [Notice],
    pub preview: Option<(&'a str, &'a CsvTable)>,
    pub workspace: &'a Workspace,
}

pub fn upload_page(app_name: &str, view: &UploadView) -> String {
    let mut body = notices(view.notices);
    let _ = write!(
        body,
        r#"<section class="panel"><p><small>Workspace: {}</small></p>
<h2>Upload CSV files</h2>
<form method="post" action="/upload" enctype="multipart/form-data">
<input type="file" name="files" accept=".csv" multiple>
<button type="submit">Add CSV files to workspace</button>
</form>
<h2>Add local folder</h2>
<form method="post" action="/upload" enctype="multipart/form-data">
<input type="text" name="local_dir" placeholder="/path/to/csv/folder">
<label><input type="checkbox" name="make_copy" value="true" checked> Make a copy</label>
<button type="submit">Add local CSV files</button>
</form></section>"#,
        escape(&view.workspace.root().display().to_string())
    );

    if view.csv_files.is_empty() {
        body.push_str(&warnings(&["No CSV files uploaded yet.".to_string()]));
    } else {
        let mut list = String::from(r#"<section class="panel"><h2>Workspace CSV files</h2><form method="post" action="/upload/remove">"#);
        for name in view.csv_files {
            let _ = write!(
                list,
                r#"<div><label><input type="checkbox" name="names" value="{0}"> <a href="/upload?preview={1}">{0}</a></label></div>"#,
                escape(name),
                encode_path(name)
            );
        }
        list.push_str(
            r#"<button type="submit" name="action" value="selected">Remove selected</button> <button type="submit" name="action" value="all">Remove all</button></form></section>"#,
        );
        body.push_str(&list);
    }

    if let Some((name, table)) = view.preview {
        let _ = write!(
            body,
            r#"<section class="panel"><h2>Preview: {}</h2>{}</section>"#,
            escape(name),
            table_html(table)
        );
    }

    layout(app_name, "File Upload", None, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b>"R" & 'S'</b>"#), "&lt;b&gt;&quot;R&quot; &amp; &#39;S&#39;&lt;/b&gt;");
    }

    #[test]
    fn encodes_paths() {
        assert_eq!(encode_path("Cnet/FC1.5_p0.05/cnet BP.svg"), "Cnet/FC1.5_p0.05/cnet%20BP.svg");
    }

    #[test]
    fn configure_form_reselects_stored_values() {
        let fields = vec![
            Field::choice("csv_path", "Select CSV file", vec!["a.csv".into(), "b.csv".into()]),
            Field::number("width", "Plot width", 8.0, 0.5),
        ];
        let mut bundle = ParamBundle::new();
        bundle.insert("csv_path", "/ws/csv-files/b.csv");
        bundle.insert("width", 9.5);

        let html = configure_form(Page::Pca, &fields, Some(&bundle));
        assert!(html.contains(r#"<option value="b.csv" selected>"#));
        assert!(html.contains(r#"value="9.5""#));
        assert!(html.contains(r#"action="/page/pca/configure""#));
    }

    #[test]
    fn navigation_lists_every_page() {
        let html = layout("FullseePathway", "PCA", Some(Page::Pca), "");
        for page in Page::iter() {
            assert!(html.contains(&format!("/page/{}", page.key())));
        }
        assert!(html.contains(r#"class="active" href="/page/pca""#));
    }
}
