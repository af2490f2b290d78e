use std::path::PathBuf;
use std::str::FromStr;
use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::cookie::Cookie;
use actix_web::error::{ErrorBadRequest, ErrorInternalServerError, ErrorNotFound};
use actix_web::http::header;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use clap::Parser;
use env_logger::Env;
use futures::TryStreamExt;
use log::{debug, info, warn};
use serde::Deserialize;
use strum::IntoEnumIterator;
use FullseePathway::analysis::backend::HttpBackend;
use FullseePathway::analysis::configure::{configure, FormInput, PageContext};
use FullseePathway::analysis::controller::{list_results, prepare_download, run_notices, run_page};
use FullseePathway::analysis::pages::Page;
use FullseePathway::analysis::session::{Notice, SessionStore, UPLOAD_SCOPE};
use FullseePathway::parsers::settings_parser::Settings;
use FullseePathway::parsers::table_parser::read_table_preview;
use FullseePathway::utils::export::{mime_for, TableExporter};
use FullseePathway::utils::html::{analysis_page, upload_page, PageView, UploadView};
use FullseePathway::utils::upload::{
    copy_local_csv_files, forward_uploads, remove_all_csv_files, remove_selected_csv_files, save_uploaded_csv,
    UploadedFile,
};
use FullseePathway::utils::workspace::Workspace;

const SESSION_COOKIE: &str = "fullsee_session";

#[derive(Parser, Debug)]
#[command(name = "fullsee-dashboard", version, about = "Web dashboard for DEG, GO/KEGG enrichment and GSEA analyses.")]
struct CliArgs {
    #[arg(
        long = "settings",
        value_name = "FILE",
        help = "Path to the JSON settings file. Missing files fall back to built-in defaults.",
        default_value = "settings.json"
    )]
    settings: PathBuf,

    #[arg(
        long = "bind",
        value_name = "ADDRESS",
        help = "Address to listen on, overriding bind_address from the settings file. [e.g. 0.0.0.0:8501]"
    )]
    bind: Option<String>,

    #[arg(
        long = "workspaces-dir",
        value_name = "DIR",
        help = "Directory holding the session workspaces, overriding workspaces_dir from the settings file."
    )]
    workspaces_dir: Option<PathBuf>,

    #[arg(
        long = "open",
        help = "Open the dashboard in the default web browser once the server is listening.",
        default_value_t = false
    )]
    open: bool,
}

struct AppState {
    settings: Settings,
    sessions: SessionStore,
    backend: HttpBackend,
}

fn session_cookie(id: &str) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, id.to_string())
        .path("/")
        .http_only(true)
        .finish()
}

fn open_session(req: &HttpRequest, state: &AppState) -> actix_web::Result<String> {
    let requested = req.cookie(SESSION_COOKIE).map(|cookie| cookie.value().to_string());
    state
        .sessions
        .open(requested.as_deref())
        .map_err(ErrorInternalServerError)
}

fn session_workspace(state: &AppState, id: &str) -> actix_web::Result<Workspace> {
    state
        .sessions
        .with_session(id, |session| session.workspace.clone())
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))
}

fn push_notices(state: &AppState, id: &str, scope: &str, notices: Vec<Notice>) -> actix_web::Result<()> {
    state
        .sessions
        .with_session(id, |session| session.push_notices(scope, notices))
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))
}

fn redirect(location: &str, id: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location.to_string()))
        .cookie(session_cookie(id))
        .finish()
}

fn html(body: String, id: &str) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .cookie(session_cookie(id))
        .body(body)
}

fn parse_page(key: &str) -> actix_web::Result<Page> {
    Page::from_str(key).map_err(|_| ErrorNotFound(format!("unknown page '{}'", key)))
}

fn form_input(pairs: Vec<(String, String)>) -> FormInput {
    let mut input = FormInput::new();
    for (name, value) in pairs {
        input.entry(name).or_default().push(value);
    }
    input
}

async fn index() -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, "/upload"))
        .finish()
}

#[derive(Deserialize)]
struct PreviewQuery {
    preview: Option<String>,
}

async fn upload_view(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<PreviewQuery>,
) -> actix_web::Result<HttpResponse> {
    let id = open_session(&req, &state)?;
    let (workspace, notices) = state
        .sessions
        .with_session(&id, |session| (session.workspace.clone(), session.take_notices(UPLOAD_SCOPE)))
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))?;

    let csv_files = workspace.list_csv_files().map_err(ErrorInternalServerError)?;
    let preview_name = query
        .preview
        .as_ref()
        .filter(|name| csv_files.contains(name))
        .or_else(|| csv_files.first())
        .cloned();
    let preview = preview_name.as_ref().and_then(|name| {
        read_table_preview(workspace.csv_dir().join(name), state.settings.max_preview_rows)
            .map_err(|e| warn!("Preview of {} failed: {}", name, e))
            .ok()
            .map(|table| (name.as_str(), table))
    });

    let view = UploadView {
        csv_files: &csv_files,
        notices: &notices,
        preview: preview.as_ref().map(|(name, table)| (*name, table)),
        workspace: &workspace,
    };
    Ok(html(upload_page(&state.settings.app_name, &view), &id))
}

async fn upload_submit(
    req: HttpRequest,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> actix_web::Result<HttpResponse> {
    let id = open_session(&req, &state)?;
    let workspace = session_workspace(&state, &id)?;

    let mut files = Vec::new();
    let mut local_dir = String::new();
    let mut make_copy = false;

    while let Some(mut field) = payload.try_next().await? {
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let file_name = disposition.get_filename().map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            bytes.extend_from_slice(&chunk);
        }

        match (name.as_str(), file_name) {
            ("files", Some(file_name)) if !file_name.is_empty() => files.push(UploadedFile { name: file_name, bytes }),
            ("local_dir", _) => local_dir = String::from_utf8_lossy(&bytes).trim().to_string(),
            ("make_copy", _) => make_copy = true,
            _ => {}
        }
    }

    let mut notices = Vec::new();
    if local_dir.is_empty() {
        let report = save_uploaded_csv(&workspace, &files).map_err(ErrorInternalServerError)?;
        notices.extend(report.notices("Successfully added uploaded CSV files!"));
        notices.extend(forward_uploads(&state.backend, &state.settings.upload_endpoint, &workspace, &files, &report.saved).await);
    } else {
        match copy_local_csv_files(&workspace, &PathBuf::from(&local_dir), make_copy) {
            Ok(report) => notices.extend(report.notices("Successfully added local CSV files!")),
            Err(e) => notices.push(Notice::error(e.to_string())),
        }
    }

    push_notices(&state, &id, UPLOAD_SCOPE, notices)?;
    Ok(redirect("/upload", &id))
}

async fn upload_remove(
    req: HttpRequest,
    state: web::Data<AppState>,
    form: web::Form<Vec<(String, String)>>,
) -> actix_web::Result<HttpResponse> {
    let id = open_session(&req, &state)?;
    let input = form_input(form.into_inner());
    let remove_all = input
        .get("action")
        .map(|actions| actions.iter().any(|action| action == "all"))
        .unwrap_or(false);
    let names = input.get("names").cloned().unwrap_or_default();

    let result = state
        .sessions
        .with_session(&id, |session| {
            let workspace = session.workspace.clone();
            let outcome = if remove_all {
                remove_all_csv_files(&workspace, session.bundles_mut())
            } else {
                remove_selected_csv_files(&workspace, &names, session.bundles_mut())
            };
            let notices = match &outcome {
                Ok(report) if report.removed.is_empty() => vec![Notice::warning("No CSV files selected.")],
                Ok(report) if remove_all => vec![Notice::success(format!("All CSV files removed! ({})", report.removed.len()))],
                Ok(report) => vec![Notice::success(format!("Removed: {}", report.removed.join(", ")))],
                Err(e) => vec![Notice::error(e.to_string())],
            };
            session.push_notices(UPLOAD_SCOPE, notices);
        });
    if result.is_none() {
        return Err(ErrorInternalServerError("session disappeared"));
    }
    Ok(redirect("/upload", &id))
}

async fn page_view(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let page = parse_page(&key)?;
    let id = open_session(&req, &state)?;
    let (workspace, bundle, notices) = state
        .sessions
        .with_session(&id, |session| {
            (
                session.workspace.clone(),
                session.bundle(page).cloned(),
                session.take_notices(page.key()),
            )
        })
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))?;

    let ctx = PageContext::load(&workspace);
    let fields = page.fields(&ctx);
    let mut prerequisite_warnings = page.context_warnings(&ctx);
    prerequisite_warnings.extend(page.combo_warnings(&ctx));
    let sections = list_results(page, &workspace, bundle.as_ref());

    let view = PageView {
        page,
        fields: &fields,
        bundle: bundle.as_ref(),
        prerequisite_warnings: &prerequisite_warnings,
        notices: &notices,
        sections: &sections,
        workspace: &workspace,
        preview_rows: state.settings.max_preview_rows,
        endpoint: page.endpoint(&state.settings),
    };
    Ok(html(analysis_page(&state.settings.app_name, &view), &id))
}

async fn page_configure(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
    form: web::Form<Vec<(String, String)>>,
) -> actix_web::Result<HttpResponse> {
    let page = parse_page(&key)?;
    let id = open_session(&req, &state)?;
    let workspace = session_workspace(&state, &id)?;

    let configured = configure(page, &workspace, &form_input(form.into_inner()));
    state
        .sessions
        .with_session(&id, |session| session.apply_configured(page, configured))
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))?;
    Ok(redirect(&format!("/page/{}", page.key()), &id))
}

async fn page_run(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let page = parse_page(&key)?;
    let id = open_session(&req, &state)?;
    let (workspace, bundle, run_lock) = state
        .sessions
        .with_session(&id, |session| {
            (session.workspace.clone(), session.bundle(page).cloned(), session.run_lock())
        })
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))?;

    let result = {
        let _running = run_lock.lock().await;
        run_page(&state.backend, &state.settings, page, &workspace, bundle.as_ref()).await
    };

    push_notices(&state, &id, page.key(), run_notices(page, &result))?;
    Ok(redirect(&format!("/page/{}", page.key()), &id))
}

async fn page_download(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
) -> actix_web::Result<HttpResponse> {
    let page = parse_page(&key)?;
    let id = open_session(&req, &state)?;
    let (workspace, bundle) = state
        .sessions
        .with_session(&id, |session| (session.workspace.clone(), session.bundle(page).cloned()))
        .ok_or_else(|| ErrorInternalServerError("session disappeared"))?;

    let notice = match prepare_download(page, &workspace, bundle.as_ref()) {
        Ok(Some(download)) => {
            info!("Serving {} ({} bytes)", download.file_name, download.content.len());
            return Ok(HttpResponse::Ok()
                .content_type(download.mime)
                .insert_header((
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", download.file_name),
                ))
                .cookie(session_cookie(&id))
                .body(download.content));
        }
        Ok(None) => Notice::info("No files to download."),
        Err(e) => Notice::error(format!("Failed to prepare download: {}", e)),
    };

    push_notices(&state, &id, page.key(), vec![notice])?;
    Ok(redirect(&format!("/page/{}", page.key()), &id))
}

#[derive(Deserialize)]
struct ExportQuery {
    path: String,
    format: String,
}

async fn page_export(
    req: HttpRequest,
    state: web::Data<AppState>,
    key: web::Path<String>,
    query: web::Query<ExportQuery>,
) -> actix_web::Result<HttpResponse> {
    parse_page(&key)?;
    let id = open_session(&req, &state)?;
    let workspace = session_workspace(&state, &id)?;

    let table = workspace
        .resolve(&query.path)
        .filter(|path| path.is_file())
        .ok_or_else(|| ErrorNotFound(format!("{} not found", query.path)))?;

    let (file_name, content) = TableExporter::new(table)
        .generate_file_content(&query.format)
        .map_err(|e| ErrorBadRequest(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(mime_for(&query.format))
        .insert_header((header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)))
        .body(content))
}

async fn workspace_file(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> actix_web::Result<NamedFile> {
    let id = open_session(&req, &state)?;
    let workspace = session_workspace(&state, &id)?;
    let file = workspace
        .resolve(&path)
        .filter(|file| file.is_file())
        .ok_or_else(|| ErrorNotFound(format!("{} not found", path.as_str())))?;
    Ok(NamedFile::open_async(file).await?)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli_args: CliArgs = CliArgs::parse();
    let mut settings = Settings::load(&cli_args.settings)?;
    if let Some(bind) = cli_args.bind {
        settings.bind_address = bind;
    }
    if let Some(dir) = cli_args.workspaces_dir {
        settings.workspaces_dir = dir;
    }

    let bind_address = settings.bind_address.clone();
    for page in Page::iter() {
        debug!("{} -> {}", page.key(), page.endpoint(&settings));
    }
    info!("Workspaces stored under {}", settings.workspaces_dir.display());

    let state = web::Data::new(AppState {
        sessions: SessionStore::new(&settings),
        backend: HttpBackend::new()?,
        settings,
    });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/", web::get().to(index))
            .route("/upload", web::get().to(upload_view))
            .route("/upload", web::post().to(upload_submit))
            .route("/upload/remove", web::post().to(upload_remove))
            .route("/page/{key}", web::get().to(page_view))
            .route("/page/{key}/configure", web::post().to(page_configure))
            .route("/page/{key}/run", web::post().to(page_run))
            .route("/page/{key}/download", web::get().to(page_download))
            .route("/page/{key}/export", web::get().to(page_export))
            .route("/files/{path:.*}", web::get().to(workspace_file))
    })
    .bind(&bind_address)?
    .run();

    let url = format!("http://{}", bind_address);
    info!("Dashboard listening on {}", url);
    if cli_args.open {
        if let Err(e) = webbrowser::open(&url) {
            warn!("Could not open a browser: {}", e);
        }
    }

    server.await?;
    Ok(())
}
