use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use log::{info, warn};
use rand::Rng;
use time::OffsetDateTime;
use tokio::sync::Mutex as AsyncMutex;
use crate::analysis::configure::Configured;
use crate::analysis::pages::Page;
use crate::analysis::params::ParamBundle;
use crate::parsers::settings_parser::Settings;
use crate::utils::workspace::Workspace;

pub const SHARED_SESSION: &str = "default";
pub const UPLOAD_SCOPE: &str = "upload";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn css_class(&self) -> &'static str {
        match self {
            NoticeLevel::Success => "success",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub at: OffsetDateTime,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Notice {
            level,
            text: text.into(),
            at: OffsetDateTime::now_utc(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Notice::new(NoticeLevel::Success, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Notice::new(NoticeLevel::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Notice::new(NoticeLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice::new(NoticeLevel::Error, text)
    }

    pub fn timestamp(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.at.hour(), self.at.minute(), self.at.second())
    }
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub workspace: Workspace,
    bundles: HashMap<Page, ParamBundle>,
    notices: HashMap<String, Vec<Notice>>,
    run_lock: Arc<AsyncMutex<()>>,
}

impl Session {
    pub fn new(id: impl Into<String>, workspace: Workspace) -> Self {
        Session {
            id: id.into(),
            workspace,
            bundles: HashMap::new(),
            notices: HashMap::new(),
            run_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Replaces the bundle of `page` only.
    pub fn store_bundle(&mut self, page: Page, bundle: ParamBundle) {
        self.bundles.insert(page, bundle);
    }

    /// Stores an accepted configuration and records its notices under the page.
    /// A rejected one only adds warnings; the last accepted bundle stays runnable.
    pub fn apply_configured(&mut self, page: Page, configured: Configured) -> bool {
        let mut notices: Vec<Notice> = configured.warnings.iter().map(Notice::warning).collect();
        let stored = match configured.bundle {
            Some(bundle) => {
                info!("Configured {} with {} parameters", page.key(), bundle.len());
                self.store_bundle(page, bundle);
                notices.push(Notice::success("Configuration saved!"));
                true
            }
            None => {
                warn!("Configuration of {} rejected; keeping the previous one", page.key());
                false
            }
        };
        self.push_notices(page.key(), notices);
        stored
    }

    pub fn bundle(&self, page: Page) -> Option<&ParamBundle> {
        self.bundles.get(&page)
    }

    pub fn bundles_mut(&mut self) -> &mut HashMap<Page, ParamBundle> {
        &mut self.bundles
    }

    pub fn push_notices(&mut self, scope: &str, notices: impl IntoIterator<Item = Notice>) {
        self.notices.entry(scope.to_string()).or_default().extend(notices);
    }

    /// Notices are shown once: reading them clears the scope.
    pub fn take_notices(&mut self, scope: &str) -> Vec<Notice> {
        self.notices.remove(scope).unwrap_or_default()
    }

    pub fn run_lock(&self) -> Arc<AsyncMutex<()>> {
        Arc::clone(&self.run_lock)
    }
}

pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|byte| format!("{:02x}", byte)).collect()
}

fn is_valid_session_id(id: &str) -> bool {
    id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())
}

/// All live sessions of the dashboard, keyed by the id stored in the session cookie.
#[derive(Debug)]
pub struct SessionStore {
    workspaces_dir: PathBuf,
    online_deployment: bool,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(settings: &Settings) -> Self {
        SessionStore {
            workspaces_dir: settings.workspaces_dir.clone(),
            online_deployment: settings.online_deployment,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn workspace_root(&self, id: &str) -> PathBuf {
        if self.online_deployment {
            self.workspaces_dir.join(id)
        } else {
            self.workspaces_dir.join(SHARED_SESSION)
        }
    }

    /// Returns the id of an existing session, or creates one (and its workspace).
    /// Malformed ids from the browser are replaced by a fresh one.
    pub fn open(&self, requested: Option<&str>) -> io::Result<String> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session store poisoned"))?;

        if let Some(id) = requested.filter(|id| is_valid_session_id(id)) {
            if sessions.contains_key(id) {
                return Ok(id.to_string());
            }
        }

        let id = requested
            .filter(|id| is_valid_session_id(id))
            .map(str::to_string)
            .unwrap_or_else(new_session_id);
        let workspace = Workspace::open(self.workspace_root(&id))?;
        info!("Session {} uses workspace {}", id, workspace.root().display());
        sessions.insert(id.clone(), Session::new(id.clone(), workspace));
        Ok(id)
    }

    pub fn with_session<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock().ok()?;
        sessions.get_mut(id).map(f)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
