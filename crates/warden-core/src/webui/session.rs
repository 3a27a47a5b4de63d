/// WebUI session management: discovery of WebUI-capable modules and the
/// lifecycle of their companion server processes.
use crate::module::markers::MODULE_PROP;
use crate::module::props::parse_prop_lines;
use crate::webui::types::{
    CommandResult, FileInfo, SessionState, WebUiModule, WebUiSession, WEBUI_PROP, WEBUI_SCRIPT,
};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use sysinfo::{Pid, System};
use tokio::fs;
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const MAX_SESSIONS: usize = 10;
const MONITOR_INTERVAL: Duration = Duration::from_secs(5);

type SessionTable = Arc<RwLock<HashMap<String, WebUiSession>>>;

/// Owns the discovery table and the bounded session table.
///
/// Commands and file stats issued through a session run with the full
/// privilege of the hosting process; granting a module WebUI capability
/// implies trusting it with that privilege.
pub struct WebUiSessionManager {
    module_root: PathBuf,
    max_sessions: usize,
    modules: Arc<RwLock<HashMap<String, WebUiModule>>>,
    sessions: SessionTable,
    counter: AtomicU64,
    monitor: StdMutex<Option<JoinHandle<()>>>,
}

impl WebUiSessionManager {
    pub fn new(module_root: impl Into<PathBuf>) -> Self {
        Self {
            module_root: module_root.into(),
            max_sessions: MAX_SESSIONS,
            modules: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
            counter: AtomicU64::new(0),
            monitor: StdMutex::new(None),
        }
    }

    /// Override the active-session bound (primarily for embedders and
    /// tests).
    pub fn with_session_limit(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions;
        self
    }

    /// Discover WebUI modules and start the liveness monitor.
    pub async fn init(&self) -> Result<usize> {
        let count = self.discover().await?;
        self.start_monitoring();
        Ok(count)
    }

    /// Rescan the module tree for `webui.prop` declarations, replacing the
    /// discovery table. Modules declaring `enabled=false` are excluded.
    pub async fn discover(&self) -> Result<usize> {
        let mut found = HashMap::new();

        let mut dir = match fs::read_dir(&self.module_root).await {
            Ok(dir) => dir,
            Err(e) => {
                log::warn!("Module root {:?} is not readable: {}", self.module_root, e);
                *self.modules.write().await = found;
                return Ok(0);
            }
        };

        while let Ok(Some(entry)) = dir.next_entry().await {
            let module_id = entry.file_name().to_string_lossy().to_string();
            if module_id.starts_with('.') {
                continue;
            }
            let module_dir = entry.path();
            match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => {}
                _ => continue,
            }

            let text = match fs::read_to_string(module_dir.join(WEBUI_PROP)).await {
                Ok(text) => text,
                // No webui.prop means no WebUI capability.
                Err(_) => continue,
            };

            let module_name = module_display_name(&module_dir, &module_id).await;
            let module = WebUiModule::from_prop(&module_id, &module_name, &text);
            if !module.enabled {
                log::debug!("WebUI disabled for module {}", module_id);
                continue;
            }

            log::debug!("Found WebUI module: {}", module_id);
            found.insert(module_id, module);
        }

        let count = found.len();
        *self.modules.write().await = found;
        Ok(count)
    }

    pub async fn webui_modules(&self) -> Vec<WebUiModule> {
        self.modules.read().await.values().cloned().collect()
    }

    pub async fn webui_module(&self, module_id: &str) -> Option<WebUiModule> {
        self.modules.read().await.get(module_id).cloned()
    }

    pub async fn sessions(&self) -> Vec<WebUiSession> {
        self.sessions.read().await.values().cloned().collect()
    }

    pub async fn session(&self, session_id: &str) -> Option<WebUiSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn active_session_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.state.is_active())
            .count()
    }

    /// Refresh a session's last-access time. Returns false for unknown ids.
    pub async fn touch(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.last_access = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Start a session for a discovered module.
    ///
    /// Returns `None` for unknown modules and when the active-session bound
    /// is reached. The session id is handed back immediately; the companion
    /// process comes up asynchronously, and its fate is visible through the
    /// session's state (`Running` or `Failed`).
    pub async fn start_session(&self, module_id: &str) -> Option<String> {
        if self.webui_module(module_id).await.is_none() {
            log::warn!("Unknown WebUI module: {}", module_id);
            return None;
        }

        // Count check and insert happen under one write guard so the bound
        // holds under concurrent starts.
        let session_id = {
            let mut sessions = self.sessions.write().await;
            let active = sessions.values().filter(|s| s.state.is_active()).count();
            if active >= self.max_sessions {
                log::warn!("Maximum WebUI sessions reached ({})", self.max_sessions);
                return None;
            }

            let session_id = format!(
                "webui_{}_{}",
                module_id,
                self.counter.fetch_add(1, Ordering::SeqCst) + 1
            );
            let now = Utc::now();
            sessions.insert(
                session_id.clone(),
                WebUiSession {
                    session_id: session_id.clone(),
                    module_id: module_id.to_string(),
                    start_time: now,
                    state: SessionState::Created,
                    last_access: now,
                    process_id: None,
                },
            );
            session_id
        };

        let sessions = Arc::clone(&self.sessions);
        let module_dir = self.module_root.join(module_id);
        let sid = session_id.clone();
        tokio::spawn(async move {
            launch_companion(sessions, module_dir, sid).await;
        });

        log::debug!("Started WebUI session: {}", session_id);
        Some(session_id)
    }

    /// Stop a session, removing it from the table immediately and tearing
    /// the companion down in the background (best-effort).
    pub async fn stop_session(&self, session_id: &str) -> bool {
        let session = { self.sessions.write().await.remove(session_id) };
        let Some(session) = session else {
            return false;
        };

        let module_dir = self.module_root.join(&session.module_id);
        tokio::spawn(async move {
            stop_companion(session, module_dir).await;
        });

        log::debug!("Stopped WebUI session: {}", session_id);
        true
    }

    /// Execute a shell command on behalf of a session.
    ///
    /// Failures never propagate; they come back as a result with exit code
    /// -1 and the error text in stderr.
    pub async fn execute_command(&self, session_id: &str, command: &str) -> CommandResult {
        self.touch(session_id).await;
        let start = Instant::now();

        match Command::new("sh").arg("-c").arg(command).output().await {
            Ok(output) => CommandResult {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                execution_time: start.elapsed().as_millis() as u64,
            },
            Err(e) => {
                log::error!("Error executing command `{}`: {}", command, e);
                CommandResult {
                    exit_code: -1,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    execution_time: start.elapsed().as_millis() as u64,
                }
            }
        }
    }

    /// Stat an arbitrary path on behalf of a session. `None` when the path
    /// does not exist or cannot be read.
    pub async fn file_info(&self, session_id: &str, path: &str) -> Option<FileInfo> {
        self.touch(session_id).await;

        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                log::debug!("Cannot stat {}: {}", path, e);
                return None;
            }
        };

        let path_buf = PathBuf::from(path);
        let name = path_buf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let last_modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Some(FileInfo {
            path: path.to_string(),
            name,
            is_directory: metadata.is_dir(),
            size: metadata.len(),
            last_modified,
            permissions: permission_string(&metadata),
            is_readable: is_readable(&metadata),
            is_writable: is_writable(&metadata),
        })
    }

    /// Watch companion PIDs and demote sessions whose process vanished to
    /// `Failed`, so "ran then died" stays distinguishable from a clean stop.
    pub fn start_monitoring(&self) {
        let sessions = Arc::clone(&self.sessions);

        let handle = tokio::spawn(async move {
            let mut system = System::new();
            let mut interval = tokio::time::interval(MONITOR_INTERVAL);

            loop {
                interval.tick().await;
                system.refresh_all();

                let mut table = sessions.write().await;
                for session in table.values_mut() {
                    if session.state != SessionState::Running {
                        continue;
                    }
                    let Some(pid) = session.process_id else {
                        continue;
                    };
                    if system.process(Pid::from_u32(pid)).is_none() {
                        log::warn!(
                            "WebUI companion for {} (PID {}) has exited",
                            session.session_id,
                            pid
                        );
                        session.state = SessionState::Failed;
                    }
                }
            }
        });

        if let Some(old) = self.monitor.lock().unwrap().replace(handle) {
            old.abort();
        }
    }

    /// Tear down every session and stop the monitor. Companion termination
    /// is best-effort; errors are logged, not surfaced.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.monitor.lock().unwrap().take() {
            handle.abort();
        }

        let drained: Vec<WebUiSession> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in drained {
            let module_dir = self.module_root.join(&session.module_id);
            stop_companion(session, module_dir).await;
        }

        log::debug!("All WebUI sessions cleaned up");
    }
}

/// Display name for a module: the `name` key of its `module.prop`, falling
/// back to the module id.
async fn module_display_name(module_dir: &Path, module_id: &str) -> String {
    if let Ok(text) = fs::read_to_string(module_dir.join(MODULE_PROP)).await {
        for (key, value) in parse_prop_lines(&text) {
            if key == "name" && !value.is_empty() {
                return value;
            }
        }
    }
    module_id.to_string()
}

async fn launch_companion(sessions: SessionTable, module_dir: PathBuf, session_id: String) {
    let script = module_dir.join(WEBUI_SCRIPT);
    if !script.exists() {
        log::warn!("No WebUI script in {:?}", module_dir);
        mark_failed(&sessions, &session_id).await;
        return;
    }

    let mut command = Command::new("sh");
    command
        .arg(&script)
        .arg("start")
        .current_dir(&module_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // New session so the companion is not tied to this process's lifetime.
    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    match command.spawn() {
        Ok(mut child) => {
            let pid = child.id();
            let recorded = {
                let mut table = sessions.write().await;
                match table.get_mut(&session_id) {
                    Some(session) => {
                        session.state = SessionState::Running;
                        session.process_id = pid;
                        true
                    }
                    None => false,
                }
            };

            if !recorded {
                // Stopped while we were spawning; the stop path never saw a
                // PID, so reap the companion here.
                log::debug!("Session {} gone before companion came up", session_id);
                let _ = child.start_kill();
                return;
            }

            log::debug!(
                "WebUI companion for {:?} started (PID {:?})",
                module_dir,
                pid
            );
            // The child handle is dropped here; the runtime reaps it and the
            // monitor tracks the PID from now on.
        }
        Err(e) => {
            log::error!("Failed to spawn WebUI companion in {:?}: {}", module_dir, e);
            mark_failed(&sessions, &session_id).await;
        }
    }
}

async fn mark_failed(sessions: &SessionTable, session_id: &str) {
    let mut table = sessions.write().await;
    if let Some(session) = table.get_mut(session_id) {
        session.state = SessionState::Failed;
    }
}

async fn stop_companion(session: WebUiSession, module_dir: PathBuf) {
    #[cfg(unix)]
    if let Some(pid) = session.process_id {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            log::warn!(
                "Failed to signal WebUI companion {} for {}: {}",
                pid,
                session.session_id,
                e
            );
        }
    }

    let script = module_dir.join(WEBUI_SCRIPT);
    if !script.exists() {
        return;
    }

    match Command::new("sh")
        .arg(&script)
        .arg("stop")
        .current_dir(&module_dir)
        .output()
        .await
    {
        Ok(output) if !output.status.success() => {
            log::warn!(
                "WebUI stop hook for {} exited with {:?}",
                session.module_id,
                output.status.code()
            );
        }
        Ok(_) => {}
        Err(e) => {
            log::warn!(
                "Failed to run WebUI stop hook for {}: {}",
                session.module_id,
                e
            );
        }
    }
}

#[cfg(unix)]
fn permission_string(metadata: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = metadata.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(if metadata.is_dir() { 'd' } else { '-' });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn permission_string(_metadata: &std::fs::Metadata) -> String {
    "----------".to_string()
}

#[cfg(unix)]
fn is_readable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o400 != 0
}

#[cfg(not(unix))]
fn is_readable(_metadata: &std::fs::Metadata) -> bool {
    true
}

#[cfg(unix)]
fn is_writable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o200 != 0
}

#[cfg(not(unix))]
fn is_writable(metadata: &std::fs::Metadata) -> bool {
    !metadata.permissions().readonly()
}
