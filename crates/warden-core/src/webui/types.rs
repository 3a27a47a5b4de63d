use crate::module::props::{parse_prop_lines, prop_bool};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-module declarative WebUI config file.
pub const WEBUI_PROP: &str = "webui.prop";
/// Companion executable accepting `start` / `stop`.
pub const WEBUI_SCRIPT: &str = "webui.sh";

pub const DEFAULT_WEBUI_PORT: u16 = 8080;

/// A module's WebUI declaration as discovered from `webui.prop`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUiModule {
    pub module_id: String,
    pub module_name: String,
    pub port: u16,
    pub path: String,
    pub enabled: bool,
}

impl WebUiModule {
    /// Parse a `webui.prop` body. Unknown keys are ignored, an unparseable
    /// `port` falls back to the default, and `enabled` defaults to true.
    pub fn from_prop(module_id: &str, module_name: &str, text: &str) -> Self {
        let mut module = Self {
            module_id: module_id.to_string(),
            module_name: module_name.to_string(),
            port: DEFAULT_WEBUI_PORT,
            path: "/".to_string(),
            enabled: true,
        };

        for (key, value) in parse_prop_lines(text) {
            match key.as_str() {
                "port" => module.port = value.parse().unwrap_or(DEFAULT_WEBUI_PORT),
                "path" => module.path = value,
                "enabled" => module.enabled = prop_bool(&value),
                _ => {}
            }
        }

        module
    }

    /// Local URL the module's interface is served on once its companion is
    /// running.
    pub fn url(&self) -> String {
        format!("http://localhost:{}{}", self.port, self.path)
    }
}

/// Lifecycle of one session's companion process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Registered; companion not yet confirmed running.
    Created,
    /// Companion process spawned and believed alive.
    Running,
    /// Explicitly stopped.
    Stopped,
    /// Companion never came up, or came up and then died. Terminal, but the
    /// entry stays queryable until stopped or swept so observers can tell
    /// this apart from a clean stop.
    Failed,
}

impl SessionState {
    /// States counting toward the active-session bound.
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Created | SessionState::Running)
    }
}

/// One active (or failed) WebUI session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUiSession {
    pub session_id: String,
    pub module_id: String,
    pub start_time: DateTime<Utc>,
    pub state: SessionState,
    pub last_access: DateTime<Utc>,
    pub process_id: Option<u32>,
}

/// Result of a command executed on behalf of a WebUI page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub execution_time: u64,
}

/// Filesystem metadata surfaced to a WebUI page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub size: u64,
    /// Modification time, epoch milliseconds.
    pub last_modified: i64,
    /// Symbolic `rwxrwxrwx` permission string.
    pub permissions: String,
    pub is_readable: bool,
    pub is_writable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prop_defaults_apply() {
        let module = WebUiModule::from_prop("foo", "Foo", "");
        assert_eq!(module.port, DEFAULT_WEBUI_PORT);
        assert_eq!(module.path, "/");
        assert!(module.enabled);
        assert_eq!(module.url(), "http://localhost:8080/");
    }

    #[test]
    fn prop_overrides_and_bad_port_fallback() {
        let module = WebUiModule::from_prop(
            "foo",
            "Foo",
            "port=9090\npath=/ui\nenabled=true\n",
        );
        assert_eq!(module.port, 9090);
        assert_eq!(module.url(), "http://localhost:9090/ui");

        let bad_port = WebUiModule::from_prop("foo", "Foo", "port=lots\n");
        assert_eq!(bad_port.port, DEFAULT_WEBUI_PORT);
    }

    #[test]
    fn enabled_false_is_honored() {
        let module = WebUiModule::from_prop("foo", "Foo", "enabled=false\n");
        assert!(!module.enabled);
    }

    #[test]
    fn active_states() {
        assert!(SessionState::Created.is_active());
        assert!(SessionState::Running.is_active());
        assert!(!SessionState::Stopped.is_active());
        assert!(!SessionState::Failed.is_active());
    }

    #[test]
    fn command_result_serializes_camel_case() {
        let result = CommandResult {
            exit_code: 0,
            stdout: "ok".to_string(),
            stderr: String::new(),
            execution_time: 12,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["executionTime"], 12);
    }
}
