/// RPC façade exposed to a loaded WebUI page.
///
/// The script side calls a method with string arguments plus a callback
/// name; results come back later as one JSON payload delivered through the
/// named callback. Nothing here returns errors to the page directly: every
/// failure is encoded into the payload.
use crate::webui::session::WebUiSessionManager;
use std::sync::Arc;

/// Delivery channel for async results: invokes a named script callback with
/// a JSON payload. Implemented by the embedding web view.
pub trait CallbackSink: Send + Sync {
    fn invoke(&self, callback: &str, payload: &str);
}

/// Host-window side effects requested by a page.
pub trait BridgeHost: Send + Sync {
    fn toast(&self, message: &str);
    fn set_fullscreen(&self, enabled: bool);
    fn close(&self);
}

/// Bridge bound to one session of one module.
pub struct WebUiBridge {
    manager: Arc<WebUiSessionManager>,
    session_id: String,
    module_id: String,
    module_name: String,
    sink: Arc<dyn CallbackSink>,
    host: Arc<dyn BridgeHost>,
}

impl WebUiBridge {
    pub fn new(
        manager: Arc<WebUiSessionManager>,
        session_id: impl Into<String>,
        module_id: impl Into<String>,
        module_name: impl Into<String>,
        sink: Arc<dyn CallbackSink>,
        host: Arc<dyn BridgeHost>,
    ) -> Self {
        Self {
            manager,
            session_id: session_id.into(),
            module_id: module_id.into(),
            module_name: module_name.into(),
            sink,
            host,
        }
    }

    /// Run a shell command; the callback receives a JSON `CommandResult`.
    pub fn execute_command(&self, command: &str, callback: &str) {
        let manager = Arc::clone(&self.manager);
        let sink = Arc::clone(&self.sink);
        let session_id = self.session_id.clone();
        let command = command.to_string();
        let callback = callback.to_string();

        tokio::spawn(async move {
            let payload = command_payload(&manager, &session_id, &command).await;
            sink.invoke(&callback, &payload);
        });
    }

    /// Stat a path; the callback receives JSON file metadata or
    /// `{"error": ...}`.
    pub fn get_file_info(&self, path: &str, callback: &str) {
        let manager = Arc::clone(&self.manager);
        let sink = Arc::clone(&self.sink);
        let session_id = self.session_id.clone();
        let path = path.to_string();
        let callback = callback.to_string();

        tokio::spawn(async move {
            let payload = file_info_payload(&manager, &session_id, &path).await;
            sink.invoke(&callback, &payload);
        });
    }

    pub fn toast(&self, message: &str) {
        self.host.toast(message);
    }

    pub fn fullscreen(&self, enabled: bool) {
        self.host.set_fullscreen(enabled);
    }

    /// Identity of the bound module and session, synchronously.
    pub fn module_info(&self) -> String {
        serde_json::json!({
            "moduleId": self.module_id,
            "moduleName": self.module_name,
            "sessionId": self.session_id,
        })
        .to_string()
    }

    pub fn close(&self) {
        self.host.close();
    }
}

async fn command_payload(
    manager: &WebUiSessionManager,
    session_id: &str,
    command: &str,
) -> String {
    let result = manager.execute_command(session_id, command).await;
    serde_json::to_string(&result).unwrap_or_else(|e| {
        log::error!("Failed to encode command result: {}", e);
        serde_json::json!({
            "exitCode": -1,
            "stdout": "",
            "stderr": e.to_string(),
            "executionTime": 0,
        })
        .to_string()
    })
}

async fn file_info_payload(
    manager: &WebUiSessionManager,
    session_id: &str,
    path: &str,
) -> String {
    match manager.file_info(session_id, path).await {
        Some(info) => serde_json::to_string(&info)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string()),
        None => serde_json::json!({ "error": "File not found" }).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct ChannelSink {
        tx: mpsc::UnboundedSender<(String, String)>,
    }

    impl CallbackSink for ChannelSink {
        fn invoke(&self, callback: &str, payload: &str) {
            let _ = self.tx.send((callback.to_string(), payload.to_string()));
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        events: Mutex<Vec<String>>,
    }

    impl BridgeHost for RecordingHost {
        fn toast(&self, message: &str) {
            self.events.lock().unwrap().push(format!("toast:{message}"));
        }
        fn set_fullscreen(&self, enabled: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fullscreen:{enabled}"));
        }
        fn close(&self) {
            self.events.lock().unwrap().push("close".to_string());
        }
    }

    fn bridge(
        root: &TempDir,
    ) -> (
        WebUiBridge,
        mpsc::UnboundedReceiver<(String, String)>,
        Arc<RecordingHost>,
    ) {
        let manager = Arc::new(WebUiSessionManager::new(root.path()));
        let (tx, rx) = mpsc::unbounded_channel();
        let host = Arc::new(RecordingHost::default());
        let bridge = WebUiBridge::new(
            manager,
            "webui_demo_1",
            "demo",
            "Demo Mod",
            Arc::new(ChannelSink { tx }),
            host.clone(),
        );
        (bridge, rx, host)
    }

    async fn recv(
        rx: &mut mpsc::UnboundedReceiver<(String, String)>,
    ) -> (String, String) {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("callback not delivered in time")
            .expect("sink channel closed")
    }

    #[tokio::test]
    async fn command_result_reaches_the_named_callback() {
        let root = TempDir::new().unwrap();
        let (bridge, mut rx, _) = bridge(&root);

        bridge.execute_command("printf hi", "onResult");
        let (callback, payload) = recv(&mut rx).await;
        assert_eq!(callback, "onResult");

        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["exitCode"], 0);
        assert_eq!(json["stdout"], "hi");
    }

    #[tokio::test]
    async fn file_info_errors_are_encoded_not_raised() {
        let root = TempDir::new().unwrap();
        let (bridge, mut rx, _) = bridge(&root);

        let missing = root.path().join("missing");
        bridge.get_file_info(missing.to_str().unwrap(), "onInfo");
        let (callback, payload) = recv(&mut rx).await;
        assert_eq!(callback, "onInfo");

        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["error"], "File not found");
    }

    #[tokio::test]
    async fn file_info_payload_carries_metadata() {
        let root = TempDir::new().unwrap();
        let file = root.path().join("page.html");
        tokio::fs::write(&file, "<html></html>").await.unwrap();

        let (bridge, mut rx, _) = bridge(&root);
        bridge.get_file_info(file.to_str().unwrap(), "onInfo");
        let (_, payload) = recv(&mut rx).await;

        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["name"], "page.html");
        assert_eq!(json["isDirectory"], false);
    }

    #[tokio::test]
    async fn module_info_is_synchronous_json() {
        let root = TempDir::new().unwrap();
        let (bridge, _rx, _) = bridge(&root);

        let json: serde_json::Value = serde_json::from_str(&bridge.module_info()).unwrap();
        assert_eq!(json["moduleId"], "demo");
        assert_eq!(json["moduleName"], "Demo Mod");
        assert_eq!(json["sessionId"], "webui_demo_1");
    }

    #[tokio::test]
    async fn host_side_effects_are_forwarded() {
        let root = TempDir::new().unwrap();
        let (bridge, _rx, host) = bridge(&root);

        bridge.toast("hello");
        bridge.fullscreen(true);
        bridge.fullscreen(false);
        bridge.close();

        assert_eq!(
            host.events.lock().unwrap().as_slice(),
            &[
                "toast:hello".to_string(),
                "fullscreen:true".to_string(),
                "fullscreen:false".to_string(),
                "close".to_string(),
            ]
        );
    }
}
