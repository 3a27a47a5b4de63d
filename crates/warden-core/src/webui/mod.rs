pub mod bridge;
pub mod session;
pub mod types;

pub use bridge::{BridgeHost, CallbackSink, WebUiBridge};
pub use session::WebUiSessionManager;
pub use types::{CommandResult, FileInfo, SessionState, WebUiModule, WebUiSession};
