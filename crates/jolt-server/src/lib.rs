//! Development server with live reload for jolt.
//!
//! Serves public and built assets, rebuilds on source changes, and tells the
//! connected browser to reload over a WebSocket once a rebuild finishes.

pub mod assets;
pub mod inject;
pub mod rebuild;
pub mod server;
pub mod watcher;
pub mod websocket;

pub use assets::{Asset, SearchPath};
pub use inject::{inject_reload_script, RewriteError};
pub use rebuild::{BuildState, Rebuilder};
pub use server::{router, DevServer, DevServerConfig, PreparedServer, ServerError, ServerState};
pub use watcher::{SourceWatcher, WatchEvent, WatchEventKind};
pub use websocket::{ReloadChannel, RELOAD_PATH, RELOAD_SENTINEL};
