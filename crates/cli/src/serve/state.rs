//! Application state.

use proctrack_storage::ProcessStore;

/// Application state shared across request handlers.
pub(crate) struct AppState {
    /// The process store. Cloning it shares the same backend.
    pub(crate) store: ProcessStore,
    /// Optional API key for authentication. None = no auth required.
    pub(crate) api_key: Option<String>,
}
