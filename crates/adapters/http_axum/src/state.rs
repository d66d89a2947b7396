//! Shared application state for axum handlers.

use std::sync::Arc;

use tokio::sync::broadcast;

use sprinkler_app::commands::CommandHandler;
use sprinkler_app::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};
use sprinkler_app::update_fanout::Update;

/// Application state shared across all axum handlers.
///
/// Generic over the port implementations to avoid dynamic dispatch.
/// `Clone` is implemented manually so the underlying types themselves do not
/// need to be `Clone`.
pub struct AppState<R, O, N, C> {
    /// Store and engine operations.
    pub commands: Arc<CommandHandler<R, O, N, C>>,
    /// Publishing side of the update fan-out, used to subscribe SSE clients.
    pub updates: broadcast::Sender<Update>,
}

impl<R, O, N, C> Clone for AppState<R, O, N, C> {
    fn clone(&self) -> Self {
        Self {
            commands: Arc::clone(&self.commands),
            updates: self.updates.clone(),
        }
    }
}

impl<R, O, N, C> AppState<R, O, N, C>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    pub fn new(commands: Arc<CommandHandler<R, O, N, C>>, updates: broadcast::Sender<Update>) -> Self {
        Self { commands, updates }
    }
}
