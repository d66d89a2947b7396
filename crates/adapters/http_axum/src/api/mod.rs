//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod catalog;
#[allow(clippy::missing_errors_doc)]
pub mod commands;
pub mod sse;

use axum::Router;
use axum::routing::{get, post};

use sprinkler_app::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes<R, O, N, C>() -> Router<AppState<R, O, N, C>>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route("/zones", get(catalog::zones::<R, O, N, C>))
        .route("/programs", get(catalog::programs::<R, O, N, C>))
        .route("/status", get(catalog::status::<R, O, N, C>))
        .route("/commands", post(commands::execute::<R, O, N, C>))
        .route("/updates", get(sse::stream::<R, O, N, C>))
}
