//! Command endpoint.

use axum::Json;
use axum::extract::State;

use sprinkler_app::commands::{Command, Reply};
use sprinkler_app::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};

use crate::error::ApiError;
use crate::state::AppState;

/// `POST /api/commands` — run one tagged [`Command`].
///
/// Failures are returned with an HTTP error status rather than as a
/// [`Reply::Error`] body.
pub async fn execute<R, O, N, C>(
    State(state): State<AppState<R, O, N, C>>,
    Json(command): Json<Command>,
) -> Result<Json<Reply>, ApiError>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    let reply = state.commands.execute(command).await?;
    Ok(Json(reply))
}
