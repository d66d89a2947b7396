//! Read-only views of the catalog and the engine.

use axum::Json;
use axum::extract::State;

use sprinkler_app::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};
use sprinkler_app::views::{ProgramView, ZoneView};
use sprinkler_domain::execution::StatusReport;

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /api/zones`
pub async fn zones<R, O, N, C>(
    State(state): State<AppState<R, O, N, C>>,
) -> Result<Json<Vec<ZoneView>>, ApiError>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    let zones = state.commands.zones().await?;
    Ok(Json(zones))
}

/// `GET /api/programs`
pub async fn programs<R, O, N, C>(
    State(state): State<AppState<R, O, N, C>>,
) -> Result<Json<Vec<ProgramView>>, ApiError>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    let programs = state.commands.programs().await?;
    Ok(Json(programs))
}

/// `GET /api/status` — whether the engine runs and what it is watering.
pub async fn status<R, O, N, C>(State(state): State<AppState<R, O, N, C>>) -> Json<StatusReport>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    Json(state.commands.engine().report())
}
