//! Server-Sent Events (SSE) stream of catalog snapshots.

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use sprinkler_app::ports::{ChangeNotifier, Clock, OutputDriver, RecordStore};

use crate::state::AppState;

/// `GET /api/updates` — SSE stream of zone and program list snapshots.
///
/// Each frame's `data:` is one JSON-encoded
/// [`Update`](sprinkler_app::update_fanout::Update). The stream ends when the
/// client disconnects or the fan-out stops.
pub async fn stream<R, O, N, C>(
    State(state): State<AppState<R, O, N, C>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, std::convert::Infallible>>>
where
    R: RecordStore + 'static,
    O: OutputDriver + 'static,
    N: ChangeNotifier + 'static,
    C: Clock + 'static,
{
    let updates = BroadcastStream::new(state.updates.subscribe()).filter_map(|result| match result {
        Ok(update) => match update.to_json() {
            Ok(json) => Some(Ok(Event::default().data(json))),
            Err(err) => {
                tracing::warn!(%err, "failed to encode update for SSE stream");
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            tracing::warn!(skipped = n, "SSE subscriber lagged, some updates were dropped");
            None
        }
    });

    Sse::new(updates).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use sprinkler_app::update_fanout::Update;

    #[tokio::test]
    async fn should_subscribe_to_fanout_when_stream_created() {
        let (state, _handler) = test_state();
        assert_eq!(state.updates.receiver_count(), 0);

        let _sse = stream(State(state.clone())).await;
        assert_eq!(state.updates.receiver_count(), 1);

        let mut rx = state.updates.subscribe();
        state
            .updates
            .send(Update::Error {
                message: "Failed to serialize zones".to_string(),
            })
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(
            received.to_json().unwrap(),
            r#"{"type":"error","message":"Failed to serialize zones"}"#
        );
    }
}
