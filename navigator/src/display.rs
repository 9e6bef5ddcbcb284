use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use navigator_lib::itinerary::StopId;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

use crate::{
    runtime::Command,
    state::{DisplayMessage, DisplayState},
};

/// Read-only view of the session plus the manual controls.
///
/// `GET /events` streams every [`DisplayMessage`] as server-sent events, starting with the
/// current snapshot. Stop numbers in `/select/{number}` are 1-based, as shown to the user.
pub fn router(state: Arc<DisplayState>) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/events", get(stream_events))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/skip", post(skip))
        .route("/select/{number}", post(select))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<DisplayState>, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Display listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn get_snapshot(State(state): State<Arc<DisplayState>>) -> Response {
    match state.snapshot() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stream_events(
    State(state): State<Arc<DisplayState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.tx.subscribe();
    let initial = state.snapshot().map(DisplayMessage::Snapshot);

    let stream = async_stream::stream! {
        if let Some(message) = initial {
            yield Ok(Event::default().data(serde_json::to_string(&message).unwrap_or_default()));
        }

        loop {
            match rx.recv().await {
                Ok(message) => yield Ok(Event::default().data(message)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Display client lagged, skipped {skipped} messages");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    let keep_alive = KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive");
    Sse::new(stream).keep_alive(keep_alive)
}

fn forward(state: &DisplayState, command: Command) -> StatusCode {
    if state.send_command(command) {
        StatusCode::ACCEPTED
    } else {
        tracing::error!("Navigation runtime is not running");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn start(State(state): State<Arc<DisplayState>>) -> StatusCode {
    forward(&state, Command::Start)
}

async fn stop(State(state): State<Arc<DisplayState>>) -> StatusCode {
    forward(&state, Command::Stop)
}

async fn skip(State(state): State<Arc<DisplayState>>) -> StatusCode {
    forward(&state, Command::Skip)
}

async fn select(State(state): State<Arc<DisplayState>>, Path(number): Path<usize>) -> StatusCode {
    let stop_count = state.snapshot().map(|snapshot| snapshot.stop_count);
    if number == 0 || stop_count.is_some_and(|count| number > count) {
        return StatusCode::BAD_REQUEST;
    }
    forward(&state, Command::Select(StopId(number - 1)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use navigator_lib::{
        coordinate::Coordinate,
        itinerary::{Day, Itinerary, Stop},
        navigator::Navigator,
        preferences::AlertPreferences,
    };
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::runtime::{LoopEvent, RuntimeHandle};

    fn state() -> (Arc<DisplayState>, mpsc::UnboundedReceiver<LoopEvent>) {
        let (handle, rx) = RuntimeHandle::channel();
        (Arc::new(DisplayState::new(handle)), rx)
    }

    fn publish_idle_snapshot(state: &DisplayState) {
        let itinerary = Itinerary::new("trip-1", "Madurai", vec![Day {
            label: "Day 1".into(),
            stops: vec![
                Stop::new("Meenakshi Temple", Coordinate::new(9.9195, 78.1193)),
                Stop::new("Thirumalai Nayakkar Mahal", Coordinate::new(9.9149, 78.1239)),
            ],
        }]);
        let navigator = Navigator::new(itinerary, AlertPreferences::default(), "Arun");
        state.set_snapshot(navigator.snapshot());
    }

    async fn post(state: &Arc<DisplayState>, uri: &str) -> StatusCode {
        let request = Request::post(uri).body(Body::empty()).unwrap();
        router(state.clone()).oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn snapshot_is_not_found_until_published() {
        let (state, _rx) = state();
        let request = Request::get("/snapshot").body(Body::empty()).unwrap();
        let response = router(state.clone()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        publish_idle_snapshot(&state);
        let request = Request::get("/snapshot").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["trip_id"], "trip-1");
        assert_eq!(snapshot["stop_count"], 2);
    }

    #[tokio::test]
    async fn controls_are_forwarded_to_the_runtime() {
        let (state, mut rx) = state();
        publish_idle_snapshot(&state);

        assert_eq!(post(&state, "/skip").await, StatusCode::ACCEPTED);
        assert!(matches!(rx.try_recv(), Ok(LoopEvent::Command(Command::Skip))));

        assert_eq!(post(&state, "/select/2").await, StatusCode::ACCEPTED);
        assert!(matches!(rx.try_recv(), Ok(LoopEvent::Command(Command::Select(StopId(1))))));

        assert_eq!(post(&state, "/select/0").await, StatusCode::BAD_REQUEST);
        assert_eq!(post(&state, "/select/3").await, StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert_eq!(post(&state, "/stop").await, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn events_are_served_as_sse() {
        let (state, _rx) = state();
        let request = Request::get("/events").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    }
}
