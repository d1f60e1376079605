use crate::{
    app::{App, Command},
    capture::TabInfo,
    config::Config,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{convert::Infallible, sync::Arc};
use tokio::signal;
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

async fn start_app(app: App, config: &Config) {
    let app = Arc::new(app);

    // warm the index once so the first query doesn't pay for the build
    {
        let app = app.clone();
        tokio::task::block_in_place(move || app.index().rebuild(app.db()));
    }

    let router = router(Arc::new(SharedState { app }));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap();
    log::info!("listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

pub fn start_daemon(app: App, config: &Config) {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async { start_app(app, config).await });
}

fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/api/message", post(message))
        .route("/api/command", post(command))
        .route("/api/events", get(events))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(state)
}

/// The request/response protocol rides one endpoint; the action tag decides
/// the handler. An unknown action gets 204 and no body: the router does not
/// respond to messages it does not understand.
async fn message(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<serde_json::Value>,
) -> axum::response::Response {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();
    let response = tokio::task::block_in_place(move || app.dispatch_value(payload));

    match response {
        Some(value) => Json(value).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: String,
    tab: TabInfo,
}

async fn command(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CommandRequest>,
) -> axum::response::Response {
    log::debug!("payload: {payload:?}");

    let CommandRequest { command, tab } = payload;
    let command: Command = match serde_json::from_value(json!(command)) {
        Ok(command) => command,
        Err(_) => {
            log::warn!("unhandled command: {command}");
            return Json(json!({"success": false})).into_response();
        }
    };

    let app = state.app.clone();
    let result = tokio::task::block_in_place(move || app.handle_command(command, &tab));

    match result {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(err) => Json(json!({"success": false, "error": err.to_string()})).into_response(),
    }
}

/// Push notifications stream out as server-sent events; this path carries no
/// responses and slow readers simply miss events.
async fn events(
    State(state): State<Arc<SharedState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.app.events().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(
        |event| -> Option<Result<Event, Infallible>> {
            match event {
                Ok(event) => Event::default().json_data(&event).ok().map(Ok),
                Err(_) => None,
            }
        },
    );

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router() -> (Router, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = crate::config::Config::load_with(tmp.path().to_str().unwrap());
        let app = App::open(&config).unwrap();
        let router = router(Arc::new(SharedState { app: Arc::new(app) }));
        (router, tmp)
    }

    fn message_request(body: serde_json::Value) -> axum::http::Request<axum::body::Body> {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/message")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn message_endpoint_dispatches_actions() {
        let (router, _tmp) = test_router();

        let response = router
            .clone()
            .oneshot(message_request(
                json!({"action": "CREATE_COLLECTION", "id": "reading", "name": "Reading"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], true);

        let response = router
            .clone()
            .oneshot(message_request(json!({"action": "GET_COLLECTIONS"})))
            .await
            .unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["collections"][0]["name"], "Reading");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_action_gets_no_response() {
        let (router, _tmp) = test_router();

        let response = router
            .oneshot(message_request(json!({"action": "NOT_AN_ACTION"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_command_is_acknowledged_but_unhandled() {
        let (router, _tmp) = test_router();

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/command")
            .header("content-type", "application/json")
            .body(axum::body::Body::from(
                json!({"command": "do-a-flip", "tab": {"url": "https://example.com"}}).to_string(),
            ))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["success"], false);
    }
}
