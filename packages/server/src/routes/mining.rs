//! The mining endpoint, in synchronous and streaming flavors.
//!
//! Both modes drive the same pipeline; streaming mode attaches a
//! channel-backed progress sink and forwards each notification as an SSE
//! event, always terminated by an `end` marker.

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt;
use tracing::warn;

use event_mining::{NoopSink, ProgressSink, ProgressUpdate};

use super::AdminIdentity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MineRequest {
    pub url: String,
    #[serde(default)]
    pub stream: bool,
}

pub async fn mine(
    State(state): State<AppState>,
    Extension(admin): Extension<AdminIdentity>,
    Json(request): Json<MineRequest>,
) -> Response {
    if request.stream {
        mine_streaming(state, admin, request).await
    } else {
        mine_sync(state, admin, request).await
    }
}

async fn mine_sync(state: AppState, admin: AdminIdentity, request: MineRequest) -> Response {
    let summary = state.pipeline.mine(&request.url, admin.0, &NoopSink).await;

    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary)).into_response()
}

/// Forwards progress notifications into the response channel.
struct ChannelSink(mpsc::UnboundedSender<ProgressUpdate>);

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn notify(&self, update: ProgressUpdate) {
        // A closed channel just means the client went away; the run finishes
        // regardless.
        let _ = self.0.send(update);
    }
}

async fn mine_streaming(state: AppState, admin: AdminIdentity, request: MineRequest) -> Response {
    let (tx, rx) = mpsc::unbounded_channel();

    let pipeline = state.pipeline.clone();
    let url = request.url.clone();
    tokio::spawn(async move {
        pipeline.mine(&url, admin.0, &ChannelSink(tx)).await;
    });

    let stream = UnboundedReceiverStream::new(rx).map(|update| {
        Ok::<_, std::convert::Infallible>(Event::default().json_data(&update).unwrap_or_else(
            |e| {
                warn!(error = %e, "Failed to serialize progress update");
                Event::default().data("{}")
            },
        ))
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_flag_defaults_to_false() {
        let request: MineRequest =
            serde_json::from_str(r#"{"url": "https://eventos.mx"}"#).unwrap();
        assert!(!request.stream);

        let request: MineRequest =
            serde_json::from_str(r#"{"url": "https://eventos.mx", "stream": true}"#).unwrap();
        assert!(request.stream);
    }
}
