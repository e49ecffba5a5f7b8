//! Step-wise progress for long-running flows (crawl, classify, generate),
//! delivered to the client as Server-Sent Events.

use std::{convert::Infallible, future::Future, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{error, info};

use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Progress { message: String },
    Done { summary: Value },
    Error { message: String },
}

impl ProgressEvent {
    pub fn to_sse_event(&self) -> Result<Event, serde_json::Error> {
        let event_type = match self {
            ProgressEvent::Progress { .. } => "progress",
            ProgressEvent::Done { .. } => "done",
            ProgressEvent::Error { .. } => "error",
        };
        let data = serde_json::to_string(self)?;
        Ok(Event::default().event(event_type).data(data))
    }
}

/// Cloneable sink for progress messages. Every message is also logged.
#[derive(Clone, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.send(ProgressEvent::Progress { message });
    }

    fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // A closed channel means the client went away; the job keeps running.
            let _ = tx.send(event);
        }
    }
}

/// Awaits `job` and reports its outcome as the final event.
pub async fn run_reporting<T, Fut>(progress: Progress, job: Fut)
where
    T: Serialize,
    Fut: Future<Output = Result<T, AppError>>,
{
    match job.await {
        Ok(summary) => {
            let summary = serde_json::to_value(summary).unwrap_or(Value::Null);
            progress.send(ProgressEvent::Done { summary });
        }
        Err(e) => {
            error!("Streamed job failed: {e}");
            progress.send(ProgressEvent::Error {
                message: e.to_string(),
            });
        }
    }
}

/// Spawns `job` with a fresh progress sink and streams its events as SSE.
/// The stream ends when the job finishes.
pub fn stream_job<T, F, Fut>(job: F) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
    F: FnOnce(Progress) -> Fut,
    Fut: Future<Output = Result<T, AppError>> + Send + 'static,
{
    let (progress, rx) = Progress::channel();
    let fut = job(progress.clone());
    tokio::spawn(run_reporting(progress, fut));

    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        Ok(event
            .to_sse_event()
            .unwrap_or_else(|_| Event::default().event("error").data("unserializable event")))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_delivers_messages_in_order() {
        let (progress, mut rx) = Progress::channel();
        progress.emit("[crawl] one");
        progress.clone().emit("[crawl] two");
        drop(progress);

        let mut messages = Vec::new();
        while let Some(event) = rx.recv().await {
            messages.push(event);
        }
        assert_eq!(
            messages,
            vec![
                ProgressEvent::Progress {
                    message: "[crawl] one".into()
                },
                ProgressEvent::Progress {
                    message: "[crawl] two".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_silent_sink_does_not_panic() {
        Progress::silent().emit("nobody listening");
    }

    #[tokio::test]
    async fn test_run_reporting_ends_with_done() {
        let (progress, mut rx) = Progress::channel();
        let job_progress = progress.clone();
        run_reporting(progress, async move {
            job_progress.emit("working");
            Ok::<_, AppError>(json!({"upserted": 3}))
        })
        .await;

        assert!(matches!(rx.recv().await, Some(ProgressEvent::Progress { .. })));
        assert_eq!(
            rx.recv().await,
            Some(ProgressEvent::Done {
                summary: json!({"upserted": 3})
            })
        );
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_run_reporting_surfaces_errors() {
        let (progress, mut rx) = Progress::channel();
        run_reporting(progress, async { Err::<(), _>(AppError::NotFound("Role 9 not found".into())) })
            .await;
        match rx.recv().await {
            Some(ProgressEvent::Error { message }) => assert!(message.contains("Role 9")),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let value = serde_json::to_value(ProgressEvent::Progress {
            message: "hi".into(),
        })
        .unwrap();
        assert_eq!(value, json!({"type": "progress", "message": "hi"}));
    }
}
