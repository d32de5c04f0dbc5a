// ABOUTME: Stream frames for the chat response and the producer side that emits them
// ABOUTME: Converts a streaming model call into meta, delta, error and done frames
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Stream Assembler
//!
//! Every response is `meta`, then any number of `delta` frames, then `done`.
//! A failure adds one `error` frame right before `done`; it never replaces
//! it. Frames travel over a bounded channel from the producer task to the
//! HTTP response. A failed send means the client went away, after which the
//! producer stops emitting but still hands the partial answer to
//! persistence.

use crate::llm::{ChatRequest, LlmProvider};
use crate::tools::ClientAction;
use axum::response::sse::Event;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Frames buffered between the producer and a slow client
pub const FRAME_BUFFER: usize = 64;

/// One frame of the chat response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// Always first: UI actions gathered by tools and the tier answering
    Meta {
        /// Actions for the UI to run
        client_actions: Vec<ClientAction>,
        /// Model tier
        model: String,
    },
    /// A piece of answer text
    Delta {
        /// Text fragment
        text: String,
    },
    /// Something failed; `done` still follows
    Error {
        /// Human-readable message
        error: String,
    },
    /// Always last
    Done {
        /// False when an error frame was sent
        success: bool,
        /// Milliseconds since the request started
        duration: u64,
    },
}

impl StreamFrame {
    /// SSE event name
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Meta { .. } => "meta",
            Self::Delta { .. } => "delta",
            Self::Error { .. } => "error",
            Self::Done { .. } => "done",
        }
    }

    /// JSON payload carried in the SSE `data` field
    #[must_use]
    pub fn data(&self) -> serde_json::Value {
        match self {
            Self::Meta {
                client_actions,
                model,
            } => json!({ "clientActions": client_actions, "model": model }),
            Self::Delta { text } => json!({ "text": text }),
            Self::Error { error } => json!({ "error": error }),
            Self::Done { success, duration } => json!({ "success": success, "duration": duration }),
        }
    }

    /// Render as an SSE event
    #[must_use]
    pub fn to_event(&self) -> Event {
        Event::default()
            .event(self.event_name())
            .data(self.data().to_string())
    }
}

/// Producer half of the frame channel
pub struct FrameSender {
    tx: mpsc::Sender<StreamFrame>,
    connected: bool,
}

impl FrameSender {
    /// Wrap a channel sender
    #[must_use]
    pub const fn new(tx: mpsc::Sender<StreamFrame>) -> Self {
        Self {
            tx,
            connected: true,
        }
    }

    /// Whether the client is still reading
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Send a frame; returns false once the client has gone away
    pub async fn send(&mut self, frame: StreamFrame) -> bool {
        if !self.connected {
            return false;
        }
        if self.tx.send(frame).await.is_err() {
            debug!("Client disconnected, no further frames will be sent");
            self.connected = false;
        }
        self.connected
    }
}

/// What the streaming phase produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamedAnswer {
    /// Concatenated deltas received before the stream ended or the client left
    pub text: String,
    /// Whether an error frame was sent (or would have been)
    pub errored: bool,
}

/// Run the final streaming model call and forward its deltas
///
/// Sends `delta` frames and, on failure, one `error` frame. The caller owns
/// `meta` and `done`.
pub async fn stream_answer(
    provider: &dyn LlmProvider,
    request: &ChatRequest,
    frames: &mut FrameSender,
) -> StreamedAnswer {
    let mut answer = StreamedAnswer::default();

    let mut stream = match provider.complete_stream(request).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(provider = provider.name(), "Failed to start answer stream: {e}");
            answer.errored = true;
            frames
                .send(StreamFrame::Error {
                    error: e.message,
                })
                .await;
            return answer;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                if !chunk.delta.is_empty() {
                    answer.text.push_str(&chunk.delta);
                    if !frames.send(StreamFrame::Delta { text: chunk.delta }).await {
                        break;
                    }
                }
                if chunk.is_final {
                    break;
                }
            }
            Err(e) => {
                error!(provider = provider.name(), "Answer stream failed: {e}");
                answer.errored = true;
                frames
                    .send(StreamFrame::Error {
                        error: e.message,
                    })
                    .await;
                break;
            }
        }
    }

    answer
}
