//! iframe auto-resize handshake
//!
//! The embedding page and the H5P iframe exchange `postMessage` payloads of
//! the form `{"context": "h5p", "action": "..."}`. [`Resizer`] is the
//! embedding side's state machine: it turns incoming actions and height
//! measurements into [`ResizeEffect`]s. Timers, DOM access and message
//! delivery belong to the caller.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Context every handshake message carries
pub const H5P_CONTEXT: &str = "h5p";

/// Delay before measuring for a `prepareResize` request
pub const PREPARE_DELAY: Duration = Duration::from_millis(50);

/// Delay before measuring for a `resize` request
pub const RESIZE_DELAY: Duration = Duration::from_millis(100);

const MIN_FALLBACK_DELAY: Duration = Duration::from_millis(50);
const DEFAULT_FALLBACK_TRIES: u32 = 40;

/// Fallback schedule used when the H5P frame has not laid out yet
const RESIZE_FALLBACK_DELAY: Duration = Duration::from_millis(100);
const RESIZE_FALLBACK_TRIES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResizeAction {
    Ready,
    Hello,
    PrepareResize,
    ResizePrepared,
    Resize,
}

/// Wire format of a handshake message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizeMessage {
    pub context: String,
    pub action: ResizeAction,
}

impl ResizeMessage {
    pub fn new(action: ResizeAction) -> Self {
        Self {
            context: H5P_CONTEXT.to_string(),
            action,
        }
    }

    /// Parse an incoming payload; other contexts and unknown actions yield `None`
    pub fn parse(payload: &Value) -> Option<Self> {
        if payload.get("context").and_then(Value::as_str) != Some(H5P_CONTEXT) {
            return None;
        }
        serde_json::from_value(payload.clone()).ok()
    }
}

/// Retry schedule for re-measuring a frame that reports no height yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub delay: Duration,
    pub max_tries: u32,
}

impl FallbackPolicy {
    /// Delay is at least 50 ms; tries default to 40 and are at least 1
    pub fn sanitized(delay: Option<Duration>, max_tries: Option<u32>) -> Self {
        let delay = delay
            .filter(|d| *d >= MIN_FALLBACK_DELAY)
            .unwrap_or(MIN_FALLBACK_DELAY);
        let max_tries = max_tries
            .filter(|t| *t >= 1)
            .unwrap_or(DEFAULT_FALLBACK_TRIES);
        Self { delay, max_tries }
    }
}

/// Why a measurement was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurePurpose {
    Prepare,
    Resize,
    Fallback { delay: Duration, tries_left: u32 },
}

/// Work the caller must carry out
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeEffect {
    /// Make the outer iframe span its container's width
    SetWidthFull,
    /// Send a message back to the iframe
    Respond(ResizeAction),
    /// Set the outer iframe's height in pixels
    SetHeight(f64),
    /// Measure the H5P container after `after`, then call [`Resizer::measured`]
    Measure { after: Duration, purpose: MeasurePurpose },
}

#[derive(Debug, Default)]
pub struct Resizer {
    resizing: bool,
}

impl Resizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resizing(&self) -> bool {
        self.resizing
    }

    /// Message announcing the page is ready to receive handshake requests
    pub fn ready_message() -> ResizeMessage {
        ResizeMessage::new(ResizeAction::Ready)
    }

    /// React to an incoming action
    pub fn handle(&mut self, action: ResizeAction) -> Vec<ResizeEffect> {
        match action {
            ResizeAction::Hello => vec![
                ResizeEffect::SetWidthFull,
                ResizeEffect::Respond(ResizeAction::Hello),
            ],
            ResizeAction::PrepareResize if self.resizing => Vec::new(),
            ResizeAction::PrepareResize => vec![ResizeEffect::Measure {
                after: PREPARE_DELAY,
                purpose: MeasurePurpose::Prepare,
            }],
            ResizeAction::Resize => {
                self.resizing = true;
                vec![ResizeEffect::Measure {
                    after: RESIZE_DELAY,
                    purpose: MeasurePurpose::Resize,
                }]
            }
            // Outbound-only actions
            ResizeAction::Ready | ResizeAction::ResizePrepared => Vec::new(),
        }
    }

    /// React to a height measurement requested earlier
    pub fn measured(&mut self, purpose: MeasurePurpose, height_px: f64) -> Vec<ResizeEffect> {
        match purpose {
            MeasurePurpose::Prepare => vec![
                ResizeEffect::SetHeight(height_px),
                ResizeEffect::Respond(ResizeAction::ResizePrepared),
            ],
            MeasurePurpose::Resize => {
                if height_px > 1.0 {
                    self.resizing = false;
                    return vec![ResizeEffect::SetHeight(height_px)];
                }
                let policy = FallbackPolicy::sanitized(
                    Some(RESIZE_FALLBACK_DELAY),
                    Some(RESIZE_FALLBACK_TRIES),
                );
                vec![
                    ResizeEffect::SetHeight(height_px),
                    ResizeEffect::Measure {
                        after: policy.delay,
                        purpose: MeasurePurpose::Fallback {
                            delay: policy.delay,
                            tries_left: policy.max_tries,
                        },
                    },
                ]
            }
            MeasurePurpose::Fallback { delay, tries_left } => {
                if height_px > 1.0 {
                    self.resizing = false;
                    vec![ResizeEffect::SetHeight(height_px)]
                } else if tries_left > 1 {
                    vec![ResizeEffect::Measure {
                        after: delay,
                        purpose: MeasurePurpose::Fallback {
                            delay,
                            tries_left: tries_left - 1,
                        },
                    }]
                } else {
                    // Out of tries: stop blocking future prepareResize requests
                    self.resizing = false;
                    Vec::new()
                }
            }
        }
    }
}
