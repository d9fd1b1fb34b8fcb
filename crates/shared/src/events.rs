//! Decoded progress events for a pipeline run.
//!
//! The backend streams one JSON object per protocol frame. A handful of
//! keys are recognized; everything else is kept verbatim so new backend
//! fields survive the round trip.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Stage tag emitted when the content-check stage finishes.
pub const STAGE_QC_COMPLETED: &str = "qc_completed";
/// Stage tag emitted when the containerized-run stage finishes.
pub const STAGE_DOCKER_COMPLETED: &str = "docker_completed";

/// A structured progress event: the recognized optional fields plus an
/// open map of whatever else the backend sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qc_results: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_results: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One decoded unit of the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunEvent {
    Structured(StructuredEvent),
    /// Fallback for payloads that are not a JSON object. Carries the
    /// original text under the fixed `raw` key.
    Raw { raw: String },
}

impl RunEvent {
    /// Decode one frame payload. A JSON object becomes
    /// [`RunEvent::Structured`]; anything else (malformed JSON, or JSON
    /// that is not an object) is preserved as [`RunEvent::Raw`]. Decode
    /// problems never fail the stream.
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<Value>(payload) {
            Ok(value @ Value::Object(_)) => match serde_json::from_value(value) {
                Ok(event) => RunEvent::Structured(event),
                Err(err) => {
                    debug!("event object has unexpected field types: {}", err);
                    RunEvent::Raw {
                        raw: payload.to_string(),
                    }
                }
            },
            _ => RunEvent::Raw {
                raw: payload.to_string(),
            },
        }
    }

    /// The stage tag, if this is a structured event carrying one.
    pub fn stage(&self) -> Option<&str> {
        match self {
            RunEvent::Structured(event) => event.stage.as_deref(),
            RunEvent::Raw { .. } => None,
        }
    }
}
