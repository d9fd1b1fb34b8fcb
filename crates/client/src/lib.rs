//! Client for the QC pipeline backend: the streaming full-run call and
//! the plain question-bank listing calls.

pub mod error;
pub mod qc;
pub mod sse;
pub mod stream;

pub use error::StreamError;
pub use qc::{FullRunRequest, QcClient, QuestionBankQuery, RunArchive};
pub use stream::{pump_events, StreamOutcome, EVENT_CHANNEL_CAPACITY};
