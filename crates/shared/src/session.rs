//! Consumer-side state for one pipeline run, plus the small pieces of
//! display state the results view owns.

use std::collections::HashMap;

use serde_json::Value;

use crate::events::{RunEvent, StructuredEvent, STAGE_DOCKER_COMPLETED, STAGE_QC_COMPLETED};

/// Where the stream for a run currently stands. `Completed` and
/// `Errored` are terminal; a session ignores events after either.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Open,
    Completed,
    Errored(String),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Open)
    }
}

/// Candidate locations for a corrected description inside `qc_results`,
/// checked once, in order. The first non-empty string wins.
///
/// TODO: confirm with the backend team whether `completeness.remarks`
/// should really stand in for a missing corrected description; it looks
/// like an accident of the old lookup chain.
const CORRECTED_DESCRIPTION_PATHS: &[&[&str]] = &[
    &["corrections", "corrected_description"],
    // Deprecated top-level spelling still emitted by older backends.
    &["corrected_description"],
    &["completeness", "remarks"],
];

/// Resolve the corrected description out of a `qc_results` object, if
/// the content-check stage produced one.
pub fn corrected_description(qc_results: &Value) -> Option<&str> {
    CORRECTED_DESCRIPTION_PATHS.iter().find_map(|path| {
        path.iter()
            .try_fold(qc_results, |value, key| value.get(key))
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
    })
}

/// Accumulated state for one full run: every event in arrival order and
/// the per-stage results picked out of them.
#[derive(Debug, Default)]
pub struct RunSession {
    pub events: Vec<RunEvent>,
    pub qc_result: Option<Value>,
    pub docker_result: Option<Value>,
    pub corrected_description: Option<String>,
    state: RunState,
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Fold one decoded event into the session. Events arriving after a
    /// terminal transition are dropped.
    pub fn apply(&mut self, event: RunEvent) {
        if self.state.is_terminal() {
            return;
        }
        if let RunEvent::Structured(evt) = &event {
            self.apply_structured(evt);
        }
        self.events.push(event);
    }

    fn apply_structured(&mut self, event: &StructuredEvent) {
        match event.stage.as_deref() {
            Some(STAGE_QC_COMPLETED) => {
                if let Some(qc) = &event.qc_results {
                    self.qc_result = Some(qc.clone());
                    if let Some(text) = corrected_description(qc) {
                        self.corrected_description = Some(text.to_string());
                    }
                }
            }
            Some(STAGE_DOCKER_COMPLETED) => {
                if let Some(docker) = &event.docker_results {
                    self.docker_result = Some(docker.clone());
                }
            }
            Some(_) => {}
            None => {
                // Stageless events can still carry nested results.
                if let Some(qc) = &event.qc_results {
                    self.qc_result = Some(qc.clone());
                }
                if let Some(docker) = &event.docker_results {
                    self.docker_result = Some(docker.clone());
                }
            }
        }
        // A `status: completed` object needs nothing extra here; the
        // terminal transition comes from the stream itself.
    }

    /// Mark the stream finished. No-op after a terminal state.
    pub fn complete(&mut self) {
        if !self.state.is_terminal() {
            self.state = RunState::Completed;
        }
    }

    /// Mark the stream failed with a message. No-op after a terminal state.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = RunState::Errored(message.into());
        }
    }
}

/// Expand/collapse display state keyed by section name. Peripheral view
/// state owned by whichever surface renders the results.
#[derive(Debug, Default)]
pub struct SectionToggles {
    expanded: HashMap<String, bool>,
}

impl SectionToggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, key: &str) {
        let entry = self.expanded.entry(key.to_string()).or_insert(false);
        *entry = !*entry;
    }

    /// Sections start collapsed until toggled.
    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.get(key).copied().unwrap_or(false)
    }
}

/// Display label for a section key: underscores become spaces, the rest
/// is uppercased.
pub fn format_section_key(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn structured(value: serde_json::Value) -> RunEvent {
        RunEvent::decode(&value.to_string())
    }

    #[test]
    fn test_qc_completed_sets_result_and_corrected_description() {
        let mut session = RunSession::new();
        session.apply(structured(json!({
            "stage": "qc_completed",
            "qc_results": {
                "score": 8,
                "corrections": {"corrected_description": "use two workers"}
            }
        })));

        assert_eq!(
            session.qc_result.as_ref().and_then(|qc| qc.get("score")),
            Some(&json!(8))
        );
        assert_eq!(
            session.corrected_description.as_deref(),
            Some("use two workers")
        );
        assert_eq!(session.events.len(), 1);
    }

    #[test]
    fn test_corrected_description_candidate_order() {
        let nested = json!({
            "corrections": {"corrected_description": "nested"},
            "corrected_description": "top-level",
            "completeness": {"remarks": "remarks"}
        });
        assert_eq!(corrected_description(&nested), Some("nested"));

        let top_level = json!({
            "corrected_description": "top-level",
            "completeness": {"remarks": "remarks"}
        });
        assert_eq!(corrected_description(&top_level), Some("top-level"));

        let remarks_only = json!({"completeness": {"remarks": "remarks"}});
        assert_eq!(corrected_description(&remarks_only), Some("remarks"));

        assert_eq!(corrected_description(&json!({})), None);
    }

    #[test]
    fn test_corrected_description_skips_empty_candidates() {
        let qc = json!({
            "corrections": {"corrected_description": "   "},
            "corrected_description": "fallback wins"
        });
        assert_eq!(corrected_description(&qc), Some("fallback wins"));
    }

    #[test]
    fn test_docker_completed_sets_result() {
        let mut session = RunSession::new();
        session.apply(structured(json!({
            "stage": "docker_completed",
            "docker_results": {"run_result": {"output": "ok"}}
        })));
        assert!(session.docker_result.is_some());
        assert!(session.qc_result.is_none());
    }

    #[test]
    fn test_stageless_event_surfaces_nested_results() {
        let mut session = RunSession::new();
        session.apply(structured(json!({
            "qc_results": {"score": 5},
            "docker_results": {"exit_code": 0}
        })));
        assert_eq!(session.qc_result, Some(json!({"score": 5})));
        assert_eq!(session.docker_result, Some(json!({"exit_code": 0})));
    }

    #[test]
    fn test_unrecognized_stage_keeps_event_without_results() {
        let mut session = RunSession::new();
        session.apply(structured(json!({
            "stage": "building_image",
            "qc_results": {"score": 1}
        })));
        assert!(session.qc_result.is_none());
        assert_eq!(session.events.len(), 1);
    }

    #[test]
    fn test_raw_events_are_recorded() {
        let mut session = RunSession::new();
        session.apply(RunEvent::decode("not-json"));
        assert_eq!(session.events.len(), 1);
        assert!(session.qc_result.is_none());
    }

    #[test]
    fn test_no_events_after_terminal_state() {
        let mut session = RunSession::new();
        session.fail("connection reset");
        session.apply(structured(json!({"stage": "qc_completed"})));
        assert!(session.events.is_empty());
        assert_eq!(
            session.state(),
            &RunState::Errored("connection reset".to_string())
        );

        // Terminal transitions are one-shot.
        session.complete();
        assert!(matches!(session.state(), RunState::Errored(_)));
    }

    #[test]
    fn test_section_toggles() {
        let mut toggles = SectionToggles::new();
        assert!(!toggles.is_expanded("qc_results"));
        toggles.toggle("qc_results");
        assert!(toggles.is_expanded("qc_results"));
        toggles.toggle("qc_results");
        assert!(!toggles.is_expanded("qc_results"));
    }

    #[test]
    fn test_format_section_key() {
        assert_eq!(format_section_key("docker_results"), "DOCKER RESULTS");
    }
}
