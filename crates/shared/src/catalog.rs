//! Question-bank catalog types for the non-streaming listing API, plus
//! the filter glue the picker view needs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One question bank as the listing endpoint returns it. Only the
/// fields the picker needs are typed; the rest ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    pub qb_id: String,
    #[serde(default, rename = "createdBy")]
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-question project configuration, nested under a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectQuestions {
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One question inside a bank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub q_id: String,
    #[serde(default)]
    pub question_data: Option<String>,
    #[serde(default)]
    pub project_questions: Option<ProjectQuestions>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Question {
    /// Seed values for a new run form: the question text, and a
    /// JSON-encoded `{"config": ...}` object when the question carries
    /// a project configuration.
    pub fn form_prefill(&self) -> (String, Option<String>) {
        let description = self.question_data.clone().unwrap_or_default();
        let config = self
            .project_questions
            .as_ref()
            .and_then(|pq| pq.config.as_ref())
            .map(|config| serde_json::json!({ "config": config }).to_string());
        (description, config)
    }
}

/// Owned list of fetched banks with creator filtering.
#[derive(Debug, Default)]
pub struct QuestionBankIndex {
    banks: Vec<QuestionBank>,
}

impl QuestionBankIndex {
    pub fn new(banks: Vec<QuestionBank>) -> Self {
        Self { banks }
    }

    pub fn all(&self) -> &[QuestionBank] {
        &self.banks
    }

    /// Distinct creator names in first-seen order.
    pub fn unique_creators(&self) -> Vec<&str> {
        let mut creators: Vec<&str> = Vec::new();
        for bank in &self.banks {
            if let Some(creator) = bank.created_by.as_deref() {
                if !creators.contains(&creator) {
                    creators.push(creator);
                }
            }
        }
        creators
    }

    /// Banks by one creator, or every bank when no filter is set.
    pub fn filter_by_creator(&self, creator: Option<&str>) -> Vec<&QuestionBank> {
        match creator {
            Some(creator) => self
                .banks
                .iter()
                .filter(|bank| bank.created_by.as_deref() == Some(creator))
                .collect(),
            None => self.banks.iter().collect(),
        }
    }
}
