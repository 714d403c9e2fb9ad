use serde::{Deserialize, Serialize};

/// Where a statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuerySource {
    Ai,
    Template,
}

// A generated statement for one question; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuery {
    pub natural_language_text: String,
    pub sql_text: String,
    pub source: QuerySource,
}

/// A question paired with SQL known to answer it, used as a prompt example.
#[derive(Debug, Clone, Copy)]
pub struct ValidatedQuery {
    pub question: &'static str,
    pub sql: &'static str,
}
