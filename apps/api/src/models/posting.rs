use serde::{Deserialize, Serialize};

/// A job posting as produced by the upstream posting parser.
///
/// Only `skills` and `missions` drive retrieval; `values` is carried through
/// for callers that render it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub missions: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
}
