//! Candidate profile as handed over by the profile store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub linkedin_url: Option<String>,
    #[serde(default)]
    pub portfolio_url: Option<String>,
    /// Hard / technical skills.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub soft_skills: Vec<String>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub languages: Vec<Language>,
}

impl Profile {
    /// True when nothing in the profile could be indexed.
    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
            && self.education.is_empty()
            && self.skills.is_empty()
            && self.soft_skills.is_empty()
            && self
                .summary
                .as_deref()
                .map(|s| s.trim().is_empty())
                .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Experience {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Free-form period, e.g. "2021 - Present".
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub mention: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// Text up to (not including) the first '.', trimmed. Used for summary bullets.
pub fn first_sentence(text: &str) -> &str {
    text.split('.').next().unwrap_or("").trim()
}
