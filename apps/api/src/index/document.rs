//! Indexed documents and the profile → documents projection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Education, Experience, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Experience,
    Education,
    SkillsHard,
    SkillsSoft,
    Summary,
}

/// One unit of indexed text. Identity is its position in the index.
///
/// `embedding` is only populated while a document travels between the index and
/// the match engine; call `sanitized()` before it leaves the crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub content: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Metadata keys starting with this prefix are internal scratch space.
pub const SCRATCH_PREFIX: &str = "_";

impl Document {
    pub fn new(doc_type: DocumentType, content: impl Into<String>) -> Self {
        Self {
            doc_type,
            content: content.into(),
            metadata: BTreeMap::new(),
            embedding: None,
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Drops the embedding and any scratch metadata.
    pub fn sanitized(mut self) -> Self {
        self.embedding = None;
        self.metadata.retain(|k, _| !k.starts_with(SCRATCH_PREFIX));
        self
    }
}

/// Projects a profile into the documents that make up its index.
///
/// Order: experiences, education, hard skills, soft skills, summary.
/// Empty sections and blank entries produce no document.
pub fn profile_documents(profile: &Profile) -> Vec<Document> {
    let mut docs: Vec<Document> = profile
        .experiences
        .iter()
        .map(experience_document)
        .chain(profile.education.iter().map(education_document))
        .filter(|d| !d.content.trim().is_empty())
        .collect();

    let hard: Vec<&str> = non_blank(&profile.skills);
    if !hard.is_empty() {
        docs.push(Document::new(
            DocumentType::SkillsHard,
            format!("Technical skills: {}", hard.join(", ")),
        ));
    }

    let soft: Vec<&str> = non_blank(&profile.soft_skills);
    if !soft.is_empty() {
        docs.push(Document::new(
            DocumentType::SkillsSoft,
            format!("Soft skills: {}", soft.join(", ")),
        ));
    }

    if let Some(summary) = profile.summary.as_deref().map(str::trim) {
        if !summary.is_empty() {
            docs.push(Document::new(DocumentType::Summary, summary));
        }
    }

    docs
}

pub fn experience_document(exp: &Experience) -> Document {
    let mut heading = exp.title.trim().to_string();
    if let Some(company) = exp.company.as_deref().filter(|c| !c.trim().is_empty()) {
        heading.push_str(" at ");
        heading.push_str(company.trim());
    }
    if let Some(period) = exp.period.as_deref().filter(|p| !p.trim().is_empty()) {
        heading.push_str(&format!(" ({})", period.trim()));
    }

    let content = match exp.description.trim() {
        "" => heading,
        desc => format!("{heading}: {desc}"),
    };

    let mut doc = Document::new(DocumentType::Experience, content)
        .with_meta("title", exp.title.trim())
        .with_meta("description", exp.description.trim());
    if let Some(company) = &exp.company {
        doc = doc.with_meta("company", company.trim());
    }
    if let Some(period) = &exp.period {
        doc = doc.with_meta("period", period.trim());
    }
    doc
}

fn education_document(edu: &Education) -> Document {
    let institution = edu.institution.trim();
    let mut content = match edu.degree.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(degree) if !institution.is_empty() => format!("{degree} at {institution}"),
        Some(degree) => degree.to_string(),
        None => institution.to_string(),
    };
    if let Some(period) = edu.period.as_deref().filter(|p| !p.trim().is_empty()) {
        content.push_str(&format!(" ({})", period.trim()));
    }
    if let Some(desc) = edu.description.as_deref().filter(|d| !d.trim().is_empty()) {
        content.push_str(": ");
        content.push_str(desc.trim());
    }

    let mut doc = Document::new(DocumentType::Education, content)
        .with_meta("institution", edu.institution.trim());
    if let Some(degree) = &edu.degree {
        doc = doc.with_meta("degree", degree.trim());
    }
    doc
}

fn non_blank(items: &[String]) -> Vec<&str> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> Profile {
        Profile {
            name: "Ada".to_string(),
            summary: Some("Backend engineer.".to_string()),
            skills: vec!["Rust".to_string(), " ".to_string(), "SQL".to_string()],
            soft_skills: vec![],
            experiences: vec![Experience {
                title: "Senior Engineer".to_string(),
                company: Some("Tech Corp".to_string()),
                period: Some("2021 - Present".to_string()),
                description: "Led the migration to microservices. Mentored juniors.".to_string(),
                ..Experience::default()
            }],
            education: vec![Education {
                institution: "University of Technology".to_string(),
                degree: Some("BSc Computer Science".to_string()),
                ..Education::default()
            }],
            ..Profile::default()
        }
    }

    #[test]
    fn test_profile_documents_order_and_types() {
        let docs = profile_documents(&sample_profile());
        let types: Vec<DocumentType> = docs.iter().map(|d| d.doc_type).collect();
        assert_eq!(
            types,
            vec![
                DocumentType::Experience,
                DocumentType::Education,
                DocumentType::SkillsHard,
                DocumentType::Summary,
            ]
        );
    }

    #[test]
    fn test_blank_skills_are_dropped() {
        let docs = profile_documents(&sample_profile());
        let skills = docs
            .iter()
            .find(|d| d.doc_type == DocumentType::SkillsHard)
            .unwrap();
        assert_eq!(skills.content, "Technical skills: Rust, SQL");
    }

    #[test]
    fn test_experience_document_content_and_metadata() {
        let doc = experience_document(&sample_profile().experiences[0]);
        assert_eq!(
            doc.content,
            "Senior Engineer at Tech Corp (2021 - Present): Led the migration to microservices. Mentored juniors."
        );
        assert_eq!(doc.meta("title"), Some("Senior Engineer"));
        assert_eq!(doc.meta("company"), Some("Tech Corp"));
    }

    #[test]
    fn test_blank_entries_are_skipped() {
        let mut profile = sample_profile();
        profile.experiences.insert(0, Experience::default());
        profile.education.push(Education {
            institution: "  ".to_string(),
            ..Education::default()
        });
        profile.education.push(Education {
            degree: Some("MSc Robotics".to_string()),
            ..Education::default()
        });

        let docs = profile_documents(&profile);
        assert!(docs.iter().all(|d| !d.content.trim().is_empty()));
        assert_eq!(docs[0].meta("title"), Some("Senior Engineer"));
        let education: Vec<&str> = docs
            .iter()
            .filter(|d| d.doc_type == DocumentType::Education)
            .map(|d| d.content.as_str())
            .collect();
        assert_eq!(
            education,
            vec!["BSc Computer Science at University of Technology", "MSc Robotics"]
        );
    }

    #[test]
    fn test_every_document_has_content() {
        let docs = profile_documents(&sample_profile());
        assert!(docs.iter().all(|d| !d.content.trim().is_empty()));
    }

    #[test]
    fn test_sanitized_strips_embedding_and_scratch_keys() {
        let mut doc = Document::new(DocumentType::Experience, "x")
            .with_meta("title", "T")
            .with_meta("_rank", "3");
        doc.embedding = Some(vec![1.0, 0.0]);

        let clean = doc.sanitized();
        assert!(clean.embedding.is_none());
        assert_eq!(clean.meta("title"), Some("T"));
        assert!(clean.meta("_rank").is_none());
    }

    #[test]
    fn test_document_type_serializes_snake_case() {
        let doc = Document::new(DocumentType::SkillsHard, "Rust");
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["type"], "skills_hard");
        assert!(json.get("embedding").is_none());
    }
}
