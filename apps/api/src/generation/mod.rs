// Document generation: an LLM fills a template, the compliance validator
// checks the rendered document, and the controller retries with feedback.
// All LLM calls go through llm_client.

pub mod controller;
pub mod generator;
pub mod handlers;
pub mod prompts;

pub use controller::GenerationController;
pub use generator::{GenerationError, LlmDocumentGenerator};
