pub mod posting;
pub mod profile;

pub use posting::JobPosting;
pub use profile::{first_sentence, Education, Experience, Profile};
