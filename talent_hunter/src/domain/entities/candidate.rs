use serde::{Deserialize, Serialize};

use super::validation::{require_non_empty, ValidationError};

/// A job seeker registered through the chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub email: String,
    /// Free text, the only field used to compute the candidate embeddings
    pub resume: String,
}

impl Candidate {
    /// `name` and `email` identify the candidate and are required.
    /// An empty `resume` is accepted.
    pub fn parse(name: &str, email: &str, resume: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            name: require_non_empty("name", name)?,
            email: require_non_empty("email", email)?,
            resume: resume.to_string(),
        })
    }
}
