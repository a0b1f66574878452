use serde::{Deserialize, Serialize};

use super::validation::{require_non_empty, ValidationError};

/// A company looking for someone to fill a position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub company_name: String,
    pub job_title: String,
    /// Description of the wanted candidate, the only field used to compute the company embeddings
    pub company_query: String,
}

impl Company {
    pub fn parse(
        company_name: &str,
        job_title: &str,
        company_query: &str,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            company_name: require_non_empty("company_name", company_name)?,
            job_title: require_non_empty("job_title", job_title)?,
            company_query: company_query.to_string(),
        })
    }
}
