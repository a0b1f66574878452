use common::helper::error_chain_fmt;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    domain::{
        entities::chat_message::{ChatMessage, ToolCallRequest},
        services::{record_adapter::RecordAdapterError, talent_store::TalentStore},
    },
    ports::chat_model::ToolSpec,
};

pub const UPSERT_CANDIDATE: &str = "upsert_candidate";
pub const SEARCH_CANDIDATE: &str = "search_candidate";
pub const UPSERT_COMPANY: &str = "upsert_company";
pub const SEARCH_COMPANY: &str = "search_company";

/// The operations the model can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    UpsertCandidate {
        name: String,
        email: String,
        resume: String,
    },
    SearchCandidate {
        query: String,
    },
    UpsertCompany {
        company_name: String,
        job_title: String,
        company_query: String,
    },
    SearchCompany {
        query: String,
    },
}

#[derive(Deserialize)]
struct UpsertCandidateArguments {
    name: String,
    email: String,
    resume: String,
}

#[derive(Deserialize)]
struct UpsertCompanyArguments {
    company_name: String,
    job_title: String,
    company_query: String,
}

#[derive(Deserialize)]
struct SearchArguments {
    query: String,
}

impl TryFrom<&ToolCallRequest> for ToolCall {
    type Error = ToolCallError;

    fn try_from(request: &ToolCallRequest) -> Result<Self, Self::Error> {
        let invalid_arguments = |source| ToolCallError::InvalidArguments {
            tool: request.name.clone(),
            source,
        };

        let tool_call = match request.name.as_str() {
            UPSERT_CANDIDATE => {
                let UpsertCandidateArguments {
                    name,
                    email,
                    resume,
                } = serde_json::from_str(&request.arguments).map_err(invalid_arguments)?;
                ToolCall::UpsertCandidate {
                    name,
                    email,
                    resume,
                }
            }
            SEARCH_CANDIDATE => {
                let SearchArguments { query } =
                    serde_json::from_str(&request.arguments).map_err(invalid_arguments)?;
                ToolCall::SearchCandidate { query }
            }
            UPSERT_COMPANY => {
                let UpsertCompanyArguments {
                    company_name,
                    job_title,
                    company_query,
                } = serde_json::from_str(&request.arguments).map_err(invalid_arguments)?;
                ToolCall::UpsertCompany {
                    company_name,
                    job_title,
                    company_query,
                }
            }
            SEARCH_COMPANY => {
                let SearchArguments { query } =
                    serde_json::from_str(&request.arguments).map_err(invalid_arguments)?;
                ToolCall::SearchCompany { query }
            }
            unknown => return Err(ToolCallError::UnknownTool(unknown.to_string())),
        };

        Ok(tool_call)
    }
}

impl ToolCall {
    /// Runs the operation against the talent store and returns the text given back to the model
    ///
    /// Searches return the JSON-encoded list of matches, closest first.
    #[tracing::instrument(name = "Executing tool call", skip(talent_store))]
    pub async fn execute(&self, talent_store: &TalentStore) -> Result<String, ToolCallError> {
        let output = match self {
            ToolCall::UpsertCandidate {
                name,
                email,
                resume,
            } => {
                talent_store.upsert_candidate(name, email, resume).await?;
                format!(
                    "Candidate {} with email {} registered successfully.",
                    name, email
                )
            }
            ToolCall::SearchCandidate { query } => {
                let matches = talent_store.search_candidates(query).await?;
                serde_json::to_string(&matches)?
            }
            ToolCall::UpsertCompany {
                company_name,
                job_title,
                company_query,
            } => {
                talent_store
                    .upsert_company(company_name, job_title, company_query)
                    .await?;
                format!(
                    "Company {} looking for a {} registered successfully.",
                    company_name, job_title
                )
            }
            ToolCall::SearchCompany { query } => {
                let matches = talent_store.search_companies(query).await?;
                serde_json::to_string(&matches)?
            }
        };

        Ok(output)
    }
}

/// Parses and runs a tool call requested by the model
///
/// Failures are not fatal to the conversation: they are reported to the model as the tool output,
/// so it can fix its call or tell the user.
pub async fn run_tool_call(request: &ToolCallRequest, talent_store: &TalentStore) -> ChatMessage {
    let result = match ToolCall::try_from(request) {
        Ok(tool_call) => tool_call.execute(talent_store).await,
        Err(error) => Err(error),
    };

    let content = match result {
        Ok(output) => {
            info!(tool = %request.name, "Tool call succeeded");
            output
        }
        Err(error) => {
            error!(?error, tool = %request.name, "Tool call failed");
            format!("Error: {}\nPlease fix your mistakes.", error)
        }
    };

    ChatMessage::Tool {
        tool_call_id: request.id.clone(),
        content,
    }
}

/// Tools advertised to the model, with the JSON schema of their arguments
pub fn tool_specs() -> Vec<ToolSpec> {
    let search_parameters = json!({
        "type": "object",
        "properties": { "query": { "type": "string" } },
        "required": ["query"],
    });

    vec![
        ToolSpec {
            name: UPSERT_CANDIDATE,
            description: "Registers a job seeker in the candidates database. \
                Registering the same name and email again replaces the resume.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "email": { "type": "string" },
                    "resume": { "type": "string" },
                },
                "required": ["name", "email", "resume"],
            }),
        },
        ToolSpec {
            name: SEARCH_CANDIDATE,
            description: "Searches the candidates database for the job seekers \
                matching the query of a company.",
            parameters: search_parameters.clone(),
        },
        ToolSpec {
            name: UPSERT_COMPANY,
            description: "Registers a company, the job title it wants to fill and \
                the description of the wanted candidate in the companies database.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "company_name": { "type": "string" },
                    "job_title": { "type": "string" },
                    "company_query": { "type": "string" },
                },
                "required": ["company_name", "job_title", "company_query"],
            }),
        },
        ToolSpec {
            name: SEARCH_COMPANY,
            description: "Searches the companies database for the job offers \
                matching the query of a job seeker.",
            parameters: search_parameters,
        },
    ]
}

#[derive(thiserror::Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for the tool {tool}: {source}")]
    InvalidArguments {
        tool: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    RecordAdapterError(#[from] RecordAdapterError),
    #[error("Failed to encode the tool output: {0}")]
    OutputEncodingError(#[from] serde_json::Error),
}

impl std::fmt::Debug for ToolCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
