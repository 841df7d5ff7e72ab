pub mod gemini;
pub mod prompt;
pub mod schema;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{GeminiResponse, Patient, SessionData};

pub use gemini::{GeminiClient, parse_generate_content};
pub use prompt::build_prompt;
pub use schema::response_schema;

/// The only message clients ever see for a failed generation
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate report from Gemini API.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API key is not configured")]
    MissingCredential,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("generation API returned {status}: {body}")]
    UpstreamStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("generation API returned no candidate text")]
    NoCandidate,

    #[error("prompt blocked by the generation API: {0}")]
    Blocked(String),

    #[error("response does not match the report schema: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("generation timed out after {0} seconds")]
    Timeout(u64),
}

/// Produces the clinical report and treatment protocol for one completed intake.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(
        &self,
        patient: &Patient,
        age: u32,
        session: &SessionData,
    ) -> Result<GeminiResponse, GenerationError>;
}
