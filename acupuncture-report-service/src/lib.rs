pub mod age;
pub mod config;
pub mod documents;
pub mod export;
pub mod generation;
pub mod intake;
pub mod models;
pub mod service;
pub mod wizard;

pub use config::{LogFormat, ServiceConfig};
pub use generation::{GENERATION_FAILED_MESSAGE, GenerationError, ReportGenerator};
pub use models::*;
pub use service::{AppState, build_router, create_app};
pub use wizard::{IntakeWizard, WizardEvent, WizardState};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::GeminiResponse;

    const GEMINI_RESPONSE: &str = include_str!("../tests/fixtures/gemini_response.json");

    pub fn sample_response() -> GeminiResponse {
        serde_json::from_str(GEMINI_RESPONSE).expect("fixture parses")
    }
}
