use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Path, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::{Next, from_fn},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;
use wizard_flow::{FlowError, FlowRunner, InMemorySessionStorage, Session};

use crate::{
    age::age_on,
    config::ServiceConfig,
    documents::{Document, render_clinical_report, render_treatment_protocol},
    export::{
        ExportError, PDF_MIME_TYPE, WORD_MIME_TYPE, export_filename, export_pdf, export_word,
    },
    generation::{GENERATION_FAILED_MESSAGE, GeminiClient, GenerationError, ReportGenerator},
    models::{GeminiResponse, Patient, PatientForm, SessionData, SessionResponse, TcmForm},
    wizard::{IntakeWizard, WizardEvent, WizardState},
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, code: &str, message: &str, details: &str) -> ApiError {
    (
        status,
        Json(json!({
            "error": message,
            "code": code,
            "details": details
        })),
    )
}

fn bad_request_error(message: &str, details: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation_failed", message, details)
}

fn not_found_error(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Session not found",
            "code": "session_not_found",
            "session_id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        message,
        details,
    )
}

fn flow_error(e: FlowError, session_id: &str) -> ApiError {
    match e {
        FlowError::SessionNotFound(_) => not_found_error(session_id),
        FlowError::Rejected(message) => bad_request_error("Submission rejected", &message),
        FlowError::InvalidTransition { .. } | FlowError::StaleOperation { .. } => api_error(
            StatusCode::CONFLICT,
            "invalid_transition",
            "Action not allowed at this step",
            &e.to_string(),
        ),
        FlowError::StorageError(_) => {
            error!(session_id = %session_id, error = %e, "Session storage failure");
            internal_error("Failed to update session", &e.to_string())
        }
    }
}

fn export_error(e: ExportError, session_id: &str) -> ApiError {
    match e {
        ExportError::NotReady => api_error(
            StatusCode::CONFLICT,
            "not_ready",
            "No report available yet",
            &e.to_string(),
        ),
        _ => {
            error!(session_id = %session_id, error = %e, "Document export failed");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "export_failed",
                "Document export failed",
                &e.to_string(),
            )
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub runner: FlowRunner<IntakeWizard>,
    pub generator: Arc<dyn ReportGenerator>,
    pub config: Arc<ServiceConfig>,
}

impl AppState {
    /// In-memory sessions driven by the given wizard and report generator.
    /// Sessions idle for `config.session_ttl` are swept in the background.
    pub fn new(
        config: ServiceConfig,
        wizard: IntakeWizard,
        generator: Arc<dyn ReportGenerator>,
    ) -> Self {
        let storage = Arc::new(InMemorySessionStorage::<WizardState>::new());
        if tokio::runtime::Handle::try_current().is_ok() {
            storage.spawn_idle_sweeper(config.session_ttl, config.sweep_period());
        } else {
            warn!("No async runtime available, idle sessions will not be evicted");
        }
        Self {
            runner: FlowRunner::new(Arc::new(wizard), storage),
            generator,
            config: Arc::new(config),
        }
    }

    fn today(&self) -> NaiveDate {
        self.runner.reducer().today()
    }
}

/// Build the production router, talking to Gemini with `config.gemini`
pub fn create_app(config: ServiceConfig) -> Result<Router, GenerationError> {
    let generator = GeminiClient::new(config.gemini.clone())?;
    let state = AppState::new(config, IntakeWizard::new(), Arc::new(generator));
    Ok(build_router(state))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{session_id}", get(get_session).delete(delete_session))
        .route("/sessions/{session_id}/patient", post(submit_patient))
        .route("/sessions/{session_id}/tcm", post(submit_tcm))
        .route("/sessions/{session_id}/retry", post(retry))
        .route("/sessions/{session_id}/start-over", post(start_over))
        .route("/sessions/{session_id}/report", get(preview_report))
        .route("/sessions/{session_id}/protocol", get(preview_protocol))
        .route("/sessions/{session_id}/report.docx", get(download_report))
        .route("/sessions/{session_id}/protocol.pdf", get(download_protocol))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tag every request with a correlation id and run it inside a span carrying it
async fn correlation_id_middleware(mut request: Request, next: Next) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }
    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Acupuncture Report Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "TCM acupuncture intake wizard producing a clinical report and a treatment protocol",
        "endpoints": {
            "POST /sessions": "Start a new intake session",
            "GET /sessions/{session_id}": "Current wizard step and data",
            "DELETE /sessions/{session_id}": "Discard a session",
            "POST /sessions/{session_id}/patient": "Submit patient details",
            "POST /sessions/{session_id}/tcm": "Submit the TCM questionnaire and start report generation",
            "POST /sessions/{session_id}/retry": "Return to patient intake after a failed generation",
            "POST /sessions/{session_id}/start-over": "Clear all data and restart",
            "GET /sessions/{session_id}/report": "Clinical report document tree",
            "GET /sessions/{session_id}/protocol": "Treatment protocol document tree",
            "GET /sessions/{session_id}/report.docx": "Download the clinical report",
            "GET /sessions/{session_id}/protocol.pdf": "Download the treatment protocol",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

fn session_view(session: &Session<WizardState>, today: NaiveDate) -> SessionResponse {
    let state = &session.state;
    let (response, error) = match state {
        WizardState::Ready { response, .. } => (Some(response.clone()), None),
        WizardState::Error { message } => (None, Some(message.clone())),
        _ => (None, None),
    };

    SessionResponse {
        session_id: session.id.clone(),
        step: state.label().to_string(),
        epoch: session.epoch,
        patient: state.patient().cloned(),
        age: state.patient().map(|patient| age_on(patient.dob, today)),
        session_data: state.session().cloned(),
        response,
        error,
        waiting_for_input: state.waiting_for_input(),
    }
}

async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state.runner.start().await.map_err(|e| {
        error!(error = %e, "Failed to create session");
        internal_error("Failed to create session", &e.to_string())
    })?;
    Ok((
        StatusCode::CREATED,
        Json(session_view(&session, state.today())),
    ))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = state
        .runner
        .session(&session_id)
        .await
        .map_err(|e| flow_error(e, &session_id))?;
    Ok(Json(session_view(&session, state.today())))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    state
        .runner
        .discard(&session_id)
        .await
        .map_err(|e| flow_error(e, &session_id))?;
    Ok(Json(json!({
        "session_id": session_id,
        "status": "discarded"
    })))
}

async fn dispatch(state: &AppState, session_id: &str, event: WizardEvent) -> ApiResult<SessionResponse> {
    let label = event.label();
    let session = state
        .runner
        .dispatch(session_id, event)
        .await
        .map_err(|e| {
            warn!(session_id = %session_id, event = label, error = %e, "Event not applied");
            flow_error(e, session_id)
        })?;
    info!(
        session_id = %session_id,
        event = label,
        state = session.state.label(),
        "Wizard advanced"
    );
    Ok(Json(session_view(&session, state.today())))
}

async fn submit_patient(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<PatientForm>, JsonRejection>,
) -> ApiResult<SessionResponse> {
    let Json(form) = payload.map_err(|e| bad_request_error("Invalid patient form", &e.body_text()))?;
    dispatch(&state, &session_id, WizardEvent::SubmitPatient(form)).await
}

async fn submit_tcm(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<TcmForm>, JsonRejection>,
) -> ApiResult<SessionResponse> {
    let Json(form) =
        payload.map_err(|e| bad_request_error("Invalid TCM questionnaire", &e.body_text()))?;

    let generator = state.generator.clone();
    let today = state.today();
    let limit = state.config.gemini.timeout;

    let session = state
        .runner
        .dispatch_and_spawn(&session_id, WizardEvent::SubmitTcm(form), move |loading| {
            generate_report(generator, loading, today, limit)
        })
        .await
        .map_err(|e| {
            warn!(session_id = %session_id, error = %e, "TCM submission not applied");
            flow_error(e, &session_id)
        })?;

    info!(
        session_id = %session_id,
        epoch = session.epoch,
        "Report generation started"
    );
    Ok(Json(session_view(&session, today)))
}

/// Run one generation for a `Loading` state and turn its outcome into the follow-up event.
///
/// Every failure collapses to the same user-facing message; the cause is only logged.
async fn generate_report(
    generator: Arc<dyn ReportGenerator>,
    loading: WizardState,
    today: NaiveDate,
    limit: Duration,
) -> WizardEvent {
    let (patient, session) = match loading {
        WizardState::Loading { patient, session } => (patient, session),
        other => {
            error!(state = other.label(), "Generation started outside the loading step");
            return WizardEvent::GenerationFailed(GENERATION_FAILED_MESSAGE.to_string());
        }
    };

    let age = age_on(patient.dob, today);
    let outcome = match tokio::time::timeout(limit, generator.generate(&patient, age, &session)).await
    {
        Ok(outcome) => outcome,
        Err(_) => Err(GenerationError::Timeout(limit.as_secs())),
    };

    match outcome {
        Ok(response) => {
            info!(
                points = response.protocol_data.treatment_points_detailed.len(),
                "Report generated"
            );
            WizardEvent::GenerationSucceeded(response)
        }
        Err(e) => {
            error!(error = %e, "Report generation failed");
            WizardEvent::GenerationFailed(GENERATION_FAILED_MESSAGE.to_string())
        }
    }
}

async fn retry(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    dispatch(&state, &session_id, WizardEvent::Retry).await
}

async fn start_over(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    dispatch(&state, &session_id, WizardEvent::StartOver).await
}

/// The data a finished session holds
async fn ready_session(
    state: &AppState,
    session_id: &str,
) -> Result<(Patient, SessionData, GeminiResponse), ApiError> {
    let session = state
        .runner
        .session(session_id)
        .await
        .map_err(|e| flow_error(e, session_id))?;
    match session.state {
        WizardState::Ready {
            patient,
            session,
            response,
        } => Ok((patient, session, response)),
        _ => Err(export_error(ExportError::NotReady, session_id)),
    }
}

async fn clinical_report(state: &AppState, session_id: &str) -> Result<(Patient, Document), ApiError> {
    let (patient, session, response) = ready_session(state, session_id).await?;
    let document = render_clinical_report(
        &patient,
        &session.session_number,
        &response.report_data,
        &state.config.provider,
        state.today(),
    );
    Ok((patient, document))
}

async fn treatment_protocol(
    state: &AppState,
    session_id: &str,
) -> Result<(Patient, Document), ApiError> {
    let (patient, session, response) = ready_session(state, session_id).await?;
    let document = render_treatment_protocol(
        &patient,
        &session.session_number,
        &response.protocol_data,
        &state.config.provider,
        state.today(),
    );
    Ok((patient, document))
}

async fn preview_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Document> {
    let (_, document) = clinical_report(&state, &session_id).await?;
    Ok(Json(document))
}

async fn preview_protocol(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Document> {
    let (_, document) = treatment_protocol(&state, &session_id).await?;
    Ok(Json(document))
}

fn attachment(
    bytes: Vec<u8>,
    mime: &'static str,
    filename: &str,
) -> Result<Response, ExportError> {
    let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', ""));
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ExportError::InvalidFilename(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(mime)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn download_report(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let (patient, document) = clinical_report(&state, &session_id).await?;
    if document.is_empty() {
        return Err(export_error(ExportError::EmptyDocument, &session_id));
    }

    let bytes = export_word(&document);
    let filename = export_filename("Referto", &patient.name, "docx");
    info!(session_id = %session_id, filename = %filename, bytes = bytes.len(), "Report exported");
    attachment(bytes, WORD_MIME_TYPE, &filename).map_err(|e| export_error(e, &session_id))
}

async fn download_protocol(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    let (patient, document) = treatment_protocol(&state, &session_id).await?;
    let scale = state.config.pdf_scale;

    let bytes = tokio::task::spawn_blocking(move || export_pdf(&document, scale))
        .await
        .map_err(|e| ExportError::Task(e.to_string()))
        .and_then(|result| result)
        .map_err(|e| export_error(e, &session_id))?;

    let filename = export_filename("Protocollo", &patient.name, "pdf");
    info!(session_id = %session_id, filename = %filename, bytes = bytes.len(), "Protocol exported");
    attachment(bytes, PDF_MIME_TYPE, &filename).map_err(|e| export_error(e, &session_id))
}
