//! Script execution streamed as Server-Sent Events.

use std::collections::HashMap;
use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::Stream;
use serde::Deserialize;

use crate::exec::ExecRequest;
use crate::web::auth::SessionAuth;
use crate::web::error::WebError;
use crate::web::state::AppState;

/// Request to run a script in the caller's session.
#[derive(Debug, Default, Deserialize)]
pub struct ExecScriptRequest {
    /// Id of a registered executable; takes precedence over `script`
    #[serde(default)]
    pub executable_id: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Applied for this run only
    #[serde(default)]
    pub env_vars_override: HashMap<String, String>,
    /// Values for `{{ .Name }}` placeholders in a registered executable
    #[serde(default)]
    pub template_values: HashMap<String, String>,
    #[serde(default)]
    pub capture_files: bool,
}

/// Turn the request body into an engine request.
fn resolve_request(state: &AppState, body: ExecScriptRequest) -> Result<ExecRequest, WebError> {
    let mut request = match body.executable_id.as_deref() {
        Some(id) => {
            let executable = state.executables.lookup(id)?;
            ExecRequest::from_executable(&executable, &body.template_values)
        }
        None => {
            let script = body
                .script
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    WebError::BadRequest("Either executable_id or script is required".to_string())
                })?;
            ExecRequest::new(script)
        }
    };

    if let Some(language) = body.language.filter(|l| !l.trim().is_empty()) {
        request = request.with_language(language);
    }
    if body.capture_files {
        request = request.with_file_capture(state.config.resolved_output_path());
    }
    Ok(request.with_env_overrides(body.env_vars_override))
}

/// Run a script and stream its events.
///
/// Each event is sent with its variant name as the SSE event and the JSON
/// encoding as data. The stream ends after `done`.
pub async fn execute_script(
    State(state): State<AppState>,
    auth: SessionAuth,
    Json(body): Json<ExecScriptRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, WebError> {
    let request = resolve_request(&state, body)?.with_session(auth.session.exec_context());
    let rx = state.engine.execute(request)?;

    let stream = async_stream::stream! {
        let mut rx = rx;
        while let Some(event) = rx.recv().await {
            let data = serde_json::to_string(&event).unwrap_or_default();
            yield Ok::<_, Infallible>(Event::default().event(event.event_name()).data(data));
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
