use anyhow::{Context, Result};
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::constants::{DEFAULT_CAST_SIZE, MAX_SITUATION_CHARS};
use crate::error::{ApiError, GenerationError};
use crate::layout::{self, Position};
use crate::llm_interaction::{GenerationRequest, OpenAiGenerator, TextGenerator};
use crate::locale::{Locale, Text};
use crate::personas::{Persona, PersonaRegistry};
use crate::prompt;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub personas: Arc<PersonaRegistry>,
    pub generator: Arc<dyn TextGenerator>,
    pub templates: Arc<AutoReloader>,
    pub generation_timeout: Duration,
}

impl AppState {
    pub fn new(
        personas: Arc<PersonaRegistry>,
        generator: Arc<dyn TextGenerator>,
        templates_dir: PathBuf,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            personas,
            generator,
            templates: Arc::new(create_minijinja_env(templates_dir)),
            generation_timeout,
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

/// A validated `POST /api/ghost-chat` body.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub situation: String,
    pub persona_ids: Vec<String>,
    pub locale: Locale,
}

impl ChatRequest {
    /// Checks presence and type of all three fields. Error messages use the
    /// request's own locale when it is valid, Japanese otherwise.
    pub fn from_json(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ApiError::validation(Locale::default(), Text::InvalidBody))?;

        let requested_locale = value
            .get("locale")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Locale>().ok());
        let messages = requested_locale.unwrap_or_default();

        let situation = match value.get("situation").and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s.to_string(),
            _ => return Err(ApiError::validation(messages, Text::SituationRequired)),
        };

        let persona_ids = match value.get("personaIds").and_then(Value::as_array) {
            Some(ids) if !ids.is_empty() => ids
                .iter()
                .map(|id| id.as_str().map(str::to_string))
                .collect::<Option<Vec<String>>>()
                .ok_or_else(|| ApiError::validation(messages, Text::PersonaIdsRequired))?,
            _ => return Err(ApiError::validation(messages, Text::PersonaIdsRequired)),
        };

        let locale = requested_locale.ok_or_else(|| ApiError::validation(messages, Text::LocaleRequired))?;

        Ok(Self {
            situation,
            persona_ids,
            locale,
        })
    }
}

async fn ghost_chat_handler(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = ChatRequest::from_json(&body)?;
    let locale = request.locale;

    let cast = state.personas.resolve(&request.persona_ids);
    if cast.is_empty() {
        return Err(ApiError::validation(locale, Text::NoValidPersonas));
    }
    info!(
        personas = ?cast.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        %locale,
        "Generating ghost conversation"
    );

    let generation = GenerationRequest {
        system_prompt: prompt::build_system_prompt(&request.situation, &cast, locale),
        user_message: prompt::user_instruction(locale).to_string(),
    };

    let stream = tokio::time::timeout(state.generation_timeout, state.generator.generate(generation))
        .await
        .map_err(|_| GenerationError::Timeout(state.generation_timeout))
        .and_then(|result| result)
        .map_err(|source| ApiError::Generation { source, locale })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response())
}

async fn list_personas_handler(State(state): State<AppState>) -> Json<Vec<Persona>> {
    Json(state.personas.all().to_vec())
}

#[derive(Debug, Deserialize)]
struct RandomQuery {
    count: Option<usize>,
}

async fn random_personas_handler(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
) -> Json<Vec<Persona>> {
    let count = query.count.unwrap_or(DEFAULT_CAST_SIZE);
    Json(state.personas.select_random(count).into_iter().cloned().collect())
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    locale: Option<String>,
    situation: Option<String>,
    personas: Option<String>,
}

impl PageQuery {
    fn locale(&self) -> Locale {
        self.locale
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// A persona placed on the stage, as the chat template sees it.
#[derive(Debug, Serialize)]
struct StageSlot<'a> {
    persona: &'a Persona,
    desktop: Position,
    mobile: Position,
    bubble_desktop: Position,
    bubble_mobile: Position,
    entrance_delay_ms: u64,
}

fn stage_slots<'a>(cast: &[&'a Persona]) -> Vec<StageSlot<'a>> {
    let desktop = layout::character_positions(cast.len(), false);
    let mobile = layout::character_positions(cast.len(), true);
    cast.iter()
        .enumerate()
        .map(|(i, persona)| StageSlot {
            persona,
            desktop: desktop[i],
            mobile: mobile[i],
            bubble_desktop: layout::bubble_position(desktop[i], false),
            bubble_mobile: layout::bubble_position(mobile[i], true),
            entrance_delay_ms: layout::entrance_delay(i).as_millis() as u64,
        })
        .collect()
}

fn render(state: &AppState, name: &str, context: minijinja::Value) -> Result<Html<String>, Response> {
    state
        .templates
        .acquire_env()
        .and_then(|env| env.get_template(name).and_then(|tmpl| tmpl.render(context)))
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template {}: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        })
}

async fn index_handler(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let locale = query.locale();
    let cast = state.personas.select_random(DEFAULT_CAST_SIZE);
    let cast_ids = cast.iter().map(|p| p.id.as_str()).collect::<Vec<_>>().join(",");
    let context = minijinja::context! {
        lang => locale.as_str(),
        title => locale.text(Text::Title),
        placeholder => locale.text(Text::SituationPlaceholder),
        submit => locale.text(Text::Submit),
        max_length => MAX_SITUATION_CHARS,
        personas => state.personas.all(),
        cast_ids => cast_ids,
    };
    render(&state, "index.html", context).into_response()
}

async fn chat_page_handler(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let locale = query.locale();
    let situation = query.situation.as_deref().map(str::trim).unwrap_or_default();
    let ids: Vec<&str> = query
        .personas
        .as_deref()
        .map(|s| s.split(',').collect())
        .unwrap_or_default();
    let cast = state.personas.resolve(&ids);

    let error = if situation.is_empty() || ids.is_empty() {
        Some(locale.text(Text::SituationRequired))
    } else if cast.is_empty() {
        Some(locale.text(Text::NoValidPersonas))
    } else {
        None
    };
    let status = if error.is_some() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    let context = minijinja::context! {
        lang => locale.as_str(),
        title => locale.text(Text::Title),
        situation => situation,
        error => error,
        error_title => locale.text(Text::ErrorTitle),
        loading => locale.text(Text::Loading),
        mobile_breakpoint => layout::MOBILE_BREAKPOINT_PX,
        slots => stage_slots(&cast),
        persona_ids => cast.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        messages => minijinja::context! {
            timeout => locale.text(Text::Timeout),
            network => locale.text(Text::NetworkError),
            failed => locale.text(Text::GhostsDidNotAppear),
        },
    };
    match render(&state, "chat.html", context) {
        Ok(page) => (status, page).into_response(),
        Err(response) => response,
    }
}

/// All routes, with request tracing.
pub fn router(state: AppState, static_dir: PathBuf) -> Router {
    // Serve static files from the `static` directory
    let static_files_service = ServeDir::new(static_dir).not_found_service(tower::service_fn(|_: axum::extract::Request| async {
        Ok::<_, std::convert::Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
    }));

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", get(chat_page_handler))
        .route("/api/ghost-chat", post(ghost_chat_handler))
        .route("/api/personas", get(list_personas_handler))
        .route("/api/personas/random", get(random_personas_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

/// Serves `app` on an already-bound listener until the server fails.
pub async fn serve_on(listener: TcpListener, app: Router) -> Result<()> {
    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")
}

pub async fn start_web_server(config: ServerConfig, personas: Arc<PersonaRegistry>) -> Result<()> {
    if config.api_key.is_empty() {
        tracing::warn!("OPENAI_API_KEY is not set; generation requests will be rejected upstream");
    }
    let generator = Arc::new(OpenAiGenerator::new(
        &config.api_base_url,
        &config.api_key,
        &config.model,
        config.temperature,
    ));
    let state = AppState::new(
        personas,
        generator,
        config.templates_dir.clone(),
        config.generation_timeout,
    );
    let app = router(state, config.static_dir.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Web server listening on http://{}", addr);

    // Bind using tokio::net::TcpListener
    let listener = TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve_on(listener, app).await
}
