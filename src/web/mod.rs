mod assets;

use std::{
    collections::VecDeque,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use tokio::{net::TcpListener, sync::Mutex};
use tracing::{error, info, warn};

use crate::{
    config::AppConfig,
    generator::{GenerationRequest, MapGenerator},
    grid::{GridError, HexMap},
    render::PngRenderer,
    rng,
    terrain::TerrainKind,
};

const DEFAULT_DIMENSION: usize = 16;
const KEPT_RENDERS: usize = 8;

struct RenderedMap {
    version: u64,
    png: Bytes,
}

/// Recent renders, so each result page keeps showing its own image.
#[derive(Default)]
struct RenderHistory {
    last_version: u64,
    renders: VecDeque<RenderedMap>,
}

impl RenderHistory {
    fn push(&mut self, png: Bytes) -> u64 {
        self.last_version += 1;
        if self.renders.len() == KEPT_RENDERS {
            self.renders.pop_front();
        }
        self.renders.push_back(RenderedMap {
            version: self.last_version,
            png,
        });
        self.last_version
    }

    /// The requested version while it is still kept, or the newest render.
    fn get(&self, version: Option<u64>) -> Option<Bytes> {
        let rendered = match version {
            Some(version) => self.renders.iter().find(|m| m.version == version),
            None => self.renders.back(),
        };
        rendered.map(|m| m.png.clone())
    }
}

struct AppState {
    generator: MapGenerator,
    renderer: PngRenderer,
    default_terrain: TerrainKind,
    master_seed: Option<u64>,
    max_dimension: usize,
    output_path: PathBuf,
    requests: AtomicU64,
    renders: Mutex<RenderHistory>,
}

impl AppState {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            generator: MapGenerator::new(Arc::new(config.terrain_tables())),
            renderer: PngRenderer::new(config.output.hex_radius),
            default_terrain: config.map.default_terrain,
            master_seed: config.map.seed,
            max_dimension: config.server.max_dimension,
            output_path: config.output.path.clone(),
            requests: AtomicU64::new(0),
            renders: Mutex::new(RenderHistory::default()),
        }
    }

    /// Explicit seed, else one derived from the configured master seed, else
    /// fresh entropy. Every request gets its own source.
    fn seed_for(&self, requested: Option<u64>) -> u64 {
        let stream = self.requests.fetch_add(1, Ordering::SeqCst);
        match (requested, self.master_seed) {
            (Some(seed), _) => seed,
            (None, Some(master)) => rng::derive_seed(master, stream),
            (None, None) => rand::random(),
        }
    }
}

#[derive(Debug)]
enum WebError {
    BadRequest(String),
    Internal(anyhow::Error),
}

impl From<GridError> for WebError {
    fn from(err: GridError) -> Self {
        match err {
            GridError::InvalidDimensions { .. } => WebError::BadRequest(err.to_string()),
            other => WebError::Internal(other.into()),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        match self {
            WebError::BadRequest(message) => {
                warn!(%message, "rejected map request");
                (StatusCode::BAD_REQUEST, message).into_response()
            }
            WebError::Internal(err) => {
                error!("map generation failed: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "map generation failed".to_string(),
                )
                    .into_response()
            }
        }
    }
}

pub async fn run(config: AppConfig) -> Result<()> {
    config.validate()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let state = Arc::new(AppState::from_config(&config));
    let router = router(state);

    info!("hex map generator live at http://{addr} (Ctrl+C to stop)");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/generate_map", post(generate_map))
        .route("/map.png", get(map_image))
        .route("/api/map", get(map_json))
        .with_state(state)
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down web UI");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        assets::STYLES_CSS,
    )
}

#[derive(Debug, Default, Deserialize)]
struct MapForm {
    #[serde(default)]
    rows: String,
    #[serde(default)]
    cols: String,
    #[serde(default)]
    seed: String,
}

#[derive(Debug, Default, Deserialize)]
struct ImageQuery {
    v: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MapQuery {
    rows: Option<String>,
    cols: Option<String>,
    seed: Option<u64>,
    default_terrain: Option<String>,
}

/// Parse a form dimension. Blank means the default; anything that is not a
/// positive integer up to `max` is rejected before it reaches the grid.
fn parse_dimension(name: &str, raw: &str, max: usize) -> Result<usize, WebError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_DIMENSION.min(max));
    }
    let value: i64 = raw
        .parse()
        .map_err(|_| WebError::BadRequest(format!("{name} must be an integer, got '{raw}'")))?;
    if value <= 0 {
        return Err(WebError::BadRequest(format!(
            "{name} must be a positive integer, got {value}"
        )));
    }
    let value = value as u64;
    if value > max as u64 {
        return Err(WebError::BadRequest(format!(
            "{name} must be at most {max}, got {value}"
        )));
    }
    Ok(value as usize)
}

fn parse_seed(raw: &str) -> Result<Option<u64>, WebError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse()
        .map(Some)
        .map_err(|_| WebError::BadRequest(format!("seed must be a non-negative integer, got '{raw}'")))
}

async fn generate_in_background(
    state: &Arc<AppState>,
    request: GenerationRequest,
) -> Result<HexMap, WebError> {
    let worker_state = Arc::clone(state);
    tokio::task::spawn_blocking(move || worker_state.generator.generate(&request))
        .await
        .map_err(|err| WebError::Internal(err.into()))?
        .map_err(WebError::from)
}

async fn generate_map(
    State(state): State<Arc<AppState>>,
    Form(form): Form<MapForm>,
) -> Result<Html<String>, WebError> {
    let rows = parse_dimension("rows", &form.rows, state.max_dimension)?;
    let cols = parse_dimension("cols", &form.cols, state.max_dimension)?;
    let seed = state.seed_for(parse_seed(&form.seed)?);
    info!(rows, cols, seed, "generating map");

    let request = GenerationRequest::new(rows, cols)
        .with_default_terrain(state.default_terrain)
        .with_seed(seed);
    let map = generate_in_background(&state, request).await?;

    let renderer = state.renderer;
    let render_input = map.clone();
    let png = tokio::task::spawn_blocking(move || renderer.encode_png(&render_input))
        .await
        .map_err(|err| WebError::Internal(err.into()))?
        .map_err(|err| WebError::Internal(err.into()))?;

    let version = {
        let mut renders = state.renders.lock().await;
        let png = Bytes::from(png);
        // written under the lock so the file always holds the newest render
        write_output(&state.output_path, &png).await;
        renders.push(png)
    };

    Ok(Html(map_page(&map, seed, &format!("/map.png?v={version}"))))
}

async fn write_output(path: &Path, png: &[u8]) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!("unable to create {}: {err}", parent.display());
        }
    }
    if let Err(err) = tokio::fs::write(path, png).await {
        warn!("unable to write {}: {err}", path.display());
    }
}

async fn map_image(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ImageQuery>,
) -> Response {
    match state.renders.lock().await.get(query.v) {
        Some(png) => (
            [
                (header::CONTENT_TYPE, "image/png"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            Body::from(png),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "no such map image").into_response(),
    }
}

async fn map_json(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MapQuery>,
) -> Result<Json<HexMap>, WebError> {
    let rows = parse_dimension("rows", query.rows.as_deref().unwrap_or(""), state.max_dimension)?;
    let cols = parse_dimension("cols", query.cols.as_deref().unwrap_or(""), state.max_dimension)?;
    let default_terrain = match query.default_terrain.as_deref() {
        Some(name) => name
            .parse::<TerrainKind>()
            .map_err(|err| WebError::BadRequest(err.to_string()))?,
        None => state.default_terrain,
    };
    let seed = state.seed_for(query.seed);
    info!(rows, cols, seed, "generating map (json)");

    let request = GenerationRequest::new(rows, cols)
        .with_default_terrain(default_terrain)
        .with_seed(seed);
    let map = generate_in_background(&state, request).await?;
    Ok(Json(map))
}

fn map_page(map: &HexMap, seed: u64, image_url: &str) -> String {
    let summary = map
        .terrain_counts()
        .into_iter()
        .map(|(terrain, count)| format!("        <tr><td>{terrain}</td><td>{count}</td></tr>"))
        .collect::<Vec<_>>()
        .join("\n");

    assets::MAP_HTML
        .replace("{{rows}}", &map.rows().to_string())
        .replace("{{cols}}", &map.cols().to_string())
        .replace("{{seed}}", &seed.to_string())
        .replace("{{image}}", image_url)
        .replace("{{summary}}", &summary)
        .replace("{{features}}", &map.feature_count().to_string())
        .replace("{{resources}}", &map.resource_count().to_string())
}
