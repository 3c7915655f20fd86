use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use axum::Router;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{
    ServeArgs,
    config::{Config, DEFAULT_CONFIG_FILE},
    render::{ChangeKind, DocumentRenderer, FileWatcher, RenderRequest, WatchEvent, WatchPaths},
    services::Services,
    template::Template,
};

const LIVE_RELOAD_PATH: &str = "/_formadoc/live-reload";

const LIVE_RELOAD_SCRIPT: &str = r#"<script>new EventSource("/_formadoc/live-reload").addEventListener("reload", function () { location.reload(); });</script>"#;

// =============================================================================
// State
// =============================================================================

/// Template and variables files shown at `/`.
#[derive(Debug, Clone)]
struct PreviewFiles {
    template: PathBuf,
    data: Option<PathBuf>,
}

struct AppState {
    /// Swapped when the config or records file changes.
    renderer: RwLock<Arc<DocumentRenderer>>,
    preview: Option<PreviewFiles>,
    reload_tx: broadcast::Sender<()>,
    live_reload: bool,
}

impl AppState {
    fn renderer(&self) -> Arc<DocumentRenderer> {
        match self.renderer.read() {
            Ok(renderer) => renderer.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_renderer(&self, renderer: DocumentRenderer) {
        let renderer = Arc::new(renderer);
        match self.renderer.write() {
            Ok(mut current) => *current = renderer,
            Err(poisoned) => *poisoned.into_inner() = renderer,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Body of `POST /api/render`.
#[derive(Debug, Deserialize)]
struct RenderBody {
    template: Template,
    #[serde(default, alias = "data")]
    variables: Value,
    #[serde(flatten)]
    request: RenderRequest,
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenderBody>,
) -> Response {
    let renderer = state.renderer();
    match renderer
        .render(&body.template, &body.variables, &body.request)
        .await
    {
        Ok(document) => Json(document).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

/// Render the preview files, re-read on every request.
async fn preview_handler(State(state): State<Arc<AppState>>) -> Response {
    let Some(preview) = &state.preview else {
        return (
            StatusCode::NOT_FOUND,
            "No preview template, start the server with --template",
        )
            .into_response();
    };

    let result = async {
        let template = super::read_template(&preview.template).await?;
        let data = super::read_data(preview.data.as_deref()).await?;
        let document = state
            .renderer()
            .render(&template, &data, &RenderRequest::default())
            .await?;
        Ok::<_, anyhow::Error>(document)
    }
    .await;

    match result {
        Ok(document) => {
            for warning in &document.warnings {
                eprintln!("  warning: {warning}");
            }
            let html = if state.live_reload {
                document
                    .html
                    .replacen("</body>", &format!("{LIVE_RELOAD_SCRIPT}</body>"), 1)
            } else {
                document.html
            };
            Html(html).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "preview failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into_response()
        }
    }
}

/// SSE handler for live reload notifications.
async fn live_reload_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.reload_tx.subscribe();
    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(_) => {
                    yield Ok(Event::default().event("reload").data("reload"));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    // Missed some messages, the next reload is enough
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn health_handler() -> &'static str {
    "ok"
}

fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(preview_handler))
        .route("/api/render", post(render_handler))
        .route("/health", get(health_handler))
        .route(LIVE_RELOAD_PATH, get(live_reload_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Command
// =============================================================================

pub async fn run(args: &ServeArgs) -> Result<(), anyhow::Error> {
    let config_path = super::absolute(
        args.config_file
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_CONFIG_FILE)),
    )?;
    let records = args.records.as_deref().map(super::absolute).transpose()?;

    let (config, renderer) = build_renderer(&config_path, records.as_deref())?;

    let preview = match &args.template {
        Some(template) => Some(PreviewFiles {
            template: super::absolute(template)?,
            data: args.data.as_deref().map(super::absolute).transpose()?,
        }),
        None => None,
    };

    // Create broadcast channel for live reload
    let (reload_tx, _) = broadcast::channel::<()>(16);

    let state = Arc::new(AppState {
        renderer: RwLock::new(Arc::new(renderer)),
        preview: preview.clone(),
        reload_tx,
        live_reload: args.watch && config.dev.live_reload,
    });

    // Set up file watcher if enabled
    let _watcher_handle = match (&preview, args.watch) {
        (Some(preview), true) => {
            let watch_paths = WatchPaths {
                template: preview.template.clone(),
                data: preview.data.clone(),
                records: records.clone(),
                config: config_path.clone(),
            };

            match FileWatcher::new(&config.dev.watch, &watch_paths) {
                Ok(watcher) => {
                    println!("Watching for changes...");
                    let watcher_state = state.clone();

                    Some(tokio::task::spawn_blocking(move || {
                        while let Some(event) = watcher.recv() {
                            match event {
                                WatchEvent::FilesChanged(changes) => {
                                    println!(
                                        "\nDetected {} change(s), reloading...",
                                        changes.len()
                                    );
                                    let rebuild = changes
                                        .iter()
                                        .any(|c| matches!(c, ChangeKind::Config | ChangeKind::Records));
                                    if rebuild {
                                        match build_renderer(&config_path, records.as_deref()) {
                                            Ok((_, renderer)) => {
                                                watcher_state.replace_renderer(renderer)
                                            }
                                            Err(e) => {
                                                eprintln!("Reload error: {:#}", e);
                                                continue;
                                            }
                                        }
                                    }
                                    // Notify connected browsers to reload
                                    let _ = watcher_state.reload_tx.send(());
                                }
                                WatchEvent::Error(e) => {
                                    eprintln!("Watch error: {}", e);
                                }
                            }
                        }
                    }))
                }
                Err(e) => {
                    eprintln!("Warning: Failed to start file watcher: {}", e);
                    None
                }
            }
        }
        _ => None,
    };

    let bind = args.bind.clone().unwrap_or_else(|| config.serve.bind.clone());
    let port = args.port.unwrap_or(config.serve.port);
    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;

    // Determine the URL to display
    let display_host = if bind == "0.0.0.0" {
        "localhost"
    } else {
        bind.as_str()
    };
    let url = format!("http://{}:{}", display_host, port);

    println!("\nServing at {}", url);
    println!("  POST {url}/api/render");
    if preview.is_some() {
        println!("  GET  {url}/ (preview)");
    }
    println!("Press Ctrl+C to stop\n");

    // Open browser if requested
    if args.open
        && let Err(e) = open::that(&url)
    {
        eprintln!("Failed to open browser: {}", e);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Load the config and build a renderer with its services.
fn build_renderer(
    config_path: &Path,
    records: Option<&Path>,
) -> Result<(Config, DocumentRenderer), anyhow::Error> {
    let config = Config::load_from_arg(Some(config_path))?;
    let services = Services::from_config(&config, records)?;
    let renderer = DocumentRenderer::new(&config, services)?;
    Ok((config, renderer))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("received Ctrl+C, shutting down");
    }
}
