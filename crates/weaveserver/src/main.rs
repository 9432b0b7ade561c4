use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use actix_ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use weavecore::{RunContext, StateStore, WorkflowDefinition};
use weaveruntime::{RuntimeConfig, StepRegistry, WeaveRuntime};
use weavesteps::FileNotebook;

/// Application state shared across handlers
struct AppState {
    runtime: Arc<WeaveRuntime>,
    notebooks_dir: PathBuf,
}

impl AppState {
    fn open_notebook(&self, notebook_id: &str) -> Result<FileNotebook, weavecore::StoreError> {
        FileNotebook::open(self.notebooks_dir.join(notebook_id))
    }
}

/// Request body for workflow execution
#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    notebook_id: Option<String>,
    workflow: Value,
}

/// Request body for saving a workflow definition
#[derive(Debug, Deserialize)]
struct SaveRequest {
    notebook_id: String,
    workflow: Value,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "weaveserver"
    }))
}

/// Execute a workflow synchronously, returning the full run report.
/// Live consumers watch the WebSocket event stream instead.
#[post("/api/workflow/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    req: web::Json<ExecuteRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();

    let definition = match WorkflowDefinition::parse(req.workflow) {
        Ok(definition) => definition,
        Err(e) => {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    let context = match &req.notebook_id {
        Some(id) => match data.open_notebook(id) {
            Ok(store) => RunContext::with_store(Arc::new(store), id.clone()),
            Err(e) => {
                error!("failed to open notebook {id}: {e}");
                return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                    error: e.to_string(),
                }));
            }
        },
        None => RunContext::new(),
    };

    info!("executing workflow (notebook: {:?})", req.notebook_id);
    let report = data.runtime.execute_definition(definition, &context).await;

    Ok(HttpResponse::Ok().json(report))
}

/// Report of a previously executed run
#[get("/api/workflow/runs/{run_id}")]
async fn get_run(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let run_id = path.into_inner();
    match data.runtime.run_report(&run_id).await {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: format!("run {run_id} not found"),
        })),
    }
}

/// Save a workflow definition into a notebook
#[post("/api/workflow/save")]
async fn save_workflow(
    data: web::Data<AppState>,
    req: web::Json<SaveRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();
    let store = match data.open_notebook(&req.notebook_id) {
        Ok(store) => store,
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    match store.save("workflow", &req.workflow) {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({"saved": true}))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Load a saved workflow definition
#[get("/api/workflow/load/{notebook_id}")]
async fn load_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let notebook_id = path.into_inner();
    let store = match data.open_notebook(&notebook_id) {
        Ok(store) => store,
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    match store.load("workflow") {
        Ok(workflow) => Ok(HttpResponse::Ok().json(json!({"workflow": workflow}))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Merge pinned node outputs into the notebook's pin data
#[post("/api/workflow/{notebook_id}/pin-data")]
async fn set_pin_data(
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Map<String, Value>>,
) -> ActixResult<impl Responder> {
    let notebook_id = path.into_inner();
    let store = match data.open_notebook(&notebook_id) {
        Ok(store) => store,
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    let result = store.load("pin_data").and_then(|existing| {
        let mut merged = match existing {
            Some(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        };
        for (node_id, items) in body.into_inner() {
            merged.insert(node_id, items);
        }
        store.save("pin_data", &Value::Object(merged.clone()))?;
        Ok(merged)
    });

    match result {
        Ok(merged) => {
            let pinned: Vec<&String> = merged.keys().collect();
            Ok(HttpResponse::Ok().json(json!({"pinned_nodes": pinned})))
        }
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Current pin data for a notebook
#[get("/api/workflow/{notebook_id}/pin-data")]
async fn get_pin_data(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let notebook_id = path.into_inner();
    let store = match data.open_notebook(&notebook_id) {
        Ok(store) => store,
        Err(e) => {
            return Ok(HttpResponse::InternalServerError().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    match store.load("pin_data") {
        Ok(pin_data) => Ok(HttpResponse::Ok().json(json!({
            "pin_data": pin_data.unwrap_or_else(|| json!({}))
        }))),
        Err(e) => Ok(HttpResponse::InternalServerError().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// WebSocket endpoint for real-time engine events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// List available step types
#[get("/api/steps")]
async fn list_step_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let steps = data.runtime.registry().list_step_types();
    Ok(HttpResponse::Ok().json(steps))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    info!("🚀 Starting weave server");

    let mut registry = StepRegistry::new();
    weavesteps::register_all(&mut registry);

    let runtime = WeaveRuntime::with_registry(Arc::new(registry), RuntimeConfig::default());

    info!("✅ Runtime initialized with pipeline steps");

    let notebooks_dir = std::env::var("WEAVE_NOTEBOOKS_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("notebooks"));

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(runtime),
        notebooks_dir,
    });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(execute_workflow)
            .service(get_run)
            .service(save_workflow)
            .service(load_workflow)
            .service(set_pin_data)
            .service(get_pin_data)
            .service(websocket_events)
            .service(list_step_types)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
