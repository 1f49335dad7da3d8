//! HTTP surface of the Zorya pipeline.
//!
//! Each stage has a trigger route that runs it once and reports the outcome:
//!
//! | Route                | Stage    |
//! |----------------------|----------|
//! | `/fetch-objects/`    | fetch    |
//! | `/discover-bags/`    | discover |
//! | `/assign-rights/`    | rights   |
//! | `/make-package/`     | package  |
//! | `/archive-package/`  | archive  |
//! | `/deliver-package/`  | deliver  |
//!
//! Bag records are exposed under `/bags/` and `/bags/<identifier>/`, and
//! `/status/` answers a health ping.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info};
use zorya_core::{CoreError, Pipeline};
use zorya_schema::{BagId, BagStatus, Origin, OriginalName, Stage};
use zorya_store::{BagRecord, StoreError};

/// The trigger route of `stage`.
pub fn stage_route(stage: Stage) -> &'static str {
    match stage {
        Stage::Fetch => "/fetch-objects/",
        Stage::Discover => "/discover-bags/",
        Stage::Rights => "/assign-rights/",
        Stage::Package => "/make-package/",
        Stage::Archive => "/archive-package/",
        Stage::Deliver => "/deliver-package/",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    Stage(Stage),
    Bags,
    Bag(&'a str),
    Status,
}

/// Parse a request path (without query string). The trailing slash is optional.
pub fn parse_route(path: &str) -> Option<Route<'_>> {
    let trimmed = path.trim_end_matches('/');
    if let Some(stage) = Stage::ALL
        .into_iter()
        .find(|s| stage_route(*s).trim_end_matches('/') == trimmed)
    {
        return Some(Route::Stage(stage));
    }
    match trimmed {
        "/bags" => Some(Route::Bags),
        "/status" => Some(Route::Status),
        _ => trimmed
            .strip_prefix("/bags/")
            .filter(|id| !id.is_empty() && !id.contains('/'))
            .map(Route::Bag),
    }
}

/// Body of `POST /bags/`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NewBag {
    original_name: String,
    identifier: Option<String>,
    local_path: Option<PathBuf>,
    origin: Option<Origin>,
    status: Option<BagStatus>,
}

/// Body of `PUT /bags/<id>/`; absent fields are left unchanged.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BagPatch {
    local_path: Option<PathBuf>,
    origin: Option<Origin>,
    status: Option<BagStatus>,
    rights_payload: Option<Value>,
}

struct ApiError {
    code: u16,
    detail: String,
}

impl ApiError {
    fn new(code: u16, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let code = match e {
            StoreError::RecordNotFound(_) => 404,
            StoreError::DuplicateRecord(_) => 409,
            StoreError::InvalidIdentifier(_) => 400,
            _ => 500,
        };
        Self::new(code, CoreError::from(e).to_string())
    }
}

fn respond_json(req: Request, code: u16, body: &Value) {
    let mut response = Response::from_string(body.to_string()).with_status_code(StatusCode(code));
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    let _ = req.respond(response);
}

fn respond_err(req: Request, code: u16, detail: &str) {
    respond_json(req, code, &json!({ "detail": detail }));
}

fn read_json<T: for<'de> Deserialize<'de>>(req: &mut Request) -> Result<T, ApiError> {
    let mut body = Vec::new();
    req.as_reader()
        .read_to_end(&mut body)
        .map_err(|e| ApiError::new(400, format!("failed to read body: {e}")))?;
    serde_json::from_slice(&body).map_err(|e| ApiError::new(400, format!("invalid body: {e}")))
}

fn to_json(record: &BagRecord) -> Result<Value, ApiError> {
    serde_json::to_value(record).map_err(|e| ApiError::new(500, e.to_string()))
}

/// In-progress markers belong to the engine.
fn check_settable(status: BagStatus) -> Result<(), ApiError> {
    if status.is_in_progress() {
        return Err(ApiError::new(
            400,
            format!("status '{status}' is reserved for running stages"),
        ));
    }
    Ok(())
}

/// Operators may only step a bag back to the stable status before its
/// current one, so that the stage that produced it runs again. Advancing is
/// left to the stages.
fn check_manual_move(from: BagStatus, to: BagStatus) -> Result<(), ApiError> {
    check_settable(to)?;
    if from == to {
        return Ok(());
    }
    let previous = Stage::ALL
        .into_iter()
        .find(|stage| stage.end() == from)
        .and_then(Stage::start);
    if previous == Some(to) {
        return Ok(());
    }
    Err(ApiError::new(
        400,
        format!("cannot move bag from '{from}' to '{to}'; only a step back to the previous status is allowed"),
    ))
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

fn trigger(pipeline: &Pipeline, req: Request, stage: Stage) {
    match pipeline.run_stage(stage) {
        Ok(outcome) => {
            let (detail, objects) = outcome.report(stage);
            info!("{} -> {detail} {objects:?}", stage_route(stage));
            respond_json(
                req,
                200,
                &json!({ "detail": detail, "objects": objects, "count": objects.len() }),
            );
        }
        Err(e) => {
            error!("{}: {e}", stage_route(stage));
            respond_err(req, 500, &e.to_string());
        }
    }
}

fn list_bags(pipeline: &Pipeline, query: &str) -> Result<Value, ApiError> {
    let records = match query_param(query, "status") {
        Some(raw) => {
            let status = raw
                .parse::<BagStatus>()
                .map_err(|e| ApiError::new(400, e.to_string()))?;
            pipeline.records().find_by_status(status)?
        }
        None => pipeline.records().list()?,
    };
    serde_json::to_value(&records).map_err(|e| ApiError::new(500, e.to_string()))
}

fn create_bag(pipeline: &Pipeline, req: &mut Request) -> Result<Value, ApiError> {
    let new: NewBag = read_json(req)?;
    if new.original_name.trim().is_empty() {
        return Err(ApiError::new(400, "original_name must not be empty"));
    }
    let status = new.status.unwrap_or(BagStatus::Fetched);
    check_settable(status)?;

    let id = new.identifier.map_or_else(BagId::generate, BagId::new);
    let mut record = BagRecord::new(id, OriginalName::new(new.original_name), status);
    record.local_path = new.local_path;
    record.origin = new.origin;
    let stored = pipeline.records().insert(&record)?;
    info!("created bag {} ('{}')", stored.identifier, stored.original_name);
    to_json(&stored)
}

fn update_bag(pipeline: &Pipeline, req: &mut Request, id: &str) -> Result<Value, ApiError> {
    let patch: BagPatch = read_json(req)?;
    let mut record = pipeline.records().get(id)?;
    if record.status.is_in_progress() {
        return Err(ApiError::new(
            409,
            format!("bag '{id}' is {}; try again once the stage finishes", record.status),
        ));
    }
    if let Some(status) = patch.status {
        check_manual_move(record.status, status)?;
        if status < BagStatus::RightsAssigned {
            record.rights_payload = None;
        }
        record.status = status;
    }
    if let Some(path) = patch.local_path {
        record.local_path = Some(path);
    }
    if let Some(origin) = patch.origin {
        record.origin = Some(origin);
    }
    if let Some(payload) = patch.rights_payload {
        if record.status < BagStatus::RightsAssigned {
            return Err(ApiError::new(
                400,
                format!("bag '{id}' has no rights assigned yet; rights_payload cannot be set"),
            ));
        }
        record.rights_payload = Some(payload);
    }
    record.touch();
    pipeline.records().put(&record)?;
    info!("updated bag {id}");
    to_json(&record)
}

fn reply(req: Request, ok_code: u16, result: Result<Value, ApiError>) {
    match result {
        Ok(body) => respond_json(req, ok_code, &body),
        Err(e) => respond_err(req, e.code, &e.detail),
    }
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(pipeline: &Pipeline, mut req: Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");
    let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));

    let Some(route) = parse_route(path) else {
        respond_err(req, 404, "not found");
        return;
    };
    match (route, &method) {
        (Route::Stage(stage), Method::Post | Method::Get) => trigger(pipeline, req, stage),
        (Route::Status, Method::Get) => respond_json(req, 200, &json!({ "pong": true })),
        (Route::Bags, Method::Get) => reply(req, 200, list_bags(pipeline, query)),
        (Route::Bags, Method::Post) => {
            let result = create_bag(pipeline, &mut req);
            reply(req, 201, result);
        }
        (Route::Bag(id), Method::Get) => {
            let result = pipeline
                .records()
                .get(id)
                .map_err(ApiError::from)
                .and_then(|r| to_json(&r));
            reply(req, 200, result);
        }
        (Route::Bag(id), Method::Put | Method::Patch) => {
            let result = update_bag(pipeline, &mut req, id);
            reply(req, 200, result);
        }
        _ => respond_err(req, 405, "method not allowed"),
    }
}

/// Accept requests until `should_stop` returns true, handling each on its
/// own thread so that different stages can run side by side. Returns once
/// every request in flight has been answered.
pub fn serve(server: &Server, pipeline: &Arc<Pipeline>, should_stop: impl Fn() -> bool) {
    let mut in_flight: Vec<JoinHandle<()>> = Vec::new();
    while !should_stop() {
        match server.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(request)) => {
                let pipeline = Arc::clone(pipeline);
                in_flight.push(std::thread::spawn(move || {
                    handle_request(&pipeline, request);
                }));
            }
            Ok(None) => {}
            Err(e) => {
                error!("accept failed: {e}");
                break;
            }
        }
        in_flight.retain(|h| !h.is_finished());
    }
    for handle in in_flight {
        let _ = handle.join();
    }
}

/// Bind `addr` and serve until `should_stop` returns true.
pub fn run_server(
    pipeline: &Arc<Pipeline>,
    addr: &str,
    should_stop: impl Fn() -> bool,
) -> Result<(), String> {
    let server = Server::http(addr).map_err(|e| format!("failed to bind {addr}: {e}"))?;
    info!("listening on {addr}");
    serve(&server, pipeline, should_stop);
    Ok(())
}

/// A test helper that serves a pipeline on a random port in a background thread.
///
/// Drop the `TestServer` to stop it.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    stop: Arc<AtomicBool>,
    server: Arc<Server>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Binds to `127.0.0.1:0`.
    pub fn start(pipeline: Pipeline) -> Result<Self, String> {
        let server = Arc::new(Server::http("127.0.0.1:0").map_err(|e| e.to_string())?);
        let port = server
            .server_addr()
            .to_ip()
            .map(|a| a.port())
            .ok_or_else(|| "test server is not bound to an IP address".to_owned())?;

        let stop = Arc::new(AtomicBool::new(false));
        let pipeline = Arc::new(pipeline);
        let srv = Arc::clone(&server);
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            serve(&srv, &pipeline, || flag.load(Ordering::SeqCst));
        });

        Ok(Self {
            url: format!("http://127.0.0.1:{port}"),
            port,
            stop,
            server,
            handle: Some(handle),
        })
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
