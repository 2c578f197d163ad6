//! # API REST
//!
//! REST API implementation for the HIP tools.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, static downloads)
//!
//! Uses `api-shared` for wire types and `hip-core` for everything else. The `hip-run` binary
//! builds an [`AppState`] and serves [`router`].

#![warn(rust_2018_idioms)]

mod error;

pub use error::ApiError;

use api_shared::{
    AdminPageRes, ArchiveStatusRes, ArtifactRes, DocTypeCountRes, ErrorRes, ExportRes,
    GenerationReq, HealthRes, HealthService, HelloRes, ModelsRes, ParamReq, ServiceReq,
};
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap},
    response::Json,
    routing::{get, post},
    Router,
};
use hip_core::{
    download_url, AdminRegistry, ArchiveQueue, CoreConfig, DocumentExporter, ExportRequest,
    HexId, ServiceCaseGenerator, WorkspaceKind,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Application state shared across REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub generator: ServiceCaseGenerator,
    pub exporter: DocumentExporter,
    pub archives: ArchiveQueue,
    pub admin: Arc<AdminRegistry>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        hello,
        examples_services,
        read_cdas,
        archive_status,
        admin_models,
        admin_list,
        admin_detail,
    ),
    components(schemas(
        HealthRes,
        HelloRes,
        GenerationReq,
        ServiceReq,
        ParamReq,
        ArtifactRes,
        ExportRes,
        DocTypeCountRes,
        ArchiveStatusRes,
        ModelsRes,
        AdminPageRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router over `state`.
///
/// Everything under `<static_root>` is served at `/static`, which is where archive download URLs
/// point.
pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.cfg.static_root());

    Router::new()
        .route("/health", get(health))
        .route("/hello/:name", get(hello))
        .route("/examples/services", post(examples_services))
        .route("/cdas/:encounter_id", get(read_cdas))
        .route("/archives/:kind/:token", get(archive_status))
        .route("/admin/models", get(admin_models))
        .route("/admin/:model", get(admin_list))
        .route("/admin/:model/detail/:id", get(admin_detail))
        .nest_service("/static", static_files)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Base URL for download links: the configured public URL, else the request's `Host`.
///
/// The scheme follows `X-Forwarded-Proto` when a proxy terminating TLS sets it.
fn base_url(cfg: &CoreConfig, headers: &HeaderMap) -> String {
    if let Some(url) = cfg.public_base_url() {
        return url.to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let scheme = match headers
        .get(FORWARDED_PROTO)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
    {
        Some(proto) if proto.eq_ignore_ascii_case("https") => "https",
        _ => "http",
    };
    format!("{scheme}://{host}")
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/hello/{name}",
    params(("name" = String, Path, description = "Any text")),
    responses(
        (status = 200, description = "Greeting", body = HelloRes)
    )
)]
/// Connectivity probe used by the tooling front end.
#[axum::debug_handler]
async fn hello(AxumPath(name): AxumPath<String>) -> Json<HelloRes> {
    Json(HelloRes {
        message: format!("你好, {name}"),
    })
}

#[utoipa::path(
    post,
    path = "/examples/services",
    request_body = GenerationReq,
    responses(
        (status = 200, description = "Test cases generated, archive queued", body = ArtifactRes),
        (status = 400, description = "Unknown service, bad path or empty request", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Generate positive and negative test cases for interaction services
///
/// Renders every requested service into a fresh workspace, then queues the workspace for
/// archiving. The returned URL becomes valid once the archive job has finished.
///
/// # Errors
/// Returns `400 Bad Request` if:
/// - the request is empty, repeats a service, or has a service without parameters,
/// - a service code is not catalogued,
/// - a parameter path is malformed or does not resolve in the template.
#[axum::debug_handler]
async fn examples_services(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerationReq>,
) -> Result<Json<ArtifactRes>, ApiError> {
    let workspace = state.generator.generate_blocking(req.into()).await?;

    let url = download_url(&base_url(&state.cfg, &headers), &workspace.archive_file_name());
    let token = workspace.token().to_string();
    let kind = workspace.kind().to_string();
    state.archives.enqueue(workspace)?;

    Ok(Json(ArtifactRes { url, token, kind }))
}

#[utoipa::path(
    get,
    path = "/cdas/{encounter_id}",
    params(("encounter_id" = String, Path, description = "Encounter (visit) serial number")),
    responses(
        (status = 200, description = "Documents exported, archive queued", body = ExportRes),
        (status = 404, description = "No documents for the encounter", body = ErrorRes),
        (status = 502, description = "Document store unavailable", body = ErrorRes)
    )
)]
/// Export the clinical documents of one encounter
///
/// Writes up to `MAX_CDA_NUM` documents, grouped by patient, and queues the result for archiving.
#[axum::debug_handler]
async fn read_cdas(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(encounter_id): AxumPath<String>,
) -> Result<Json<ExportRes>, ApiError> {
    let outcome = state
        .exporter
        .export(ExportRequest {
            encounter_id,
            max_docs: state.cfg.max_docs(),
        })
        .await?;

    let workspace = outcome.workspace;
    let res = ExportRes {
        url: download_url(&base_url(&state.cfg, &headers), &workspace.archive_file_name()),
        token: workspace.token().to_string(),
        kind: workspace.kind().to_string(),
        documents: outcome.documents,
        patients: outcome.patients,
        doc_types: outcome.doc_type_counts.iter().map(Into::into).collect(),
    };
    state.archives.enqueue(workspace)?;

    Ok(Json(res))
}

#[utoipa::path(
    get,
    path = "/archives/{kind}/{token}",
    params(
        ("kind" = String, Path, description = "`services` or `cdas`"),
        ("token" = String, Path, description = "Workspace token")
    ),
    responses(
        (status = 200, description = "Archive job status", body = ArchiveStatusRes),
        (status = 400, description = "Bad kind or token", body = ErrorRes),
        (status = 404, description = "Unknown archive", body = ErrorRes)
    )
)]
/// Poll the archive job of a previous request
#[axum::debug_handler]
async fn archive_status(
    State(state): State<AppState>,
    AxumPath((kind, token)): AxumPath<(String, String)>,
) -> Result<Json<ArchiveStatusRes>, ApiError> {
    let kind = kind
        .parse::<WorkspaceKind>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let token = HexId::parse(&token).map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.archives.status(kind, &token) {
        Some(status) => Ok(Json(ArchiveStatusRes::new(
            kind.as_str(),
            token.to_string(),
            &status,
        ))),
        None => Err(ApiError::not_found("Archive Not Found")),
    }
}

#[utoipa::path(
    get,
    path = "/admin/models",
    responses(
        (status = 200, description = "Registered admin models", body = ModelsRes)
    )
)]
#[axum::debug_handler]
async fn admin_models(State(state): State<AppState>) -> Json<ModelsRes> {
    Json(ModelsRes {
        models: state.admin.names().into_iter().map(String::from).collect(),
    })
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
struct PageQuery {
    /// Rows to skip (default 0)
    skip: Option<usize>,
    /// Page size (default 10)
    limit: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/admin/{model}",
    params(("model" = String, Path, description = "Model name"), PageQuery),
    responses(
        (status = 200, description = "One page of the model", body = AdminPageRes),
        (status = 404, description = "Model Not Found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn admin_list(
    State(state): State<AppState>,
    AxumPath(model): AxumPath<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<AdminPageRes>, ApiError> {
    let page = state.admin.list(&model, page.skip, page.limit)?;
    Ok(Json(page.into()))
}

#[utoipa::path(
    get,
    path = "/admin/{model}/detail/{id}",
    params(
        ("model" = String, Path, description = "Model name"),
        ("id" = String, Path, description = "Primary key")
    ),
    responses(
        (status = 200, description = "The item as a JSON object"),
        (status = 404, description = "Model or Item Not Found", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn admin_detail(
    State(state): State<AppState>,
    AxumPath((model, id)): AxumPath<(String, String)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.admin.get(&model, &id)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::{NaiveDate, NaiveDateTime};
    use hip_core::{
        ArchiveStatus, DocumentRecord, DocumentStore, InMemoryDocumentStore, PipelineError,
        PipelineResult, StoredDocument, TemplateRegistry, WorkspaceService,
    };
    use http_body_util::BodyExt;
    use std::fs;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PRPA_IN201305UV02 xmlns="urn:hl7-org:v3" ITSVersion="XML_1.0">
  <id root="2.16.156.10011.0" extension=""/>
  <creationTime value=""/>
  <sender typeCode="SND"><device><id><item extension=""/></id></device></sender>
  <receiver typeCode="RCV"><device><id><item extension=""/></id></device></receiver>
  <controlActProcess><queryByParameter><patient.id><value extension=""/></patient.id></queryByParameter></controlActProcess>
</PRPA_IN201305UV02>
"#;

    const PATIENT_ID_PATH: &str =
        "xmlns:controlActProcess/xmlns:queryByParameter/xmlns:patient.id/xmlns:value/@extension";

    struct DownStore;

    impl DocumentStore for DownStore {
        fn fetch_ranked(&self, _: &str, _: u32) -> PipelineResult<Vec<DocumentRecord>> {
            Err(PipelineError::StoreConnection("timeout".into()))
        }
    }

    fn state_with(root: &TempDir, store: Arc<dyn DocumentStore>) -> AppState {
        let templates = TemplateRegistry::new(root.path().join("services"));
        fs::create_dir_all(templates.template_dir()).unwrap();
        let template = templates.resolve("PatientInfoQuery").unwrap();
        fs::write(&template.positive, TEMPLATE).unwrap();
        fs::write(&template.negative, TEMPLATE).unwrap();

        let cfg = Arc::new(
            CoreConfig::new(
                root.path().to_path_buf(),
                "esbid_send".into(),
                "esbid_receive".into(),
                "000000".into(),
                20,
                Some("http://tools.example".into()),
            )
            .unwrap(),
        );
        let workspaces = WorkspaceService::new(root.path()).unwrap();
        AppState {
            generator: ServiceCaseGenerator::new(&cfg, workspaces.clone()),
            exporter: DocumentExporter::new(store, workspaces.clone()),
            archives: ArchiveQueue::spawn(workspaces),
            admin: Arc::new(AdminRegistry::with_catalogues(&templates)),
            cfg,
        }
    }

    fn created(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 4)
            .and_then(|d| d.and_hms_opt(9, minute, 0))
            .unwrap()
    }

    fn documents() -> Arc<dyn DocumentStore> {
        Arc::new(InMemoryDocumentStore::new(vec![
            StoredDocument {
                encounter_id: "V1".into(),
                patient_name: "张三".into(),
                doc_type_code: "C0034".into(),
                content: "<ClinicalDocument/>".into(),
                created_at: created(1),
            },
            StoredDocument {
                encounter_id: "V1".into(),
                patient_name: "张三".into(),
                doc_type_code: "C0049".into(),
                content: "<ClinicalDocument/>".into(),
                created_at: created(2),
            },
        ]))
    }

    async fn call(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_for_archive(state: &AppState, kind: WorkspaceKind, token: &str) -> ArchiveStatus {
        let token = HexId::parse(token).unwrap();
        for _ in 0..200 {
            match state.archives.status(kind, &token) {
                Some(ArchiveStatus::Pending) | None => {
                    tokio::time::sleep(Duration::from_millis(10)).await
                }
                Some(done) => return done,
            }
        }
        panic!("archive job did not finish");
    }

    #[test]
    fn base_url_follows_host_and_forwarded_proto() {
        let root = TempDir::new().unwrap();
        let cfg = CoreConfig::new(
            root.path().to_path_buf(),
            "esbid_send".into(),
            "esbid_receive".into(),
            "000000".into(),
            20,
            None,
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "tools.local:3000".parse().unwrap());

        assert_eq!(base_url(&cfg, &headers), "http://tools.local:3000");

        headers.insert(FORWARDED_PROTO, "https, http".parse().unwrap());
        assert_eq!(base_url(&cfg, &headers), "https://tools.local:3000");
    }

    #[tokio::test]
    async fn health_and_hello() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());

        let (status, body) = call(state.clone(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);

        let (status, body) = call(state, get("/hello/hip")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "你好, hip");
    }

    #[tokio::test]
    async fn generate_services_returns_url_and_archives() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());
        let body = serde_json::json!({
            "data": [{
                "service_code": "PatientInfoQuery",
                "service_name": "个人信息查询服务",
                "rank": "5",
                "params": [{"comment": "患者ID", "eg": "12345", "path": PATIENT_ID_PATH, "value": "12345"}]
            }]
        });

        let (status, res) = call(state.clone(), post_json("/examples/services", body)).await;

        assert_eq!(status, StatusCode::OK);
        let token = res["token"].as_str().unwrap().to_string();
        assert_eq!(res["kind"], "services");
        assert_eq!(
            res["url"],
            format!("http://tools.example/static/temp/archive-services-{token}.zip")
        );
        let done = wait_for_archive(&state, WorkspaceKind::Services, &token).await;
        let ArchiveStatus::Completed { archive_path } = done else {
            panic!("archive failed: {done:?}");
        };
        assert!(archive_path.is_file());
        assert!(!root.path().join("temp/services").join(&token).exists());

        let (status, polled) = call(state, get(&format!("/archives/services/{token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(polled["status"], "completed");
    }

    #[tokio::test]
    async fn generate_rejects_unknown_service_and_bad_paths() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());

        let unknown = serde_json::json!({
            "data": [{"service_code": "Nope", "params": [{"path": PATIENT_ID_PATH, "value": "1"}]}]
        });
        let (status, body) = call(state.clone(), post_json("/examples/services", unknown)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Nope"));

        let bad_path = serde_json::json!({
            "data": [{"service_code": "PatientInfoQuery", "params": [{"path": "xmlns:nope/@x", "value": "1"}]}]
        });
        let (status, _) = call(state, post_json("/examples/services", bad_path)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!root.path().join("temp/services").exists());
    }

    #[tokio::test]
    async fn export_writes_documents_and_reports_counts() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());

        let (status, res) = call(state.clone(), get("/cdas/V1")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["kind"], "cdas");
        assert_eq!(res["documents"], 2);
        assert_eq!(res["patients"], serde_json::json!(["张三"]));
        assert_eq!(res["doc_types"][0]["code"], "C0034");
        let token = res["token"].as_str().unwrap().to_string();
        let done = wait_for_archive(&state, WorkspaceKind::Cdas, &token).await;
        assert!(matches!(done, ArchiveStatus::Completed { .. }));
    }

    #[tokio::test]
    async fn export_status_codes() {
        let root = TempDir::new().unwrap();

        let (status, body) = call(state_with(&root, documents()), get("/cdas/V404")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("V404"));

        let (status, _) = call(state_with(&root, Arc::new(DownStore)), get("/cdas/V1")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn archive_status_validates_input() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());

        let (status, _) = call(state.clone(), get("/archives/zips/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = format!("/archives/cdas/{}", HexId::new());
        let (status, _) = call(state, get(&unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_endpoints() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());

        let (status, body) = call(state.clone(), get("/admin/models")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["models"], serde_json::json!(["doctype", "service"]));

        let (status, body) = call(state.clone(), get("/admin/doctype?skip=10&limit=5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 5);
        assert_eq!(body["items"][0]["code"], "C0011");

        let (status, body) = call(state.clone(), get("/admin/service/detail/PatientInfoQuery")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["available"], true);

        let (status, _) = call(state.clone(), get("/admin/account")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(state, get("/admin/doctype/detail/C9999")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn static_files_are_served() {
        let root = TempDir::new().unwrap();
        let state = state_with(&root, documents());
        let file: PathBuf = root.path().join("temp").join("hello.txt");
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "hi").unwrap();

        let response = router(state).oneshot(get("/static/temp/hello.txt")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
