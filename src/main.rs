use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use hip_core::{
    AdminRegistry, ArchiveQueue, CoreConfig, DocumentExporter, PostgresDocumentStore,
    ServiceCaseGenerator, StoreSettings, WorkspaceService,
};

/// Main entry point for the HIP tools server
///
/// Resolves configuration once, starts the archive worker and serves the REST API.
///
/// # Environment Variables
/// - `HIP_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `HIP_STATIC_ROOT`: templates and download area (default: "static")
/// - `HIP_PUBLIC_BASE_URL`: base of returned download URLs (default: request `Host`, scheme from `X-Forwarded-Proto`)
/// - `SEND_ID` / `RECV_ID`: envelope device ids
/// - `DEFAULT_TEST_VALUE`: negative test-case sentinel (default: "000000")
/// - `MAX_CDA_NUM`: documents exported per encounter (default: 20)
/// - `CDA_DB_HOST`, `CDA_DB_PORT`, `CDA_DB_USER`, `CDA_DB_PASSWORD`, `CDA_DB_NAME`: document store
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, binding or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("hip=info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let env = |key: &str| std::env::var(key).ok();
    let rest_addr = env("HIP_REST_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());

    let cfg = Arc::new(CoreConfig::from_lookup(env)?);
    let store_settings = StoreSettings::from_lookup(env)?;
    let workspaces = WorkspaceService::new(cfg.static_root())?;

    let generator = ServiceCaseGenerator::new(&cfg, workspaces.clone());
    let missing = generator.registry().missing_templates();
    if !missing.is_empty() {
        tracing::warn!(
            "{} template files missing under {}",
            missing.len(),
            cfg.template_dir().display()
        );
        for path in &missing {
            tracing::debug!("missing template: {}", path.display());
        }
    }

    let state = AppState {
        generator,
        exporter: DocumentExporter::new(
            Arc::new(PostgresDocumentStore::new(store_settings)),
            workspaces.clone(),
        ),
        archives: ArchiveQueue::spawn(workspaces),
        admin: Arc::new(AdminRegistry::with_catalogues(
            &hip_core::TemplateRegistry::new(cfg.template_dir()),
        )),
        cfg,
    };

    tracing::info!("++ Starting HIP tools REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
