use api_shared::GenerationReq;
use clap::{Parser, Subcommand};
use hip_core::{
    CoreConfig, DocumentExporter, ExportRequest, HexId, PostgresDocumentStore,
    ServiceCaseGenerator, StoreSettings, TemplateRegistry, WorkspaceKind, WorkspaceService,
};
use hip_files::archive_workspace;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hip")]
#[command(about = "HIP interoperability tooling CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List catalogued interaction services and whether their templates exist
    Services,
    /// Generate test cases from a JSON request file and archive them
    Generate {
        /// Request body in the `POST /examples/services` format
        request: PathBuf,
        /// Leave the workspace in place instead of archiving it
        #[arg(long)]
        keep: bool,
    },
    /// Export the clinical documents of an encounter and archive them
    Export {
        /// Encounter (visit) serial number
        encounter_id: String,
        /// Override MAX_CDA_NUM
        #[arg(long)]
        max_docs: Option<u32>,
    },
    /// Archive a workspace that was left on disk
    Archive {
        /// `services` or `cdas`
        kind: String,
        /// Workspace token
        token: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    run(Cli::parse(), &|key| std::env::var(key).ok())
}

fn run(
    cli: Cli,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = CoreConfig::from_lookup(env)?;

    match cli.command {
        Some(Commands::Services) => {
            let registry = TemplateRegistry::new(cfg.template_dir());
            for template in registry.services() {
                let available = template.positive.is_file() && template.negative.is_file();
                println!(
                    "{:<34} {} {}",
                    template.service_code,
                    if available { "ok     " } else { "missing" },
                    template.service_name
                );
            }
        }
        Some(Commands::Generate { request, keep }) => {
            let body = std::fs::read_to_string(&request)?;
            let req: GenerationReq = serde_json::from_str(&body)?;
            let workspaces = WorkspaceService::new(cfg.static_root())?;
            let generator = ServiceCaseGenerator::new(&cfg, workspaces);

            let workspace = generator.generate(&req.into())?;
            if keep {
                println!(
                    "Generated {} files in {}",
                    workspace.file_paths().len(),
                    workspace.dir().display()
                );
            } else {
                let archive = archive_workspace(&workspace)?;
                println!(
                    "Generated {} files: {}",
                    workspace.file_paths().len(),
                    archive.display()
                );
            }
        }
        Some(Commands::Export {
            encounter_id,
            max_docs,
        }) => {
            let workspaces = WorkspaceService::new(cfg.static_root())?;
            let store = PostgresDocumentStore::new(StoreSettings::from_lookup(env)?);
            let exporter = DocumentExporter::new(Arc::new(store), workspaces);
            let request = ExportRequest {
                encounter_id,
                max_docs: max_docs.unwrap_or(cfg.max_docs()),
            };

            let runtime = tokio::runtime::Runtime::new()?;
            let outcome = runtime.block_on(exporter.export(request))?;
            let archive = archive_workspace(&outcome.workspace)?;
            println!(
                "Exported {} documents for {} patient(s): {}",
                outcome.documents,
                outcome.patients.len(),
                archive.display()
            );
            for count in &outcome.doc_type_counts {
                println!("  {} {:<24} {}", count.code, count.label, count.count);
            }
        }
        Some(Commands::Archive { kind, token }) => {
            let kind: WorkspaceKind = kind.parse()?;
            let token = HexId::parse(&token)?;
            let workspaces = WorkspaceService::new(cfg.static_root())?;
            let workspace = workspaces.open(kind, token)?;
            let path = archive_workspace(&workspace)?;
            println!("Archived to {}", path.display());
        }
        None => {
            println!("Use 'hip --help' for commands");
        }
    }

    Ok(())
}
