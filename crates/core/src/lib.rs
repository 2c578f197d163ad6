//! # HIP Core
//!
//! Core logic of the interoperability tooling backend:
//! - Service test-case generation from HL7 v3 message templates (envelope stamping and
//!   path-addressed attribute mutation)
//! - Clinical document export from the legacy document store
//! - Deferred archiving of per-request workspaces
//! - Read-only admin access to registered entity types
//!
//! **No API concerns**: HTTP servers and CLI parsing belong in `api-rest`, `hip-cli` and the
//! `hip-run` binary. Configuration is resolved once by the binaries and passed in as
//! [`CoreConfig`]; nothing in this crate reads environment variables at request time.

pub mod admin;
pub mod archive;
pub mod catalogue;
pub mod cda;
pub mod config;
pub mod constants;
pub mod error;
pub mod export;
pub mod generation;
pub mod message;
pub mod store;

pub use admin::{AdminError, AdminPage, AdminRegistry, AdminResult, EntityAdmin, StaticEntityAdmin};
pub use archive::{download_url, ArchiveQueue, ArchiveStatus, ArchiveTicket};
pub use catalogue::{ServiceTemplate, TemplateRegistry};
pub use config::{CoreConfig, StoreSettings};
pub use error::{PipelineError, PipelineResult};
pub use export::{DocTypeCount, DocumentExporter, ExportOutcome, ExportRequest};
pub use generation::{GenerationEntry, GenerationRequest, ServiceCaseGenerator};
pub use message::{MessageTemplate, MutationInstruction, Variant};
pub use store::{
    DocumentRecord, DocumentStore, InMemoryDocumentStore, PostgresDocumentStore, StoredDocument,
};

pub use hip_files::{HexId, Workspace, WorkspaceError, WorkspaceKind, WorkspaceService};
