//! HIP Workspace Storage
//!
//! This crate owns the on-disk lifecycle of every generation and export request:
//! allocation of an isolated working directory, writing generated files into it, and finally
//! compressing it into a single downloadable archive and removing the source.
//!
//! ## Design Principles
//!
//! - Every request gets its own directory named after a random token
//! - Isolation comes from token uniqueness, never from locks
//! - Nothing outside the archiver deletes a workspace
//! - A failed archive leaves the workspace untouched for diagnosis
//!
//! ## Layout
//!
//! ```text
//! <static_root>/
//! └── temp/
//!     ├── services/
//!     │   └── <token>/                       # live workspace
//!     ├── cdas/
//!     │   └── <token>/<patient>/…xml
//!     └── archive-<kind>-<token>.zip         # produced by the archiver
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use hip_files::{archive_workspace, WorkspaceKind, WorkspaceService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = WorkspaceService::new(Path::new("static"))?;
//! let mut workspace = service.allocate(WorkspaceKind::Services)?;
//! workspace.write("example.xml", b"<root/>")?;
//! let archive = archive_workspace(&workspace)?;
//! println!("{}", archive.display());
//! # Ok(())
//! # }
//! ```

mod archive;
mod constants;
mod workspace;

pub use archive::archive_workspace;
pub use constants::{ARCHIVE_PREFIX, TEMP_FOLDER_NAME};
pub use hip_ids::HexId;
pub use workspace::{Workspace, WorkspaceKind, WorkspaceService};

/// Errors that can occur during workspace operations
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Relative path escapes the workspace or is otherwise unsafe
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Unknown workspace kind label
    #[error("Unknown workspace kind: {0}")]
    UnknownKind(String),

    /// No unused token could be found
    #[error("Failed to allocate workspace: {0}")]
    Allocation(String),

    /// Writing the zip archive failed
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
