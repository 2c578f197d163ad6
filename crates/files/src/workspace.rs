//! Per-request workspace allocation.
//!
//! A [`Workspace`] is an empty directory at `<static_root>/temp/<kind>/<token>` that belongs to
//! exactly one request. The token is random, so two requests running at the same time never
//! pick the same directory and never need to coordinate.
//!
//! The leaf directory is created with `create_dir`, not `create_dir_all`, so allocation fails
//! instead of silently sharing a directory if a token were ever reused.

use crate::constants::{ARCHIVE_PREFIX, MAX_ALLOCATION_ATTEMPTS, TEMP_FOLDER_NAME};
use crate::{WorkspaceError, WorkspaceResult};
use hip_ids::HexId;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// What a workspace holds, which also decides its parent directory and archive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceKind {
    /// Generated interaction-service test cases.
    Services,
    /// Clinical documents exported from the legacy store.
    Cdas,
}

impl WorkspaceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            WorkspaceKind::Services => "services",
            WorkspaceKind::Cdas => "cdas",
        }
    }
}

impl fmt::Display for WorkspaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkspaceKind {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "services" => Ok(WorkspaceKind::Services),
            "cdas" => Ok(WorkspaceKind::Cdas),
            other => Err(WorkspaceError::UnknownKind(other.to_string())),
        }
    }
}

/// Allocates workspaces under a fixed static root.
///
/// The service is cheap to clone and holds no mutable state.
#[derive(Debug, Clone)]
pub struct WorkspaceService {
    static_root: PathBuf,
}

impl WorkspaceService {
    /// Creates a service rooted at `static_root`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::InvalidRootDirectory`] if the root does not exist, is not a
    /// directory or cannot be canonicalised.
    pub fn new(static_root: &Path) -> WorkspaceResult<Self> {
        if !static_root.is_dir() {
            return Err(WorkspaceError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                static_root.display()
            )));
        }

        let static_root = static_root.canonicalize().map_err(|e| {
            WorkspaceError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                static_root.display(),
                e
            ))
        })?;

        Ok(Self { static_root })
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// Returns `<static_root>/temp`.
    pub fn temp_dir(&self) -> PathBuf {
        self.static_root.join(TEMP_FOLDER_NAME)
    }

    /// Allocates a fresh, empty workspace of the given kind.
    ///
    /// # Errors
    ///
    /// Returns `WorkspaceError` if:
    /// - the parent `temp/<kind>` directory cannot be created (I/O)
    /// - no unused token was found after a bounded number of attempts
    pub fn allocate(&self, kind: WorkspaceKind) -> WorkspaceResult<Workspace> {
        self.allocate_with(kind, HexId::new)
    }

    pub(crate) fn allocate_with(
        &self,
        kind: WorkspaceKind,
        mut token_source: impl FnMut() -> HexId,
    ) -> WorkspaceResult<Workspace> {
        let kind_dir = self.temp_dir().join(kind.as_str());
        fs::create_dir_all(&kind_dir)?;

        for _attempt in 0..MAX_ALLOCATION_ATTEMPTS {
            let token = token_source();
            let candidate = kind_dir.join(token.to_string());

            match fs::create_dir(&candidate) {
                Ok(()) => {
                    tracing::debug!(%token, %kind, "allocated workspace");
                    return Ok(Workspace {
                        token,
                        kind,
                        dir: candidate,
                        temp_dir: self.temp_dir(),
                        files: Vec::new(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(WorkspaceError::Io(e)),
            }
        }

        Err(WorkspaceError::Allocation(format!(
            "no unused token after {} attempts",
            MAX_ALLOCATION_ATTEMPTS
        )))
    }

    /// Where the archive of the `kind`/`token` workspace is (or will be) written.
    pub fn archive_path(&self, kind: WorkspaceKind, token: &HexId) -> PathBuf {
        self.temp_dir().join(archive_file_name(kind, token))
    }

    /// Re-opens a workspace left on disk, e.g. after a failed archive.
    ///
    /// The file list is rebuilt by walking the directory.
    pub fn open(&self, kind: WorkspaceKind, token: HexId) -> WorkspaceResult<Workspace> {
        let dir = self.temp_dir().join(kind.as_str()).join(token.to_string());
        if !dir.is_dir() {
            return Err(WorkspaceError::InvalidPath(format!(
                "workspace does not exist: {}",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        collect_files(&dir, &dir, &mut files)?;
        files.sort();

        Ok(Workspace {
            token,
            kind,
            dir,
            temp_dir: self.temp_dir(),
            files,
        })
    }
}

fn archive_file_name(kind: WorkspaceKind, token: &HexId) -> String {
    format!("{}-{}-{}.zip", ARCHIVE_PREFIX, kind, token)
}

/// A request-owned working directory.
///
/// Not `Clone`: the creating request owns it until it is handed to the archiver.
#[derive(Debug)]
pub struct Workspace {
    token: HexId,
    kind: WorkspaceKind,
    dir: PathBuf,
    temp_dir: PathBuf,
    files: Vec<PathBuf>,
}

impl Workspace {
    pub fn token(&self) -> &HexId {
        &self.token
    }

    pub fn kind(&self) -> WorkspaceKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Relative paths of every file written so far, in write order.
    pub fn file_paths(&self) -> &[PathBuf] {
        &self.files
    }

    /// `archive-<kind>-<token>.zip`
    pub fn archive_file_name(&self) -> String {
        archive_file_name(self.kind, &self.token)
    }

    /// Where the archiver will place this workspace's zip.
    pub fn archive_path(&self) -> PathBuf {
        self.temp_dir.join(self.archive_file_name())
    }

    /// Creates a subdirectory (and any missing parents) inside the workspace.
    pub fn create_dir(&self, relative_path: impl AsRef<Path>) -> WorkspaceResult<PathBuf> {
        let relative_path = validate_relative(relative_path.as_ref())?;
        let full_path = self.dir.join(relative_path);
        fs::create_dir_all(&full_path)?;
        Ok(full_path)
    }

    /// Writes `bytes` to `relative_path`, creating parent directories as needed.
    ///
    /// Writing the same path twice replaces the content but records the path once.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::InvalidPath`] for absolute paths or paths containing `..`,
    /// and [`WorkspaceError::Io`] if the write fails.
    pub fn write(
        &mut self,
        relative_path: impl AsRef<Path>,
        bytes: impl AsRef<[u8]>,
    ) -> WorkspaceResult<PathBuf> {
        let relative_path = validate_relative(relative_path.as_ref())?.to_path_buf();
        let full_path = self.dir.join(&relative_path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, bytes.as_ref())?;

        if !self.files.contains(&relative_path) {
            self.files.push(relative_path);
        }
        Ok(full_path)
    }
}

fn validate_relative(path: &Path) -> WorkspaceResult<&Path> {
    if path.as_os_str().is_empty() {
        return Err(WorkspaceError::InvalidPath("path is empty".into()));
    }
    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(WorkspaceError::InvalidPath(format!(
            "path must be relative and must not contain '..': {}",
            path.display()
        )));
    }
    Ok(path)
}

pub(crate) fn collect_files(
    base: &Path,
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            collect_files(base, &path, out)?;
        } else if file_type.is_file() {
            if let Ok(relative) = path.strip_prefix(base) {
                out.push(relative.to_path_buf());
            }
        }
    }
    Ok(())
}
