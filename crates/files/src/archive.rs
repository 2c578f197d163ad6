//! Zip archiving of finished workspaces.
//!
//! [`archive_workspace`] is the only operation in the system that removes a workspace
//! directory. It runs once, after the producer has finished writing, and is never retried:
//!
//! - success: the zip exists at [`Workspace::archive_path`] and the directory is gone
//! - failure: any partial zip is removed and the directory is left exactly as it was

use crate::workspace::{collect_files, Workspace};
use crate::WorkspaceResult;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Compresses every file under the workspace directory into a single zip, then deletes the
/// directory tree.
///
/// Entry names are the file paths relative to the workspace directory, joined with `/`.
///
/// # Errors
///
/// Returns `WorkspaceError` if walking, reading, zipping or removing fails. On any error before
/// the zip is finalised the workspace directory is preserved.
pub fn archive_workspace(workspace: &Workspace) -> WorkspaceResult<PathBuf> {
    let archive_path = workspace.archive_path();

    if let Err(e) = write_archive(workspace.dir(), &archive_path) {
        if archive_path.is_file() {
            let _ = fs::remove_file(&archive_path);
        }
        tracing::error!(
            token = %workspace.token(),
            kind = %workspace.kind(),
            "archive failed, workspace preserved: {}",
            e
        );
        return Err(e);
    }

    fs::remove_dir_all(workspace.dir())?;

    tracing::info!(
        token = %workspace.token(),
        kind = %workspace.kind(),
        "archived workspace to {}",
        archive_path.display()
    );
    Ok(archive_path)
}

fn write_archive(source_dir: &Path, archive_path: &Path) -> WorkspaceResult<()> {
    let mut files = Vec::new();
    collect_files(source_dir, source_dir, &mut files)?;
    files.sort();

    let file = fs::File::create(archive_path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for relative in &files {
        let bytes = fs::read(source_dir.join(relative))?;
        zip.start_file(entry_name(relative), options)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;
    Ok(())
}

fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{WorkspaceError, WorkspaceKind, WorkspaceService};
    use std::io::Read;
    use tempfile::TempDir;

    fn read_entries(archive: &Path) -> Vec<(String, String)> {
        let mut zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
        let mut entries = Vec::new();
        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).unwrap();
            let mut content = String::new();
            entry.read_to_string(&mut content).unwrap();
            entries.push((entry.name().to_string(), content));
        }
        entries.sort();
        entries
    }

    #[test]
    fn test_archive_contains_exactly_written_files() {
        let temp = TempDir::new().unwrap();
        let service = WorkspaceService::new(temp.path()).unwrap();
        let mut workspace = service.allocate(WorkspaceKind::Cdas).unwrap();
        workspace.write("alice/one.xml", "<one/>").unwrap();
        workspace.write("bob/two.xml", "<two/>").unwrap();
        workspace.write("top.xml", "<top/>").unwrap();

        let archive = archive_workspace(&workspace).unwrap();

        assert_eq!(archive, workspace.archive_path());
        assert_eq!(
            read_entries(&archive),
            vec![
                ("alice/one.xml".to_string(), "<one/>".to_string()),
                ("bob/two.xml".to_string(), "<two/>".to_string()),
                ("top.xml".to_string(), "<top/>".to_string()),
            ]
        );
    }

    #[test]
    fn test_archive_removes_source_directory() {
        let temp = TempDir::new().unwrap();
        let service = WorkspaceService::new(temp.path()).unwrap();
        let mut workspace = service.allocate(WorkspaceKind::Services).unwrap();
        workspace.write("a.xml", "<a/>").unwrap();

        archive_workspace(&workspace).unwrap();

        assert!(!workspace.dir().exists());
        assert!(workspace.archive_path().is_file());
    }

    #[test]
    fn test_archive_includes_files_written_outside_tracking() {
        let temp = TempDir::new().unwrap();
        let service = WorkspaceService::new(temp.path()).unwrap();
        let workspace = service.allocate(WorkspaceKind::Services).unwrap();
        fs::write(workspace.dir().join("dropped.xml"), "<x/>").unwrap();

        let archive = archive_workspace(&workspace).unwrap();

        assert_eq!(read_entries(&archive).len(), 1);
    }

    #[test]
    fn test_archive_of_empty_workspace_is_valid_zip() {
        let temp = TempDir::new().unwrap();
        let service = WorkspaceService::new(temp.path()).unwrap();
        let workspace = service.allocate(WorkspaceKind::Services).unwrap();

        let archive = archive_workspace(&workspace).unwrap();

        assert!(read_entries(&archive).is_empty());
    }

    #[test]
    fn test_failed_archive_preserves_workspace() {
        let temp = TempDir::new().unwrap();
        let service = WorkspaceService::new(temp.path()).unwrap();
        let mut workspace = service.allocate(WorkspaceKind::Cdas).unwrap();
        workspace.write("p/doc.xml", "<doc/>").unwrap();
        // A directory squatting on the archive path makes File::create fail.
        fs::create_dir_all(workspace.archive_path()).unwrap();

        let result = archive_workspace(&workspace);

        assert!(matches!(result, Err(WorkspaceError::Io(_))));
        assert!(workspace.dir().join("p/doc.xml").is_file());
        assert!(workspace.archive_path().is_dir());
    }

    #[test]
    fn test_entry_name_uses_forward_slashes() {
        let path: PathBuf = ["a", "b", "c.xml"].iter().collect();

        assert_eq!(entry_name(&path), "a/b/c.xml");
    }
}
