//! Clinical document export.
//!
//! Pulls the ranked documents of one encounter from the [`DocumentStore`], writes each one into a
//! `cdas` workspace under a per-patient directory and reports what was written. Archiving is left
//! to the caller so the download URL can be returned before the archive exists.

use crate::cda::{label_for, short_code, DOC_TYPES};
use crate::constants::EXPORT_FILE_MARKER;
use crate::store::{DocumentRecord, DocumentStore};
use crate::{PipelineError, PipelineResult};
use hip_files::{Workspace, WorkspaceKind, WorkspaceService};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

const UNNAMED_PATIENT_DIR: &str = "unnamed";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportRequest {
    pub encounter_id: String,
    pub max_docs: u32,
}

/// Documents written for one document type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocTypeCount {
    pub code: String,
    pub label: String,
    pub count: usize,
}

#[derive(Debug)]
pub struct ExportOutcome {
    pub workspace: Workspace,
    pub documents: usize,
    /// Patient directory names, in first-seen order.
    pub patients: Vec<String>,
    /// Catalogued types first in catalogue order, then unknown codes sorted.
    pub doc_type_counts: Vec<DocTypeCount>,
}

#[derive(Clone)]
pub struct DocumentExporter {
    store: Arc<dyn DocumentStore>,
    workspaces: WorkspaceService,
}

impl DocumentExporter {
    pub fn new(store: Arc<dyn DocumentStore>, workspaces: WorkspaceService) -> Self {
        Self { store, workspaces }
    }

    /// Export the documents of `request.encounter_id`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidInput`] for a blank encounter id or a zero cap
    /// - [`PipelineError::StoreConnection`] / [`PipelineError::StoreQuery`] from the store
    /// - [`PipelineError::NoDocumentsFound`] when the store returns nothing; no workspace is
    ///   allocated in that case
    /// - [`PipelineError::Workspace`] when writing fails
    pub async fn export(&self, request: ExportRequest) -> PipelineResult<ExportOutcome> {
        let encounter_id = request.encounter_id.trim().to_string();
        if encounter_id.is_empty() {
            return Err(PipelineError::InvalidInput(
                "encounter id cannot be empty".into(),
            ));
        }
        if request.max_docs == 0 {
            return Err(PipelineError::InvalidInput(
                "max_docs must be greater than zero".into(),
            ));
        }

        let store = Arc::clone(&self.store);
        let id = encounter_id.clone();
        let records =
            tokio::task::spawn_blocking(move || store.fetch_ranked(&id, request.max_docs))
                .await??;

        if records.is_empty() {
            tracing::info!(%encounter_id, "no documents found");
            return Err(PipelineError::NoDocumentsFound(encounter_id));
        }

        let workspaces = self.workspaces.clone();
        let outcome =
            tokio::task::spawn_blocking(move || write_documents(&workspaces, &records)).await??;

        tracing::info!(
            %encounter_id,
            token = %outcome.workspace.token(),
            documents = outcome.documents,
            patients = outcome.patients.len(),
            "exported clinical documents"
        );
        Ok(outcome)
    }
}

fn write_documents(
    workspaces: &WorkspaceService,
    records: &[DocumentRecord],
) -> PipelineResult<ExportOutcome> {
    let mut workspace = workspaces.allocate(WorkspaceKind::Cdas)?;
    let mut patients: Vec<String> = Vec::new();
    let mut dirs: HashMap<&str, String> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

    for record in records {
        let patient_dir = match dirs.get(record.patient_name.as_str()) {
            Some(dir) => dir.clone(),
            None => {
                let dir = unique_dir_name(&record.patient_name, &taken);
                workspace.create_dir(&dir)?;
                taken.insert(dir.clone());
                dirs.insert(&record.patient_name, dir.clone());
                patients.push(dir.clone());
                dir
            }
        };

        let relative = PathBuf::from(&patient_dir).join(export_file_name(record, &patient_dir));
        workspace.write(relative, record.content.as_bytes())?;
        *counts.entry(record.doc_type_code.as_str()).or_default() += 1;
    }

    Ok(ExportOutcome {
        workspace,
        documents: records.len(),
        patients,
        doc_type_counts: tally(counts),
    })
}

/// `EMR-SD-<last two of code>-<label>-<patient>-T01-<seq:03>.xml`
pub fn export_file_name(record: &DocumentRecord, patient_dir: &str) -> String {
    format!(
        "EMR-SD-{}-{}-{}-{}-{:03}.xml",
        sanitize_path_component(&short_code(&record.doc_type_code)),
        label_for(&record.doc_type_code),
        patient_dir,
        EXPORT_FILE_MARKER,
        record.sequence_no
    )
}

/// Make a store-supplied value usable as a single path component.
pub fn sanitize_path_component(value: &str) -> String {
    let cleaned: String = value
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => UNNAMED_PATIENT_DIR.to_string(),
        _ => cleaned,
    }
}

/// Sanitised `name`, suffixed `-2`, `-3`, ... when another patient already has that directory.
fn unique_dir_name(name: &str, taken: &HashSet<String>) -> String {
    let base = sanitize_path_component(name);
    let mut candidate = base.clone();
    let mut n = 1;
    while taken.contains(&candidate) {
        n += 1;
        candidate = format!("{base}-{n}");
    }
    candidate
}

fn tally(counts: BTreeMap<&str, usize>) -> Vec<DocTypeCount> {
    let known = DOC_TYPES.iter().filter_map(|(code, label)| {
        counts.get(code).map(|count| DocTypeCount {
            code: code.to_string(),
            label: label.to_string(),
            count: *count,
        })
    });
    let unknown = counts
        .iter()
        .filter(|(code, _)| !DOC_TYPES.iter().any(|(c, _)| c == *code))
        .map(|(code, count)| DocTypeCount {
            code: code.to_string(),
            label: label_for(code).to_string(),
            count: *count,
        });
    known.chain(unknown).collect()
}
