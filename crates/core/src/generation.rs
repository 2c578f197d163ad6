//! Interaction service test-case generation.
//!
//! A [`GenerationRequest`] lists services and the attribute mutations to apply to each. For every
//! entry the generator renders the positive template with the caller's values and the negative
//! template with the sentinel, both under one shared envelope.
//!
//! Generation is all-or-nothing: every document is rendered in memory first, and the workspace is
//! only allocated once all of them succeeded. A rejected request leaves nothing on disk.

use crate::catalogue::{ServiceTemplate, TemplateRegistry};
use crate::config::CoreConfig;
use crate::message::{EnvelopeStamper, MessageTemplate, MutationEngine, MutationInstruction, Variant};
use crate::{PipelineError, PipelineResult};
use hip_files::{Workspace, WorkspaceKind, WorkspaceService};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One service entry of a generation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationEntry {
    pub service_code: String,
    /// Display name supplied by the caller; the catalogue name is used for files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Interoperability assessment level, descriptive only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<String>,
    pub instructions: Vec<MutationInstruction>,
}

/// Ordered list of service entries. Entry order is preserved in the output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub entries: Vec<GenerationEntry>,
}

/// Renders test-case pairs into a `services` workspace.
#[derive(Clone, Debug)]
pub struct ServiceCaseGenerator {
    registry: TemplateRegistry,
    stamper: EnvelopeStamper,
    engine: MutationEngine,
    workspaces: WorkspaceService,
}

impl ServiceCaseGenerator {
    pub fn new(cfg: &CoreConfig, workspaces: WorkspaceService) -> Self {
        Self {
            registry: TemplateRegistry::new(cfg.template_dir()),
            stamper: EnvelopeStamper::new(cfg.sender_id(), cfg.receiver_id()),
            engine: MutationEngine::new(cfg.negative_sentinel()),
            workspaces,
        }
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Validate, render and write every entry of `request`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidInput`] for an empty request or an entry without instructions
    /// - [`PipelineError::UnknownService`] / [`PipelineError::DuplicateService`]
    /// - template, path and mutation errors from rendering
    /// - [`PipelineError::Workspace`] when allocating or writing fails; a workspace that was
    ///   already allocated is left in place
    pub fn generate(&self, request: &GenerationRequest) -> PipelineResult<Workspace> {
        let templates = self.validate(request)?;

        let mut documents: Vec<(String, Vec<u8>)> = Vec::with_capacity(templates.len() * 2);
        for (entry, template) in request.entries.iter().zip(&templates) {
            let envelope = self.stamper.envelope();
            let positive = MessageTemplate::load(&template.positive)?;
            let negative = MessageTemplate::load(&template.negative)?;

            documents.push((
                template.positive_file_name(),
                self.engine
                    .apply(&positive, &envelope, &entry.instructions, Variant::Positive)?,
            ));
            documents.push((
                template.negative_file_name(),
                self.engine
                    .apply(&negative, &envelope, &entry.instructions, Variant::Negative)?,
            ));
            tracing::debug!(
                service = %template.service_code,
                message_id = %envelope.message_id,
                "rendered test case pair"
            );
        }

        let mut workspace = self.workspaces.allocate(WorkspaceKind::Services)?;
        for (name, bytes) in &documents {
            workspace.write(name, bytes)?;
        }

        tracing::info!(
            token = %workspace.token(),
            services = templates.len(),
            files = documents.len(),
            "generated service test cases"
        );
        Ok(workspace)
    }

    /// [`Self::generate`] on the blocking pool.
    pub async fn generate_blocking(&self, request: GenerationRequest) -> PipelineResult<Workspace> {
        let generator = self.clone();
        tokio::task::spawn_blocking(move || generator.generate(&request)).await?
    }

    fn validate(&self, request: &GenerationRequest) -> PipelineResult<Vec<ServiceTemplate>> {
        if request.entries.is_empty() {
            return Err(PipelineError::InvalidInput(
                "request contains no services".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut templates = Vec::with_capacity(request.entries.len());
        for entry in &request.entries {
            let template = self.registry.resolve(&entry.service_code)?;
            if !seen.insert(template.service_code.clone()) {
                return Err(PipelineError::DuplicateService(template.service_code));
            }
            if entry.instructions.is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "service {} has no parameters",
                    template.service_code
                )));
            }
            templates.push(template);
        }
        Ok(templates)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::message::tests::{PATIENT_ID_PATH, PATIENT_QUERY};
    use crate::message::NodePath;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    pub(crate) fn test_config(static_root: &Path) -> CoreConfig {
        CoreConfig::new(
            static_root.to_path_buf(),
            "esbid_send".into(),
            "esbid_receive".into(),
            "000000".into(),
            20,
            None,
        )
        .unwrap()
    }

    /// Static root with templates for `PatientInfoQuery` and `DocumentRetrieve`.
    pub(crate) fn static_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        let registry = TemplateRegistry::new(dir.path().join("services"));
        fs::create_dir_all(registry.template_dir()).unwrap();
        for code in ["PatientInfoQuery", "DocumentRetrieve"] {
            let template = registry.resolve(code).unwrap();
            fs::write(&template.positive, PATIENT_QUERY).unwrap();
            fs::write(&template.negative, PATIENT_QUERY).unwrap();
        }
        dir
    }

    fn generator(root: &TempDir) -> ServiceCaseGenerator {
        let workspaces = WorkspaceService::new(root.path()).unwrap();
        ServiceCaseGenerator::new(&test_config(root.path()), workspaces)
    }

    fn entry(code: &str, path: &str, value: &str) -> GenerationEntry {
        GenerationEntry {
            service_code: code.into(),
            service_name: None,
            rank: Some("5".into()),
            instructions: vec![MutationInstruction {
                path: path.into(),
                value: value.into(),
                comment: "患者ID".into(),
                example: Some("12345".into()),
                sql: None,
            }],
        }
    }

    fn read(path: &Path, node: &str) -> Option<String> {
        MessageTemplate::load(path)
            .unwrap()
            .attribute(&NodePath::parse(node).unwrap())
            .unwrap()
    }

    fn service_workspaces(root: &TempDir) -> Vec<PathBuf> {
        let dir = root.path().join("temp").join("services");
        match fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn patient_query_produces_both_variants() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![entry("PatientInfoQuery", PATIENT_ID_PATH, "12345")],
        };

        let workspace = generator(&root).generate(&request).unwrap();

        let positive = workspace.dir().join("EMR-PL-04-个人信息查询服务-T01.xml");
        let negative = workspace.dir().join("EMR-PL-04-个人信息查询服务-F01.xml");
        assert_eq!(workspace.file_paths().len(), 2);
        assert_eq!(read(&positive, PATIENT_ID_PATH).as_deref(), Some("12345"));
        assert_eq!(read(&negative, PATIENT_ID_PATH).as_deref(), Some("000000"));
        assert_eq!(
            read(&positive, "xmlns:id/@extension"),
            read(&negative, "xmlns:id/@extension")
        );
        assert_eq!(
            read(&positive, "xmlns:sender/xmlns:device/xmlns:id/xmlns:item/@extension").as_deref(),
            Some("esbid_send")
        );
    }

    #[test]
    fn each_service_gets_its_own_message_id() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![
                entry("PatientInfoQuery", PATIENT_ID_PATH, "1"),
                entry("DocumentRetrieve", PATIENT_ID_PATH, "2"),
            ],
        };

        let workspace = generator(&root).generate(&request).unwrap();

        assert_eq!(workspace.file_paths().len(), 4);
        let first = read(
            &workspace.dir().join("EMR-PL-04-个人信息查询服务-T01.xml"),
            "xmlns:id/@extension",
        );
        let second = read(
            &workspace.dir().join("EMR-PL-16-电子病历文档调阅服务-T01.xml"),
            "xmlns:id/@extension",
        );
        assert_ne!(first, second);
    }

    #[test]
    fn unresolvable_path_writes_nothing() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![
                entry("PatientInfoQuery", PATIENT_ID_PATH, "1"),
                entry("DocumentRetrieve", "xmlns:controlActProcess/xmlns:nope/@value", "2"),
            ],
        };

        let err = generator(&root).generate(&request).unwrap_err();

        assert!(matches!(err, PipelineError::PathNotFound { .. }));
        assert!(service_workspaces(&root).is_empty());
    }

    #[test]
    fn unknown_service_aborts_request() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![
                entry("PatientInfoQuery", PATIENT_ID_PATH, "1"),
                entry("NoSuchQuery", PATIENT_ID_PATH, "2"),
            ],
        };

        let err = generator(&root).generate(&request).unwrap_err();

        assert!(matches!(err, PipelineError::UnknownService(code) if code == "NoSuchQuery"));
        assert!(service_workspaces(&root).is_empty());
    }

    #[test]
    fn duplicate_and_empty_requests_are_rejected() {
        let root = static_root();
        let gen = generator(&root);

        let duplicate = GenerationRequest {
            entries: vec![
                entry("PatientInfoQuery", PATIENT_ID_PATH, "1"),
                entry("PatientInfoQuery", PATIENT_ID_PATH, "2"),
            ],
        };
        assert!(matches!(
            gen.generate(&duplicate),
            Err(PipelineError::DuplicateService(_))
        ));

        assert!(matches!(
            gen.generate(&GenerationRequest::default()),
            Err(PipelineError::InvalidInput(_))
        ));

        let mut no_params = entry("PatientInfoQuery", PATIENT_ID_PATH, "1");
        no_params.instructions.clear();
        assert!(matches!(
            gen.generate(&GenerationRequest {
                entries: vec![no_params]
            }),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(service_workspaces(&root).is_empty());
    }

    #[test]
    fn missing_template_file_is_read_error() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![entry("TerminologyQuery", PATIENT_ID_PATH, "1")],
        };

        let err = generator(&root).generate(&request).unwrap_err();

        assert!(matches!(err, PipelineError::TemplateRead { .. }));
    }

    #[tokio::test]
    async fn generate_blocking_runs_off_the_runtime() {
        let root = static_root();
        let request = GenerationRequest {
            entries: vec![entry("PatientInfoQuery", PATIENT_ID_PATH, "12345")],
        };

        let workspace = generator(&root).generate_blocking(request).await.unwrap();

        assert!(workspace.dir().is_dir());
    }
}
