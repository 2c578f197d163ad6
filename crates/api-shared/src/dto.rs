//! JSON wire types.
//!
//! Field names follow the existing HIP tooling front end (`data`, `params`, `eg`), which is why
//! they differ from the `hip-core` domain names.

use hip_core::{
    AdminPage, ArchiveStatus, DocTypeCount, GenerationEntry, GenerationRequest,
    MutationInstruction,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /examples/services`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationReq {
    pub data: Vec<ServiceReq>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ServiceReq {
    /// Catalogue code, e.g. `PatientInfoQuery`.
    pub service_code: String,
    #[serde(default)]
    pub service_name: Option<String>,
    /// Interoperability assessment level.
    #[serde(default)]
    pub rank: Option<String>,
    pub params: Vec<ParamReq>,
}

/// One attribute mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ParamReq {
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub eg: Option<String>,
    /// `<element-path>/@<attribute>`, e.g. `xmlns:id/@extension`.
    pub path: String,
    pub value: String,
    #[serde(default)]
    pub sql: Option<String>,
}

impl From<ParamReq> for MutationInstruction {
    fn from(p: ParamReq) -> Self {
        MutationInstruction {
            path: p.path,
            value: p.value,
            comment: p.comment,
            example: p.eg,
            sql: p.sql,
        }
    }
}

impl From<ServiceReq> for GenerationEntry {
    fn from(s: ServiceReq) -> Self {
        GenerationEntry {
            service_code: s.service_code,
            service_name: s.service_name,
            rank: s.rank,
            instructions: s.params.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<GenerationReq> for GenerationRequest {
    fn from(req: GenerationReq) -> Self {
        GenerationRequest {
            entries: req.data.into_iter().map(Into::into).collect(),
        }
    }
}

/// A queued archive and where it will be downloadable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArtifactRes {
    pub url: String,
    pub token: String,
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DocTypeCountRes {
    pub code: String,
    pub label: String,
    pub count: usize,
}

impl From<&DocTypeCount> for DocTypeCountRes {
    fn from(c: &DocTypeCount) -> Self {
        DocTypeCountRes {
            code: c.code.clone(),
            label: c.label.clone(),
            count: c.count,
        }
    }
}

/// Response of `GET /cdas/{encounter_id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExportRes {
    pub url: String,
    pub token: String,
    pub kind: String,
    pub documents: usize,
    pub patients: Vec<String>,
    pub doc_types: Vec<DocTypeCountRes>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ArchiveStatusRes {
    pub kind: String,
    pub token: String,
    /// `pending`, `completed` or `failed`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ArchiveStatusRes {
    pub fn new(kind: impl Into<String>, token: impl Into<String>, status: &ArchiveStatus) -> Self {
        let (label, archive_path, reason) = match status {
            ArchiveStatus::Pending => ("pending", None, None),
            ArchiveStatus::Completed { archive_path } => (
                "completed",
                Some(archive_path.display().to_string()),
                None,
            ),
            ArchiveStatus::Failed { reason } => ("failed", None, Some(reason.clone())),
        };
        Self {
            kind: kind.into(),
            token: token.into(),
            status: label.into(),
            archive_path,
            reason,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HelloRes {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ModelsRes {
    pub models: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminPageRes {
    pub model: String,
    pub fields: Vec<String>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<serde_json::Value>,
}

impl From<AdminPage> for AdminPageRes {
    fn from(page: AdminPage) -> Self {
        AdminPageRes {
            model: page.entity,
            fields: page.fields,
            total: page.total,
            skip: page.skip,
            limit: page.limit,
            items: page.items,
        }
    }
}
