//! Interaction service catalogue.
//!
//! Each interoperability service code maps to the file-name stem of its template pair under the
//! template directory: `<stem>-T01.xml` (positive case) and `<stem>-F01.xml` (negative case).

use crate::constants::{NEGATIVE_TEMPLATE_SUFFIX, POSITIVE_TEMPLATE_SUFFIX};
use crate::{PipelineError, PipelineResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Service code to template stem. Order is the display order of `hip services`.
pub const SERVICE_CATALOGUE: &[(&str, &str)] = &[
    ("PatientInfoQuery", "EMR-PL-04-个人信息查询服务"),
    ("OrganizationInfoQuery", "EMR-PL-07-医疗卫生机构（科室）信息查询服务"),
    ("ProviderInfoQuery", "EMR-PL-10-医疗卫生人员信息查询服务"),
    ("TerminologyQuery", "EMR-PL-13-术语查询服务"),
    ("DocumentAccess", "EMR-PL-15-电子病历文档检索服务"),
    ("DocumentRetrieve", "EMR-PL-16-电子病历文档调阅服务"),
    ("EncounterCardInfoQuery", "EMR-PL-19-就诊卡信息查询服务"),
    ("SourceAndScheduleInfoQuery", "EMR-PL-52-号源排班信息查询服务"),
    ("OutPatientInfoQuery", "EMR-PL-22-门诊挂号信息查询服务"),
    ("InPatientInfoQuery", "EMR-PL-25-住院就诊信息查询服务"),
    ("TransferInfoQuery", "EMR-PL-28-住院转科信息查询服务"),
    ("DischargeInfoQuery", "EMR-PL-31-出院登记信息查询服务"),
    ("OrderInfoQuery", "EMR-PL-34-医嘱信息查询服务"),
    ("ExamAppInfoQuery", "EMR-PL-37-检验申请信息查询服务"),
    ("CheckAppInfoQuery", "EMR-PL-40-检查申请信息查询服务"),
    ("PathologyAppInfoQuery", "EMR-PL-43-病理申请信息查询服务"),
    ("BloodTransAppInfoQuery", "EMR-PL-46-输血申请信息查询服务"),
    ("OperationAppInfoQuery", "EMR-PL-49-手术申请信息查询服务"),
    (
        "OutPatientAppointStatusInfoQuery",
        "EMR-PL-55-门诊预约状态信息查询服务",
    ),
    ("CheckAppointStatusInfoQuery", "EMR-PL-58-检查预约状态信息查询服务"),
    ("OrderFillerStatusInfoQuery", "EMR-PL-60-医嘱执行状态信息查询服务"),
    ("CheckStatusInfoQuery", "EMR-PL-62-检查状态信息查询服务"),
    ("ExamStatusInfoQuery", "EMR-PL-64-检验状态信息查询服务"),
    ("OperationScheduleInfoQuery", "EMR-PL-79-手术排班信息查询服务"),
    ("OperationStatusInfoQuery", "EMR-PL-81-手术状态信息查询服务"),
];

/// A resolved positive/negative template pair for one service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServiceTemplate {
    pub service_code: String,
    pub service_name: String,
    pub positive: PathBuf,
    pub negative: PathBuf,
}

impl ServiceTemplate {
    /// Output file name of the positive case, e.g. `EMR-PL-04-个人信息查询服务-T01.xml`.
    pub fn positive_file_name(&self) -> String {
        template_file_name(&self.service_name, POSITIVE_TEMPLATE_SUFFIX)
    }

    pub fn negative_file_name(&self) -> String {
        template_file_name(&self.service_name, NEGATIVE_TEMPLATE_SUFFIX)
    }
}

fn template_file_name(stem: &str, suffix: &str) -> String {
    format!("{stem}-{suffix}.xml")
}

/// Read-only lookup over [`SERVICE_CATALOGUE`] rooted at a template directory.
#[derive(Clone, Debug)]
pub struct TemplateRegistry {
    template_dir: PathBuf,
}

impl TemplateRegistry {
    pub fn new(template_dir: impl Into<PathBuf>) -> Self {
        Self {
            template_dir: template_dir.into(),
        }
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }

    /// Resolve a service code to its template pair.
    ///
    /// Existence of the files is not checked here; a missing file surfaces as
    /// [`PipelineError::TemplateRead`] when the template is loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownService`] when the code is not catalogued.
    pub fn resolve(&self, service_code: &str) -> PipelineResult<ServiceTemplate> {
        let code = service_code.trim();
        SERVICE_CATALOGUE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(c, name)| self.template_for(c, name))
            .ok_or_else(|| PipelineError::UnknownService(code.to_string()))
    }

    /// All catalogued services, in catalogue order.
    pub fn services(&self) -> Vec<ServiceTemplate> {
        SERVICE_CATALOGUE
            .iter()
            .map(|(c, name)| self.template_for(c, name))
            .collect()
    }

    /// Template files referenced by the catalogue that are not present on disk.
    pub fn missing_templates(&self) -> Vec<PathBuf> {
        self.services()
            .into_iter()
            .flat_map(|t| [t.positive, t.negative])
            .filter(|p| !p.is_file())
            .collect()
    }

    fn template_for(&self, code: &str, name: &str) -> ServiceTemplate {
        ServiceTemplate {
            service_code: code.to_string(),
            service_name: name.to_string(),
            positive: self
                .template_dir
                .join(template_file_name(name, POSITIVE_TEMPLATE_SUFFIX)),
            negative: self
                .template_dir
                .join(template_file_name(name, NEGATIVE_TEMPLATE_SUFFIX)),
        }
    }
}
