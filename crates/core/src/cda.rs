//! Clinical document type codes and their display labels.

use crate::constants::UNKNOWN_DOC_TYPE_LABEL;

pub const DOC_TYPES: &[(&str, &str)] = &[
    ("C0001", "病历概要"),
    ("C0002", "门（急）诊病历"),
    ("C0003", "急诊留观病历"),
    ("C0004", "西药处方"),
    ("C0005", "中药处方"),
    ("C0006", "检查报告"),
    ("C0007", "检验报告"),
    ("C0008", "治疗记录"),
    ("C0009", "一般手术记录"),
    ("C0010", "麻醉术前访视记录"),
    ("C0011", "麻醉记录"),
    ("C0012", "麻醉术后访视记录"),
    ("C0013", "输血记录"),
    ("C0014", "待产记录"),
    ("C0015", "阴道分娩记录"),
    ("C0016", "剖宫产记录"),
    ("C0017", "一般护理记录"),
    ("C0018", "病重（病危）护理记录"),
    ("C0019", "手术护理记录"),
    ("C0020", "生命体征测量记录"),
    ("C0021", "出入量记录"),
    ("C0022", "高值耗材使用记录"),
    ("C0023", "入院评估"),
    ("C0024", "护理计划"),
    ("C0025", "出院评估与指导"),
    ("C0026", "手术知情同意书"),
    ("C0027", "麻醉知情同意书"),
    ("C0028", "输血治疗同意书"),
    ("C0029", "特殊检查及特殊治疗同意书"),
    ("C0030", "病危（重）通知书"),
    ("C0031", "其他知情告知同意书"),
    ("C0032", "住院病案首页"),
    ("C0033", "中医住院病案首页"),
    ("C0034", "入院记录"),
    ("C0035", "24小时内入出院记录"),
    ("C0036", "24小时内入院死亡记录"),
    ("C0037", "首次病程记录"),
    ("C0038", "日常病程记录"),
    ("C0039", "上级医师查房记录"),
    ("C0040", "疑难病例讨论记录"),
    ("C0041", "交接班记录"),
    ("C0042", "转科记录"),
    ("C0043", "阶段小结"),
    ("C0044", "抢救记录"),
    ("C0045", "会诊记录"),
    ("C0046", "术前小结"),
    ("C0047", "术前讨论"),
    ("C0048", "术后首次病程记录"),
    ("C0049", "出院记录"),
    ("C0050", "死亡记录"),
    ("C0051", "死亡病例讨论记录"),
    ("C0052", "住院医嘱"),
    ("C0053", "出院小结"),
];

/// Display label for a document type code, or `"unknown"`.
pub fn label_for(code: &str) -> &'static str {
    DOC_TYPES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
        .unwrap_or(UNKNOWN_DOC_TYPE_LABEL)
}

/// Last two characters of a code (`C0034` -> `34`). Shorter codes are returned whole.
pub fn short_code(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let start = chars.len().saturating_sub(2);
    chars[start..].iter().collect()
}
