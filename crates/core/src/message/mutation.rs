use super::{AttributeEdit, Envelope, MessageTemplate, NodePath};
use crate::PipelineResult;
use serde::{Deserialize, Serialize};

/// Which test case a message is rendered for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Carries the caller's values and should be accepted by the platform.
    Positive,
    /// Carries the sentinel in every mutated field and should be rejected.
    Negative,
}

/// One caller-supplied attribute mutation.
///
/// `comment`, `example` and `sql` are descriptive only and never reach the document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationInstruction {
    pub path: String,
    pub value: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Applies mutation instructions on top of the envelope.
#[derive(Clone, Debug)]
pub struct MutationEngine {
    sentinel: String,
}

impl MutationEngine {
    pub fn new(sentinel: impl Into<String>) -> Self {
        Self {
            sentinel: sentinel.into(),
        }
    }

    pub fn sentinel(&self) -> &str {
        &self.sentinel
    }

    /// Parse every instruction into an edit carrying the value for `variant`.
    ///
    /// # Errors
    ///
    /// [`crate::PipelineError::InvalidPath`] for the first malformed path.
    pub fn edits(
        &self,
        instructions: &[MutationInstruction],
        variant: Variant,
    ) -> PipelineResult<Vec<AttributeEdit>> {
        instructions
            .iter()
            .map(|instruction| {
                let value = match variant {
                    Variant::Positive => instruction.value.clone(),
                    Variant::Negative => self.sentinel.clone(),
                };
                Ok(AttributeEdit::new(NodePath::parse(&instruction.path)?, value))
            })
            .collect()
    }

    /// Render `template` for `variant`: envelope first, then the instructions in order.
    ///
    /// # Errors
    ///
    /// [`crate::PipelineError::InvalidPath`] or [`crate::PipelineError::PathNotFound`]; no bytes
    /// are produced on error.
    pub fn apply(
        &self,
        template: &MessageTemplate,
        envelope: &Envelope,
        instructions: &[MutationInstruction],
        variant: Variant,
    ) -> PipelineResult<Vec<u8>> {
        let mut edits = envelope.edits()?;
        edits.extend(self.edits(instructions, variant)?);
        template.render(&edits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ENVELOPE_CREATION_TIME_PATH, ENVELOPE_MESSAGE_ID_PATH};
    use crate::message::tests::{PATIENT_ID_PATH, PATIENT_QUERY};
    use crate::message::EnvelopeStamper;
    use crate::PipelineError;

    fn instruction(path: &str, value: &str) -> MutationInstruction {
        MutationInstruction {
            path: path.into(),
            value: value.into(),
            comment: "患者ID".into(),
            example: None,
            sql: None,
        }
    }

    fn template() -> MessageTemplate {
        MessageTemplate::from_bytes("q.xml", PATIENT_QUERY.as_bytes().to_vec()).unwrap()
    }

    fn read(xml: &[u8], path: &str) -> Option<String> {
        MessageTemplate::from_bytes("out.xml", xml.to_vec())
            .unwrap()
            .attribute(&NodePath::parse(path).unwrap())
            .unwrap()
    }

    #[test]
    fn positive_and_negative_variants_differ_only_in_values() {
        let engine = MutationEngine::new("000000");
        let envelope = EnvelopeStamper::new("s", "r").envelope();
        let instructions = [instruction(PATIENT_ID_PATH, "12345")];

        let positive = engine
            .apply(&template(), &envelope, &instructions, Variant::Positive)
            .unwrap();
        let negative = engine
            .apply(&template(), &envelope, &instructions, Variant::Negative)
            .unwrap();

        assert_eq!(read(&positive, PATIENT_ID_PATH).as_deref(), Some("12345"));
        assert_eq!(read(&negative, PATIENT_ID_PATH).as_deref(), Some("000000"));
        for path in [ENVELOPE_MESSAGE_ID_PATH, ENVELOPE_CREATION_TIME_PATH] {
            assert_eq!(read(&positive, path), read(&negative, path));
        }
    }

    #[test]
    fn negative_uses_configured_sentinel() {
        let engine = MutationEngine::new("INVALID");
        let envelope = EnvelopeStamper::new("s", "r").envelope();

        let negative = engine
            .apply(
                &template(),
                &envelope,
                &[instruction(PATIENT_ID_PATH, "12345")],
                Variant::Negative,
            )
            .unwrap();

        assert_eq!(read(&negative, PATIENT_ID_PATH).as_deref(), Some("INVALID"));
    }

    #[test]
    fn instruction_can_override_envelope_field() {
        let engine = MutationEngine::new("000000");
        let envelope = EnvelopeStamper::new("s", "r").envelope();

        let out = engine
            .apply(
                &template(),
                &envelope,
                &[instruction(ENVELOPE_MESSAGE_ID_PATH, "fixed")],
                Variant::Positive,
            )
            .unwrap();

        assert_eq!(read(&out, ENVELOPE_MESSAGE_ID_PATH).as_deref(), Some("fixed"));
    }

    #[test]
    fn unresolvable_instruction_fails_whole_render() {
        let engine = MutationEngine::new("000000");
        let envelope = EnvelopeStamper::new("s", "r").envelope();
        let instructions = [
            instruction(PATIENT_ID_PATH, "12345"),
            instruction("xmlns:controlActProcess/xmlns:missing/@value", "x"),
        ];

        let err = engine
            .apply(&template(), &envelope, &instructions, Variant::Positive)
            .unwrap_err();

        assert!(matches!(err, PipelineError::PathNotFound { .. }));
    }

    #[test]
    fn malformed_instruction_path_is_invalid() {
        let engine = MutationEngine::new("000000");

        let err = engine
            .edits(&[instruction("xmlns:id", "1")], Variant::Positive)
            .unwrap_err();

        assert!(matches!(err, PipelineError::InvalidPath { .. }));
    }

    #[test]
    fn instruction_deserialises_with_optional_fields() {
        let parsed: MutationInstruction =
            serde_json::from_str(r#"{"path": "xmlns:id/@extension", "value": "1"}"#).unwrap();

        assert_eq!(parsed.comment, "");
        assert_eq!(parsed.example, None);
    }
}
