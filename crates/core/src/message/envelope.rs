use super::{AttributeEdit, NodePath};
use crate::constants::{
    ENVELOPE_CREATION_TIME_PATH, ENVELOPE_MESSAGE_ID_PATH, ENVELOPE_RECEIVER_PATH,
    ENVELOPE_SENDER_PATH,
};
use crate::PipelineResult;
use hip_ids::{CreationTime, HexId};

/// Transport header fields written into every generated message.
///
/// One envelope is created per service entry and shared by its positive and negative variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub message_id: HexId,
    pub created_at: CreationTime,
    pub sender_id: String,
    pub receiver_id: String,
}

impl Envelope {
    /// The four header edits, in the order they are stamped.
    ///
    /// # Errors
    ///
    /// Only fails if one of the built-in envelope paths is malformed.
    pub fn edits(&self) -> PipelineResult<Vec<AttributeEdit>> {
        Ok(vec![
            AttributeEdit::new(
                NodePath::parse(ENVELOPE_MESSAGE_ID_PATH)?,
                self.message_id.to_string(),
            ),
            AttributeEdit::new(
                NodePath::parse(ENVELOPE_CREATION_TIME_PATH)?,
                self.created_at.to_string(),
            ),
            AttributeEdit::new(NodePath::parse(ENVELOPE_SENDER_PATH)?, self.sender_id.clone()),
            AttributeEdit::new(
                NodePath::parse(ENVELOPE_RECEIVER_PATH)?,
                self.receiver_id.clone(),
            ),
        ])
    }
}

/// Issues fresh envelopes for the configured sender and receiver devices.
#[derive(Clone, Debug)]
pub struct EnvelopeStamper {
    sender_id: String,
    receiver_id: String,
}

impl EnvelopeStamper {
    pub fn new(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
        }
    }

    /// A new envelope with a random message id and the current local time.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            message_id: HexId::new(),
            created_at: CreationTime::now(),
            sender_id: self.sender_id.clone(),
            receiver_id: self.receiver_id.clone(),
        }
    }
}
