use crate::constants::{HL7_V3_NAMESPACE, HL7_V3_PREFIX};
use crate::{PipelineError, PipelineResult};
use std::fmt;

/// One element step of a [`NodePath`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    namespaced: bool,
    local: String,
}

impl Segment {
    /// True when `namespace`/`local` name this step. Prefixed steps only match elements in the
    /// HL7 v3 namespace; bare steps only match elements with no namespace.
    pub(crate) fn matches(&self, namespace: Option<&[u8]>, local: &[u8]) -> bool {
        let ns_ok = match namespace {
            Some(ns) => self.namespaced && ns == HL7_V3_NAMESPACE.as_bytes(),
            None => !self.namespaced,
        };
        ns_ok && self.local.as_bytes() == local
    }
}

/// An attribute address inside a message, written `<element-path>/@<attribute>`.
///
/// The element path is relative to the document root, e.g.
/// `xmlns:controlActProcess/xmlns:queryByParameter/xmlns:patient.id/xmlns:value/@extension`.
/// An element path of `.` addresses the root itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodePath {
    raw: String,
    segments: Vec<Segment>,
    attribute: String,
}

impl NodePath {
    /// Parse a path. The split happens at the last `/@`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidPath`] when the `/@` separator is missing, the attribute
    /// name is empty, a step is empty or `..`, or a step uses a prefix other than `xmlns`.
    pub fn parse(input: &str) -> PipelineResult<Self> {
        let raw = input.trim();
        let invalid = |reason: &str| PipelineError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let (element_part, attribute) = raw
            .rsplit_once("/@")
            .ok_or_else(|| invalid("missing '/@<attribute>' suffix"))?;

        if attribute.is_empty() || attribute.contains(['/', '@']) {
            return Err(invalid("attribute name is empty or malformed"));
        }
        if attribute.chars().any(char::is_whitespace) {
            return Err(invalid("attribute name contains whitespace"));
        }

        let mut segments = Vec::new();
        for step in element_part.split('/') {
            match step {
                "." => continue,
                "" => return Err(invalid("empty path step")),
                ".." => return Err(invalid("parent steps are not supported")),
                _ => {}
            }
            let segment = match step.split_once(':') {
                Some((prefix, local)) if prefix == HL7_V3_PREFIX && !local.is_empty() => Segment {
                    namespaced: true,
                    local: local.to_string(),
                },
                Some((prefix, _)) => {
                    return Err(invalid(&format!("unknown namespace prefix '{prefix}'")));
                }
                None => Segment {
                    namespaced: false,
                    local: step.to_string(),
                },
            };
            if segment.local.contains(['@', '[', ']', '*']) || segment.local.trim() != segment.local
            {
                return Err(invalid(&format!("unsupported step '{step}'")));
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            attribute: attribute.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True when `stack` (root first, current element last) is the element this path names.
    pub(crate) fn matches_stack(&self, stack: &[ElementName]) -> bool {
        let Some((_root, below_root)) = stack.split_first() else {
            return false;
        };
        below_root.len() == self.segments.len()
            && below_root
                .iter()
                .zip(&self.segments)
                .all(|(name, seg)| seg.matches(name.namespace.as_deref(), &name.local))
    }

    pub(crate) fn not_found(&self) -> PipelineError {
        PipelineError::PathNotFound {
            path: self.raw.clone(),
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolved name of an open element while streaming a document.
#[derive(Clone, Debug)]
pub(crate) struct ElementName {
    pub(crate) namespace: Option<Vec<u8>>,
    pub(crate) local: Vec<u8>,
}
