//! HL7 v3 interaction messages.
//!
//! A [`MessageTemplate`] holds the raw bytes of one template file. Rendering streams the document
//! once, rewriting the attributes addressed by a list of [`AttributeEdit`]s, and re-serialises it
//! with a UTF-8 declaration and two-space indentation. The template itself is never modified, so
//! the same template can be rendered for both test variants.
//!
//! Each edit is applied to the first element in document order that its path names. Edits are
//! applied in list order, so a later edit of the same attribute wins.

mod envelope;
mod mutation;
mod path;

pub use envelope::{Envelope, EnvelopeStamper};
pub use mutation::{MutationEngine, MutationInstruction, Variant};
pub use path::{NodePath, Segment};

use crate::{PipelineError, PipelineResult};
use path::ElementName;
use quick_xml::events::{BytesDecl, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::Writer;
use std::path::{Path, PathBuf};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Set `path`'s attribute to `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeEdit {
    pub path: NodePath,
    pub value: String,
}

impl AttributeEdit {
    pub fn new(path: NodePath, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// A loaded, well-formed message template.
#[derive(Clone, Debug)]
pub struct MessageTemplate {
    source: PathBuf,
    bytes: Vec<u8>,
}

impl MessageTemplate {
    /// Read and check a template file.
    ///
    /// # Errors
    ///
    /// [`PipelineError::TemplateRead`] if the file cannot be read, [`PipelineError::TemplateParse`]
    /// if it is not well-formed XML with a single root element.
    pub fn load(path: &Path) -> PipelineResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| PipelineError::TemplateRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Wrap in-memory template bytes; `source` is only used in error messages.
    pub fn from_bytes(source: impl Into<PathBuf>, bytes: Vec<u8>) -> PipelineResult<Self> {
        let bytes = match bytes.strip_prefix(UTF8_BOM) {
            Some(rest) => rest.to_vec(),
            None => bytes,
        };
        let template = Self {
            source: source.into(),
            bytes,
        };
        template.render(&[])?;
        Ok(template)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Serialise the template with `edits` applied.
    ///
    /// # Errors
    ///
    /// [`PipelineError::PathNotFound`] for the first edit whose element does not exist. Nothing is
    /// returned in that case, so a caller never sees a partially edited document.
    pub fn render(&self, edits: &[AttributeEdit]) -> PipelineResult<Vec<u8>> {
        let mut reader = NsReader::from_reader(self.bytes.as_slice());
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(serialise_error)?;

        let mut stack: Vec<ElementName> = Vec::new();
        let mut applied = vec![false; edits.len()];
        let mut roots = 0usize;
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| self.parse_error(e))?;
            match event {
                Event::Start(start) => {
                    let name = self.element_name(resolved, &start)?;
                    roots += usize::from(stack.is_empty());
                    stack.push(name);
                    let start = self.rewrite(start, &stack, edits, &mut applied)?;
                    writer
                        .write_event(Event::Start(start))
                        .map_err(serialise_error)?;
                }
                Event::Empty(start) => {
                    let name = self.element_name(resolved, &start)?;
                    roots += usize::from(stack.is_empty());
                    stack.push(name);
                    let start = self.rewrite(start, &stack, edits, &mut applied)?;
                    stack.pop();
                    writer
                        .write_event(Event::Empty(start))
                        .map_err(serialise_error)?;
                }
                Event::End(end) => {
                    stack.pop();
                    writer.write_event(Event::End(end)).map_err(serialise_error)?;
                }
                // Layout whitespace; the writer re-indents. Text with content is kept verbatim.
                Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
                Event::Decl(_) => {}
                Event::Eof => break,
                other => writer.write_event(other).map_err(serialise_error)?,
            }
        }

        if roots != 1 {
            return Err(self.parse_message(format!(
                "expected exactly one root element, found {roots}"
            )));
        }
        if let Some(missing) = edits
            .iter()
            .zip(&applied)
            .find_map(|(edit, done)| (!done).then_some(edit))
        {
            return Err(missing.path.not_found());
        }

        let mut out = writer.into_inner();
        out.push(b'\n');
        Ok(out)
    }

    /// Current value of the attribute `path` names.
    ///
    /// Returns `Ok(None)` when the element exists without that attribute.
    ///
    /// # Errors
    ///
    /// [`PipelineError::PathNotFound`] when no element matches.
    pub fn attribute(&self, path: &NodePath) -> PipelineResult<Option<String>> {
        let mut reader = NsReader::from_reader(self.bytes.as_slice());
        let mut stack: Vec<ElementName> = Vec::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| self.parse_error(e))?;
            let (start, empty) = match event {
                Event::Start(start) => (start, false),
                Event::Empty(start) => (start, true),
                Event::End(_) => {
                    stack.pop();
                    continue;
                }
                Event::Eof => return Err(path.not_found()),
                _ => continue,
            };

            stack.push(self.element_name(resolved, &start)?);
            if path.matches_stack(&stack) {
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| self.parse_error(e))?;
                    if attr.key.as_ref() == path.attribute().as_bytes() {
                        let value = attr.unescape_value().map_err(|e| self.parse_error(e))?;
                        return Ok(Some(value.into_owned()));
                    }
                }
                return Ok(None);
            }
            if empty {
                stack.pop();
            }
        }
    }

    fn element_name(
        &self,
        resolved: ResolveResult,
        start: &BytesStart,
    ) -> PipelineResult<ElementName> {
        let namespace = match resolved {
            ResolveResult::Bound(Namespace(ns)) => Some(ns.to_vec()),
            ResolveResult::Unbound => None,
            ResolveResult::Unknown(prefix) => {
                return Err(self.parse_message(format!(
                    "unbound namespace prefix '{}'",
                    String::from_utf8_lossy(&prefix)
                )));
            }
        };
        Ok(ElementName {
            namespace,
            local: start.local_name().as_ref().to_vec(),
        })
    }

    /// Return `start` with every pending edit that names the current element applied.
    fn rewrite<'a>(
        &self,
        start: BytesStart<'a>,
        stack: &[ElementName],
        edits: &[AttributeEdit],
        applied: &mut [bool],
    ) -> PipelineResult<BytesStart<'a>> {
        let hits: Vec<usize> = edits
            .iter()
            .enumerate()
            .filter(|(i, edit)| !applied[*i] && edit.path.matches_stack(stack))
            .map(|(i, _)| i)
            .collect();
        if hits.is_empty() {
            return Ok(start);
        }

        // Raw (still escaped) key/value pairs, in their original order.
        let mut attrs: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.parse_error(e))?;
            attrs.push((attr.key.as_ref().to_vec(), attr.value.into_owned()));
        }

        for i in hits {
            applied[i] = true;
            let key = edits[i].path.attribute().as_bytes();
            let value = quick_xml::escape::escape(edits[i].value.as_str())
                .as_bytes()
                .to_vec();
            match attrs.iter_mut().find(|(k, _)| k.as_slice() == key) {
                Some((_, v)) => *v = value,
                None => attrs.push((key.to_vec(), value)),
            }
        }

        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| self.parse_message(e.to_string()))?
            .to_string();
        let mut rebuilt = BytesStart::new(name);
        for (key, value) in &attrs {
            rebuilt.push_attribute((key.as_slice(), value.as_slice()));
        }
        Ok(rebuilt)
    }

    fn parse_error(&self, err: impl std::fmt::Display) -> PipelineError {
        self.parse_message(err.to_string())
    }

    fn parse_message(&self, message: String) -> PipelineError {
        PipelineError::TemplateParse {
            path: self.source.clone(),
            message,
        }
    }
}

fn serialise_error(err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Serialise(err.to_string())
}
