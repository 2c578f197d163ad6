//! Read-only admin access to registered entity types.
//!
//! Entity types are registered explicitly at startup under a name; the HTTP layer only sees
//! [`AdminRegistry`]. Rows are plain JSON objects so any backing source can be exposed.

use crate::catalogue::TemplateRegistry;
use crate::cda::DOC_TYPES;
use crate::constants::DEFAULT_ADMIN_PAGE_SIZE;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdminError {
    #[error("Model Not Found: {0}")]
    UnknownEntity(String),
    #[error("Item Not Found: {entity}/{id}")]
    NotFound { entity: String, id: String },
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// One admin-visible entity type.
pub trait EntityAdmin: Send + Sync {
    /// Columns shown in list views.
    fn fields(&self) -> Vec<String>;

    fn count(&self) -> usize;

    fn list(&self, skip: usize, limit: usize) -> Vec<Value>;

    fn get(&self, id: &str) -> Option<Value>;
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdminPage {
    pub entity: String,
    pub fields: Vec<String>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
    pub items: Vec<Value>,
}

#[derive(Clone, Default)]
pub struct AdminRegistry {
    entities: BTreeMap<String, Arc<dyn EntityAdmin>>,
}

impl AdminRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `service` and `doctype` catalogues.
    pub fn with_catalogues(templates: &TemplateRegistry) -> Self {
        let services = templates
            .services()
            .into_iter()
            .map(|t| {
                json!({
                    "service_code": t.service_code,
                    "service_name": t.service_name,
                    "positive_template": t.positive,
                    "negative_template": t.negative,
                    "available": t.positive.is_file() && t.negative.is_file(),
                })
            })
            .collect();
        let doc_types = DOC_TYPES
            .iter()
            .map(|(code, label)| json!({ "code": code, "label": label }))
            .collect();

        let mut registry = Self::new();
        registry
            .register(
                "service",
                StaticEntityAdmin::new(
                    "service_code",
                    &["service_code", "service_name", "available"],
                    services,
                ),
            )
            .register(
                "doctype",
                StaticEntityAdmin::new("code", &["code", "label"], doc_types),
            );
        registry
    }

    /// Add or replace the handler for `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl EntityAdmin + 'static,
    ) -> &mut Self {
        self.entities.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.entities.keys().map(String::as_str).collect()
    }

    /// One page of `name`; `limit` defaults to 10.
    pub fn list(
        &self,
        name: &str,
        skip: Option<usize>,
        limit: Option<usize>,
    ) -> AdminResult<AdminPage> {
        let entity = self.entity(name)?;
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_ADMIN_PAGE_SIZE);
        Ok(AdminPage {
            entity: name.to_string(),
            fields: entity.fields(),
            total: entity.count(),
            skip,
            limit,
            items: entity.list(skip, limit),
        })
    }

    pub fn get(&self, name: &str, id: &str) -> AdminResult<Value> {
        self.entity(name)?
            .get(id)
            .ok_or_else(|| AdminError::NotFound {
                entity: name.to_string(),
                id: id.to_string(),
            })
    }

    fn entity(&self, name: &str) -> AdminResult<&Arc<dyn EntityAdmin>> {
        self.entities
            .get(name)
            .ok_or_else(|| AdminError::UnknownEntity(name.to_string()))
    }
}

/// [`EntityAdmin`] over a fixed list of JSON rows keyed by one string field.
#[derive(Clone, Debug)]
pub struct StaticEntityAdmin {
    key_field: String,
    fields: Vec<String>,
    rows: Vec<Value>,
}

impl StaticEntityAdmin {
    pub fn new(key_field: &str, fields: &[&str], rows: Vec<Value>) -> Self {
        Self {
            key_field: key_field.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            rows,
        }
    }
}

impl EntityAdmin for StaticEntityAdmin {
    fn fields(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn count(&self) -> usize {
        self.rows.len()
    }

    fn list(&self, skip: usize, limit: usize) -> Vec<Value> {
        self.rows.iter().skip(skip).take(limit).cloned().collect()
    }

    fn get(&self, id: &str) -> Option<Value> {
        self.rows
            .iter()
            .find(|row| row.get(&self.key_field).and_then(Value::as_str) == Some(id))
            .cloned()
    }
}
