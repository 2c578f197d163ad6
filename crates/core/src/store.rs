//! Access to the legacy clinical document store.
//!
//! The exporter only sees the [`DocumentStore`] trait. Calls are synchronous and may block on the
//! network, so callers run them on the blocking pool.

use crate::config::StoreSettings;
use crate::{PipelineError, PipelineResult};
use chrono::NaiveDateTime;
use std::time::Duration;

/// One clinical document selected by the ranked query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRecord {
    /// 1-based position within its document type, oldest first.
    pub sequence_no: u32,
    pub patient_name: String,
    pub doc_type_code: String,
    pub content: String,
}

/// Source of ranked clinical documents for an encounter.
pub trait DocumentStore: Send + Sync {
    /// Documents of `encounter_id`, ranked per document type by creation time, ordered by rank
    /// and then creation time, at most `max_docs` of them.
    ///
    /// An encounter without documents is `Ok(vec![])`, not an error.
    fn fetch_ranked(&self, encounter_id: &str, max_docs: u32) -> PipelineResult<Vec<DocumentRecord>>;
}

const RANKED_QUERY: &str = r#"
SELECT ranked."no", ranked."PatientName", ranked."DocTypeCode", ranked."DocContent"
FROM (
    SELECT row_number() OVER (PARTITION BY "DocTypeCode" ORDER BY "CreateTime" ASC) AS "no",
           "PatientName", "DocTypeCode", "DocContent", "CreateTime"
    FROM "CDADocument"
    WHERE "Visit_id" = $1
) AS ranked
ORDER BY ranked."no" ASC, ranked."CreateTime" ASC
LIMIT $2
"#;

/// [`DocumentStore`] over the PostgreSQL wire protocol.
///
/// Every call opens its own connection, runs the query inside a transaction, commits and closes
/// the connection before returning.
#[derive(Clone, Debug)]
pub struct PostgresDocumentStore {
    settings: StoreSettings,
}

impl PostgresDocumentStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self { settings }
    }

    fn connect(&self) -> PipelineResult<postgres::Client> {
        let s = &self.settings;
        let mut config = postgres::Config::new();
        config
            .host(&s.host)
            .port(s.port)
            .user(&s.user)
            .password(&s.password)
            .dbname(&s.dbname)
            .connect_timeout(Duration::from_secs(s.connect_timeout_secs));

        config
            .connect(postgres::NoTls)
            .map_err(|e| PipelineError::StoreConnection(Box::new(e)))
    }
}

impl DocumentStore for PostgresDocumentStore {
    fn fetch_ranked(&self, encounter_id: &str, max_docs: u32) -> PipelineResult<Vec<DocumentRecord>> {
        let mut client = self.connect()?;
        tracing::debug!(host = %self.settings.host, encounter_id, "connected to document store");

        let rows = {
            let mut tx = client.transaction().map_err(query_error)?;
            let rows = tx
                .query(RANKED_QUERY, &[&encounter_id, &i64::from(max_docs)])
                .map_err(query_error)?;
            tx.commit().map_err(query_error)?;
            rows
        };
        client.close().map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let no: i64 = row.try_get(0).map_err(query_error)?;
                Ok(DocumentRecord {
                    sequence_no: u32::try_from(no).map_err(query_error)?,
                    patient_name: row.try_get(1).map_err(query_error)?,
                    doc_type_code: row.try_get(2).map_err(query_error)?,
                    content: row.try_get(3).map_err(query_error)?,
                })
            })
            .collect()
    }
}

fn query_error(err: impl std::error::Error + Send + Sync + 'static) -> PipelineError {
    PipelineError::StoreQuery(Box::new(err))
}

/// A stored document as held by [`InMemoryDocumentStore`].
#[derive(Clone, Debug)]
pub struct StoredDocument {
    pub encounter_id: String,
    pub patient_name: String,
    pub doc_type_code: String,
    pub content: String,
    pub created_at: NaiveDateTime,
}

/// [`DocumentStore`] over a fixed list of documents, ranked the same way as the SQL query.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDocumentStore {
    documents: Vec<StoredDocument>,
}

impl InMemoryDocumentStore {
    pub fn new(documents: Vec<StoredDocument>) -> Self {
        Self { documents }
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn fetch_ranked(&self, encounter_id: &str, max_docs: u32) -> PipelineResult<Vec<DocumentRecord>> {
        let mut matching: Vec<&StoredDocument> = self
            .documents
            .iter()
            .filter(|d| d.encounter_id == encounter_id)
            .collect();
        matching.sort_by_key(|d| d.created_at);

        let mut per_type: std::collections::HashMap<&str, u32> = Default::default();
        let mut ranked: Vec<(u32, &StoredDocument)> = matching
            .into_iter()
            .map(|d| {
                let rank = per_type.entry(d.doc_type_code.as_str()).or_insert(0);
                *rank += 1;
                (*rank, d)
            })
            .collect();
        ranked.sort_by_key(|(rank, d)| (*rank, d.created_at));

        Ok(ranked
            .into_iter()
            .take(max_docs as usize)
            .map(|(rank, d)| DocumentRecord {
                sequence_no: rank,
                patient_name: d.patient_name.clone(),
                doc_type_code: d.doc_type_code.clone(),
                content: d.content.clone(),
            })
            .collect())
    }
}
