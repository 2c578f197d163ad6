//! Constants used throughout the HIP core crate.
//!
//! Path fragments, defaults and XML vocabulary live here so the REST server, the CLI and the
//! tests agree on them.

/// Default static root (templates and temp output live below it).
pub const DEFAULT_STATIC_ROOT: &str = "static";

/// Directory under the static root holding the message templates.
pub const SERVICES_TEMPLATE_DIR_NAME: &str = "services";

/// Namespace every HL7 v3 interaction message is written in.
pub const HL7_V3_NAMESPACE: &str = "urn:hl7-org:v3";

/// Path prefix that binds a segment to [`HL7_V3_NAMESPACE`].
pub const HL7_V3_PREFIX: &str = "xmlns";

/// File suffix of the positive ("should pass") template.
pub const POSITIVE_TEMPLATE_SUFFIX: &str = "T01";

/// File suffix of the negative ("should be rejected") template.
pub const NEGATIVE_TEMPLATE_SUFFIX: &str = "F01";

/// Value written to every mutated attribute of a negative test case.
pub const DEFAULT_NEGATIVE_SENTINEL: &str = "000000";

/// Default envelope sender device id.
pub const DEFAULT_SENDER_ID: &str = "esbid_send";

/// Default envelope receiver device id.
pub const DEFAULT_RECEIVER_ID: &str = "esbid_receive";

/// Default cap on documents exported per encounter.
pub const DEFAULT_MAX_DOCS: u32 = 20;

/// Label used when a document type code is not in the catalogue.
pub const UNKNOWN_DOC_TYPE_LABEL: &str = "unknown";

/// Marker embedded in exported document file names.
pub const EXPORT_FILE_MARKER: &str = "T01";

/// Envelope attribute paths, stamped before any user mutation.
pub const ENVELOPE_MESSAGE_ID_PATH: &str = "xmlns:id/@extension";
pub const ENVELOPE_CREATION_TIME_PATH: &str = "xmlns:creationTime/@value";
pub const ENVELOPE_SENDER_PATH: &str = "xmlns:sender/xmlns:device/xmlns:id/xmlns:item/@extension";
pub const ENVELOPE_RECEIVER_PATH: &str =
    "xmlns:receiver/xmlns:device/xmlns:id/xmlns:item/@extension";

/// Default page size of admin list queries.
pub const DEFAULT_ADMIN_PAGE_SIZE: usize = 10;
