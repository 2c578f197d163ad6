//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services as an
//! `Arc<CoreConfig>`. Request handling never reads process-wide environment variables.
//!
//! The `from_lookup` constructors take a key lookup function instead of reading the environment
//! themselves; binaries pass `|key| std::env::var(key).ok()` and tests pass a map.

use crate::constants::{
    DEFAULT_MAX_DOCS, DEFAULT_NEGATIVE_SENTINEL, DEFAULT_RECEIVER_ID, DEFAULT_SENDER_ID,
    DEFAULT_STATIC_ROOT, SERVICES_TEMPLATE_DIR_NAME,
};
use crate::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    static_root: PathBuf,
    sender_id: String,
    receiver_id: String,
    negative_sentinel: String,
    max_docs: u32,
    public_base_url: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if an envelope id or the sentinel is blank, or if
    /// `max_docs` is zero.
    pub fn new(
        static_root: PathBuf,
        sender_id: String,
        receiver_id: String,
        negative_sentinel: String,
        max_docs: u32,
        public_base_url: Option<String>,
    ) -> PipelineResult<Self> {
        for (name, value) in [
            ("sender_id", &sender_id),
            ("receiver_id", &receiver_id),
            ("negative_sentinel", &negative_sentinel),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidInput(format!("{name} cannot be empty")));
            }
        }
        if max_docs == 0 {
            return Err(PipelineError::InvalidInput(
                "max_docs must be greater than zero".into(),
            ));
        }

        let public_base_url = public_base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());

        Ok(Self {
            static_root,
            sender_id,
            receiver_id,
            negative_sentinel,
            max_docs,
            public_base_url,
        })
    }

    /// Build a configuration from `HIP_STATIC_ROOT`, `SEND_ID`, `RECV_ID`,
    /// `DEFAULT_TEST_VALUE`, `MAX_CDA_NUM` and `HIP_PUBLIC_BASE_URL`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        Self::new(
            PathBuf::from(
                non_blank(lookup("HIP_STATIC_ROOT")).unwrap_or_else(|| DEFAULT_STATIC_ROOT.into()),
            ),
            non_blank(lookup("SEND_ID")).unwrap_or_else(|| DEFAULT_SENDER_ID.into()),
            non_blank(lookup("RECV_ID")).unwrap_or_else(|| DEFAULT_RECEIVER_ID.into()),
            non_blank(lookup("DEFAULT_TEST_VALUE"))
                .unwrap_or_else(|| DEFAULT_NEGATIVE_SENTINEL.into()),
            max_docs_from_env_value(lookup("MAX_CDA_NUM"))?,
            lookup("HIP_PUBLIC_BASE_URL"),
        )
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    /// `<static_root>/services`, where the message templates live.
    pub fn template_dir(&self) -> PathBuf {
        self.static_root.join(SERVICES_TEMPLATE_DIR_NAME)
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn receiver_id(&self) -> &str {
        &self.receiver_id
    }

    pub fn negative_sentinel(&self) -> &str {
        &self.negative_sentinel
    }

    pub fn max_docs(&self) -> u32 {
        self.max_docs
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.public_base_url.as_deref()
    }
}

/// Connection settings for the legacy clinical document store.
///
/// Credentials are supplied out-of-band (environment or `.env`), never in requests.
#[derive(Clone)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub connect_timeout_secs: u64,
}

impl std::fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl StoreSettings {
    /// Build settings from `CDA_DB_HOST`, `CDA_DB_PORT`, `CDA_DB_USER`, `CDA_DB_PASSWORD` and
    /// `CDA_DB_NAME`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] if the port is not a number.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PipelineResult<Self> {
        let port = match non_blank(lookup("CDA_DB_PORT")) {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                PipelineError::InvalidInput(format!("CDA_DB_PORT '{raw}' is not a port: {e}"))
            })?,
            None => 5432,
        };

        Ok(Self {
            host: non_blank(lookup("CDA_DB_HOST")).unwrap_or_else(|| "localhost".into()),
            port,
            user: non_blank(lookup("CDA_DB_USER")).unwrap_or_else(|| "cda".into()),
            password: lookup("CDA_DB_PASSWORD").unwrap_or_default(),
            dbname: non_blank(lookup("CDA_DB_NAME")).unwrap_or_else(|| "CDADB".into()),
            connect_timeout_secs: 3,
        })
    }
}

/// Parse the per-encounter document cap from an optional string value.
///
/// `None` or blank yields [`DEFAULT_MAX_DOCS`].
pub fn max_docs_from_env_value(value: Option<String>) -> PipelineResult<u32> {
    match non_blank(value) {
        None => Ok(DEFAULT_MAX_DOCS),
        Some(raw) => match raw.parse::<u32>() {
            Ok(0) | Err(_) => Err(PipelineError::InvalidInput(format!(
                "MAX_CDA_NUM must be a positive integer, got '{raw}'"
            ))),
            Ok(n) => Ok(n),
        },
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = CoreConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(cfg.static_root(), Path::new("static"));
        assert_eq!(cfg.template_dir(), PathBuf::from("static/services"));
        assert_eq!(cfg.sender_id(), "esbid_send");
        assert_eq!(cfg.receiver_id(), "esbid_receive");
        assert_eq!(cfg.negative_sentinel(), "000000");
        assert_eq!(cfg.max_docs(), 20);
        assert_eq!(cfg.public_base_url(), None);
    }

    #[test]
    fn overrides_are_read_and_trimmed() {
        let cfg = CoreConfig::from_lookup(lookup(&[
            ("SEND_ID", " sender-1 "),
            ("DEFAULT_TEST_VALUE", "INVALID"),
            ("MAX_CDA_NUM", "5"),
            ("HIP_PUBLIC_BASE_URL", "http://tools.example/"),
        ]))
        .unwrap();

        assert_eq!(cfg.sender_id(), "sender-1");
        assert_eq!(cfg.negative_sentinel(), "INVALID");
        assert_eq!(cfg.max_docs(), 5);
        assert_eq!(cfg.public_base_url(), Some("http://tools.example"));
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let cfg = CoreConfig::from_lookup(lookup(&[("RECV_ID", "   ")])).unwrap();

        assert_eq!(cfg.receiver_id(), "esbid_receive");
    }

    #[test]
    fn rejects_bad_max_docs() {
        assert!(max_docs_from_env_value(Some("0".into())).is_err());
        assert!(max_docs_from_env_value(Some("-3".into())).is_err());
        assert!(max_docs_from_env_value(Some("lots".into())).is_err());
        assert_eq!(max_docs_from_env_value(Some(" 7 ".into())).unwrap(), 7);
    }

    #[test]
    fn new_rejects_empty_sentinel() {
        let result = CoreConfig::new(
            PathBuf::from("static"),
            "s".into(),
            "r".into(),
            " ".into(),
            1,
            None,
        );

        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn store_settings_redact_password_in_debug() {
        let settings = StoreSettings::from_lookup(lookup(&[
            ("CDA_DB_HOST", "10.0.0.5"),
            ("CDA_DB_PASSWORD", "hunter2"),
            ("CDA_DB_PORT", "15432"),
        ]))
        .unwrap();

        assert_eq!(settings.port, 15432);
        assert_eq!(settings.host, "10.0.0.5");
        let debug = format!("{settings:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn store_settings_reject_bad_port() {
        let result = StoreSettings::from_lookup(lookup(&[("CDA_DB_PORT", "eighty")]));

        assert!(matches!(result, Err(PipelineError::InvalidInput(_))));
    }
}
