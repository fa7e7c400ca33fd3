//! The remote system, as seen by the engine.
//!
//! A connection runs one statement at a time and returns either rows or a
//! [`RemoteError`]. Remote errors are only ever told apart by their
//! message, through [`classify`].

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// One result row: column name to value.
pub type Row = Map<String, JsonValue>;

/// A connection to the remote system.
///
/// Connections are owned by the caller and handed to each engine call. The
/// engine never issues two statements at once on the same connection.
#[async_trait]
pub trait SqlConnection: Send + Sync {
    /// Run a statement whose result is not needed.
    async fn execute(&self, statement: &str) -> Result<(), RemoteError>;
    /// Run a statement and return its rows.
    async fn query(&self, statement: &str) -> Result<Vec<Row>, RemoteError>;
}

/// A failed statement.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{statement:?} failed: {message}")]
pub struct RemoteError {
    /// The statement that failed.
    pub statement: String,
    /// The remote system's message, verbatim.
    pub message: String,
    /// Remote error code, when the remote sent one.
    pub code: Option<String>,
    /// SQL state, when the remote sent one.
    pub sql_state: Option<String>,
}

impl RemoteError {
    /// Error with just a message.
    pub fn new(statement: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            message: message.into(),
            code: None,
            sql_state: None,
        }
    }

    /// Attach the remote error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach the SQL state.
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }

    /// Classify this error for a statement about `subjects`.
    pub fn kind(&self, subjects: &[Subject]) -> ErrorKind {
        classify(&self.message, subjects)
    }
}

/// The remote error classes the engine knows how to handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The grantee already holds the privilege.
    AlreadyGranted,
    /// The grantee doesn't hold the privilege (anymore).
    AlreadyRevoked,
    /// The object the statement targets is gone.
    ObjectDoesNotExist,
    /// Anything else. Fatal.
    Other,
}

const ALREADY_GRANTED_PATTERNS: &[&str] = &["already granted", "grant already exists"];

// Checked before the object patterns: "grant ... does not exist" is about
// the grant, not the object.
const ALREADY_REVOKED_PATTERNS: &[&str] = &[
    "is not granted",
    "was not granted",
    "privilege not granted",
    "grant does not exist",
    "no privileges to revoke",
];

const MISSING_SUFFIX: &str = "' does not exist";

/// Something a statement refers to, named the way the remote names it in
/// error messages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subject {
    /// Lowercase label, e.g. `masking policy` or `schema`.
    pub label: String,
    /// Name parts, outermost first.
    pub name: Vec<String>,
}

impl Subject {
    /// Subject for an object kind keyword (`MASKING POLICY`, `SCHEMA`, ...).
    pub fn new(keyword: &str, name: Vec<String>) -> Self {
        Self {
            label: keyword.to_lowercase().replace('_', " "),
            name,
        }
    }

    /// Whether a `<label> '<name>' does not exist` mention is about this
    /// subject. Either side may be more qualified than the other.
    fn is_mentioned(&self, label: &str, mentioned: &str) -> bool {
        if label != self.label && label != "object" {
            return false;
        }
        let mentioned = mentioned.replace('"', "");
        let full = self.name.join(".").to_lowercase();
        mentioned == full
            || full.ends_with(&format!(".{mentioned}"))
            || mentioned.ends_with(&format!(".{full}"))
    }
}

/// Every `<label> '<name>' does not exist` in a lowercased message.
fn missing_mentions(message: &str) -> Vec<(&str, &str)> {
    message
        .match_indices(MISSING_SUFFIX)
        .filter_map(|(end, _)| {
            let head = &message[..end];
            let open = head.rfind('\'')?;
            let label = head[..open].rsplit(['\n', ':', '.']).next()?.trim();
            Some((label, &head[open + 1..]))
        })
        .collect()
}

/// Map a remote error message onto an [`ErrorKind`].
///
/// `subjects` are the objects the failed statement depends on. A missing
/// object only counts as [`ErrorKind::ObjectDoesNotExist`] when it is one of
/// them; a missing session warehouse or role is [`ErrorKind::Other`].
///
/// This is the only place that knows what the remote system's messages look
/// like.
pub fn classify(message: &str, subjects: &[Subject]) -> ErrorKind {
    let message = message.to_lowercase();
    let matches = |patterns: &[&str]| patterns.iter().any(|p| message.contains(p));

    if matches(ALREADY_GRANTED_PATTERNS) {
        ErrorKind::AlreadyGranted
    } else if matches(ALREADY_REVOKED_PATTERNS) {
        ErrorKind::AlreadyRevoked
    } else if missing_mentions(&message)
        .iter()
        .any(|(label, name)| subjects.iter().any(|s| s.is_mentioned(label, name)))
    {
        ErrorKind::ObjectDoesNotExist
    } else {
        ErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subjects() -> Vec<Subject> {
        vec![
            Subject::new("TABLE", vec!["db".into(), "public".into(), "orders".into()]),
            Subject::new("SCHEMA", vec!["db".into(), "public".into()]),
            Subject::new("DATABASE", vec!["db".into()]),
        ]
    }

    fn pii_mask() -> Vec<Subject> {
        vec![Subject::new("MASKING POLICY", vec!["pii_mask".into()])]
    }

    #[test]
    fn missing_target_messages_classify() {
        assert_eq!(
            classify(
                "SQL compilation error:\nMasking policy 'PII_MASK' does not exist or not authorized.",
                &pii_mask()
            ),
            ErrorKind::ObjectDoesNotExist
        );
        assert_eq!(
            classify("Masking policy 'DB.PUBLIC.PII_MASK' does not exist.", &pii_mask()),
            ErrorKind::ObjectDoesNotExist
        );
        assert_eq!(
            classify("Object 'DB.PUBLIC.ORDERS' does not exist.", &subjects()),
            ErrorKind::ObjectDoesNotExist
        );
        assert_eq!(
            classify(
                "SQL compilation error:\nSchema 'DB.PUBLIC' does not exist or not authorized.",
                &subjects()
            ),
            ErrorKind::ObjectDoesNotExist
        );
    }

    #[test]
    fn missing_session_objects_are_other() {
        assert_eq!(
            classify(
                "No active warehouse selected in the current session. Warehouse 'COMPUTE_WH' does not exist or not authorized.",
                &pii_mask()
            ),
            ErrorKind::Other
        );
        assert_eq!(
            classify("Role 'GRANT_ADMIN' does not exist or not authorized.", &subjects()),
            ErrorKind::Other
        );
        assert_eq!(
            classify("Table 'DB.PUBLIC.CUSTOMERS' does not exist.", &subjects()),
            ErrorKind::Other
        );
    }

    #[test]
    fn grant_state_messages_classify() {
        assert_eq!(
            classify("Privilege USAGE already granted to role ANALYST", &pii_mask()),
            ErrorKind::AlreadyGranted
        );
        assert_eq!(
            classify("Grant does not exist for role ANALYST", &pii_mask()),
            ErrorKind::AlreadyRevoked
        );
        assert_eq!(
            classify("USAGE is not granted to role ANALYST", &pii_mask()),
            ErrorKind::AlreadyRevoked
        );
    }

    #[test]
    fn unknown_messages_are_other() {
        assert_eq!(
            classify("SQL execution error: Warehouse 'MAIN' is suspended.", &pii_mask()),
            ErrorKind::Other
        );
        assert_eq!(
            RemoteError::new("select 1", "Internal error").kind(&pii_mask()),
            ErrorKind::Other
        );
    }

    #[test]
    fn remote_error_display_has_statement_and_message() {
        let e = RemoteError::new("SHOW GRANTS ON WAREHOUSE \"wh\"", "nope").with_code("002003");
        assert_eq!(e.to_string(), r#""SHOW GRANTS ON WAREHOUSE \"wh\"" failed: nope"#);
        assert_eq!(e.code.as_deref(), Some("002003"));
    }
}
