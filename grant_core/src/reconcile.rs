//! Rebuilding grant state from the remote system's grant listings.

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use crate::config::GrantOptionPolicy;
use crate::error::{GrantError, Result};
use crate::grantee::{Grantee, GranteeSet};
use crate::identity::GrantIdentity;
use crate::kind::{self, GrantKind};
use crate::logging::{debug, info};
use crate::remote::{ErrorKind, Row, SqlConnection};
use crate::statement::{GrantStatements, GrantTarget};

/// One row of `SHOW GRANTS ON ...` or `SHOW FUTURE GRANTS IN ...`.
///
/// Future-grant listings name two of the columns differently; both shapes
/// land here.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteGrantRow {
    /// When the grant was made.
    #[serde(default)]
    pub created_on: Option<String>,
    /// The granted privilege.
    pub privilege: String,
    /// Object kind, e.g. `MASKING POLICY` or `TABLE`.
    #[serde(alias = "grant_on")]
    pub granted_on: String,
    /// Fully qualified object name, as the remote prints it.
    #[serde(default)]
    pub name: String,
    /// Principal type: `ROLE`, `SHARE`, `USER`, ...
    #[serde(alias = "grant_to")]
    pub granted_to: String,
    /// The grantee.
    #[serde(deserialize_with = "strip_quotes_and_deserialize")]
    pub grantee_name: String,
    /// Whether the grantee may grant onward.
    #[serde(default, deserialize_with = "flag_and_deserialize")]
    pub grant_option: bool,
    /// The role that made the grant. Absent from future-grant listings.
    #[serde(default)]
    pub granted_by: Option<String>,
}

/// Some listings quote identifiers. We want them bare.
fn strip_quotes_and_deserialize<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Ok(s.trim_matches('"').to_owned())
}

/// Flags come back as JSON booleans or as `"true"`/`"false"` strings.
fn flag_and_deserialize<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match JsonValue::deserialize(deserializer)? {
        JsonValue::Bool(b) => Ok(b),
        JsonValue::String(s) => Ok(s.eq_ignore_ascii_case("true")),
        JsonValue::Null => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean flag, got {other}"
        ))),
    }
}

impl RemoteGrantRow {
    fn from_row(row: Row, statement: &str) -> Result<Self> {
        serde_json::from_value(JsonValue::Object(row)).map_err(|source| GrantError::RowDecode {
            statement: statement.to_owned(),
            source,
        })
    }

    /// Whether the row's printed name ends with `object`.
    fn names_object(&self, object: &str) -> bool {
        if self.name.is_empty() {
            return true;
        }
        let name = self.name.replace('"', "").to_ascii_lowercase();
        let object = object.to_ascii_lowercase();
        match name.strip_suffix(&object) {
            Some("") => true,
            Some(prefix) => prefix.ends_with('.'),
            None => false,
        }
    }
}

/// What a read observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantState {
    /// The identity that was read.
    pub identity: GrantIdentity,
    /// Effective grant option across the matching rows.
    pub grant_option: bool,
    /// Grantees currently holding the grant.
    pub grantees: GranteeSet,
}

impl GrantState {
    /// Nobody holds the grant anymore; the caller should drop it.
    pub fn is_absent(&self) -> bool {
        self.grantees.is_empty()
    }

    /// Compare what was observed with what was declared.
    pub fn drift(&self, declared: &GranteeSet) -> Drift {
        Drift {
            missing: declared
                .iter()
                .filter(|g| !self.grantees.contains(g))
                .cloned()
                .collect(),
            unexpected: self
                .grantees
                .iter()
                .filter(|g| !declared.contains(g))
                .cloned()
                .collect(),
        }
    }
}

/// Difference between declared and observed grantees.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Drift {
    /// Declared but not holding the grant.
    pub missing: GranteeSet,
    /// Holding the grant but not declared.
    pub unexpected: GranteeSet,
}

impl Drift {
    /// No drift.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// The result of a read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The target exists. The grantee set may be empty when the grant was
    /// revoked out of band.
    Present(GrantState),
    /// The target object itself is gone.
    Gone,
}

impl ReadOutcome {
    /// The observed state, or `None` when the caller should remove the
    /// grant (object gone or no grantees left).
    pub fn into_state(self) -> Option<GrantState> {
        match self {
            ReadOutcome::Present(state) if !state.is_absent() => Some(state),
            _ => None,
        }
    }

    /// Grantees currently holding the grant. Empty when gone.
    pub fn grantees(&self) -> GranteeSet {
        match self {
            ReadOutcome::Present(state) => state.grantees.clone(),
            ReadOutcome::Gone => GranteeSet::new(),
        }
    }
}

/// Lists a target's grants and folds them into a [`GrantState`].
pub(crate) struct Reconciler<'a> {
    pub(crate) kind: &'a GrantKind,
    pub(crate) policy: GrantOptionPolicy,
}

impl<'a> Reconciler<'a> {
    pub(crate) async fn read<C>(&self, conn: &C, identity: &GrantIdentity) -> Result<ReadOutcome>
    where
        C: SqlConnection + ?Sized,
    {
        let statements = GrantStatements::new(*self.kind, identity)?;
        let show = statements.show();
        debug!("listing grants: {show}");

        let rows = match conn.query(&show).await {
            Ok(rows) => rows,
            Err(e) if e.kind(&statements.subjects()) == ErrorKind::ObjectDoesNotExist => {
                info!("{} target of {show:?} is gone: {}", self.kind.keyword, e.message);
                return Ok(ReadOutcome::Gone);
            }
            Err(source) => {
                return Err(GrantError::Statement {
                    grantee: None,
                    source,
                })
            }
        };

        let rows = rows
            .into_iter()
            .map(|r| RemoteGrantRow::from_row(r, &show))
            .collect::<Result<Vec<_>>>()?;

        Ok(ReadOutcome::Present(self.fold(identity, statements.target(), rows)))
    }

    fn fold(
        &self,
        identity: &GrantIdentity,
        target: &GrantTarget,
        rows: Vec<RemoteGrantRow>,
    ) -> GrantState {
        let matching: Vec<_> = rows
            .into_iter()
            .filter(|r| r.privilege.eq_ignore_ascii_case(&identity.privilege))
            .filter(|r| match target {
                // Future listings cover every kind in the container.
                GrantTarget::Future { .. } => {
                    kind::by_keyword(&r.granted_on).as_ref() == Some(self.kind)
                }
                GrantTarget::Object { name } => {
                    name.last().map_or(true, |object| r.names_object(object))
                }
            })
            .filter_map(|r| match Grantee::from_listing(&r.granted_to, &r.grantee_name) {
                Some(grantee) => Some((grantee, r.grant_option)),
                None => {
                    debug!(
                        "skipping grant to unmanaged principal type {}: {}",
                        r.granted_to, r.grantee_name
                    );
                    None
                }
            })
            .collect();

        let grant_option = self
            .policy
            .effective(matching.iter().map(|(_, option)| *option));
        let grantees: GranteeSet = matching.into_iter().map(|(g, _)| g).collect();
        debug!(
            "{} grantees hold {} on {}",
            grantees.len(),
            identity.privilege,
            identity.resource_name
        );

        GrantState {
            identity: identity.clone(),
            grant_option,
            grantees,
        }
    }
}
