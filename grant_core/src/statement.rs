//! Statement building.
//!
//! Everything here is pure string building; nothing talks to the remote
//! system. Names are quoted but not otherwise sanitized, so they must come
//! from validated identifiers.

use crate::error::{GrantError, Result};
use crate::grantee::Grantee;
use crate::identity::GrantIdentity;
use crate::kind::{GrantKind, Qualification};
use crate::remote::Subject;

/// Wrap an identifier in double quotes.
pub fn quote(name: &str) -> String {
    format!("\"{name}\"")
}

fn qualified_name(parts: &[String]) -> String {
    parts
        .iter()
        .map(|p| quote(p))
        .collect::<Vec<_>>()
        .join(".")
}

/// What a grant statement points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrantTarget {
    /// A concrete, existing object.
    Object {
        /// Name parts, outermost first.
        name: Vec<String>,
    },
    /// Every object of the kind created later inside a container.
    Future {
        /// `DATABASE` or `SCHEMA`.
        container_keyword: &'static str,
        /// Container name parts, outermost first.
        container: Vec<String>,
    },
}

impl GrantTarget {
    /// Work out the target of an identity for a kind.
    ///
    /// An empty final name part means a future grant on kinds that live
    /// inside a database or schema.
    pub fn resolve(kind: &GrantKind, identity: &GrantIdentity) -> Result<Self> {
        let db = identity.resource_name.to_owned();
        let schema = identity.schema_name.to_owned();
        let object = identity.object_name.to_owned();

        let target = match kind.qualification {
            Qualification::Bare => GrantTarget::Object { name: vec![db] },
            Qualification::Database if schema.is_empty() => GrantTarget::Future {
                container_keyword: "DATABASE",
                container: vec![db],
            },
            Qualification::Database => GrantTarget::Object {
                name: vec![db, schema],
            },
            Qualification::Schema => match (schema.is_empty(), object.is_empty()) {
                (true, true) => GrantTarget::Future {
                    container_keyword: "DATABASE",
                    container: vec![db],
                },
                (false, true) => GrantTarget::Future {
                    container_keyword: "SCHEMA",
                    container: vec![db, schema],
                },
                (false, false) => GrantTarget::Object {
                    name: vec![db, schema, object],
                },
                (true, false) => {
                    return Err(GrantError::InvalidTarget {
                        kind: kind.keyword,
                        reason: format!("object {object:?} has no schema name"),
                    })
                }
            },
        };

        if target.is_future() && !kind.supports_future_grants {
            return Err(GrantError::UnsupportedFutureGrant(kind.keyword));
        }
        Ok(target)
    }

    /// Whether this is a future grant.
    pub fn is_future(&self) -> bool {
        matches!(self, GrantTarget::Future { .. })
    }
}

/// Builds the statements for one grant target.
#[derive(Clone, Debug)]
pub struct GrantStatements {
    kind: GrantKind,
    target: GrantTarget,
}

impl GrantStatements {
    /// Statements for the target named by `identity`.
    pub fn new(kind: GrantKind, identity: &GrantIdentity) -> Result<Self> {
        Ok(Self {
            target: GrantTarget::resolve(&kind, identity)?,
            kind,
        })
    }

    /// The resolved target.
    pub fn target(&self) -> &GrantTarget {
        &self.target
    }

    /// `ON ...` clause shared by grant and revoke.
    fn on_clause(&self) -> String {
        match &self.target {
            GrantTarget::Object { name } => {
                format!("ON {} {}", self.kind.keyword, qualified_name(name))
            }
            GrantTarget::Future {
                container_keyword,
                container,
            } => format!(
                "ON FUTURE {} IN {} {}",
                self.kind.plural_keyword,
                container_keyword,
                qualified_name(container)
            ),
        }
    }

    /// `GRANT <privilege> ON ... TO ROLE|SHARE "grantee" [WITH GRANT OPTION]`
    pub fn grant(&self, privilege: &str, grantee: &Grantee, grant_option: bool) -> String {
        let mut statement = format!("GRANT {privilege} {} TO {grantee}", self.on_clause());
        // Shares can't re-grant.
        if grant_option && matches!(grantee, Grantee::Role(_)) {
            statement.push_str(" WITH GRANT OPTION");
        }
        statement
    }

    /// `REVOKE <privilege> ON ... FROM ROLE|SHARE "grantee" [CASCADE]`
    ///
    /// `cascade` also drops whatever the grantee granted onward. It only
    /// applies to concrete objects.
    pub fn revoke(&self, privilege: &str, grantee: &Grantee, cascade: bool) -> String {
        let mut statement = format!("REVOKE {privilege} {} FROM {grantee}", self.on_clause());
        if cascade && !self.target.is_future() {
            statement.push_str(" CASCADE");
        }
        statement
    }

    /// What the statements depend on: the target itself (for concrete
    /// objects) and the database and schema containing it.
    pub fn subjects(&self) -> Vec<Subject> {
        let (parts, containers) = match &self.target {
            GrantTarget::Object { name } => (name, name.len().saturating_sub(1)),
            GrantTarget::Future { container, .. } => (container, container.len()),
        };

        let mut subjects = vec![];
        if !self.target.is_future() {
            subjects.push(Subject::new(self.kind.keyword, parts.clone()));
        }
        for n in 1..=containers {
            let keyword = if n == 1 { "DATABASE" } else { "SCHEMA" };
            subjects.push(Subject::new(keyword, parts[..n].to_vec()));
        }
        subjects
    }

    /// The listing statement used for reconciliation.
    pub fn show(&self) -> String {
        match &self.target {
            GrantTarget::Object { name } => {
                format!("SHOW GRANTS ON {} {}", self.kind.keyword, qualified_name(name))
            }
            GrantTarget::Future {
                container_keyword,
                container,
            } => format!(
                "SHOW FUTURE GRANTS IN {container_keyword} {}",
                qualified_name(container)
            ),
        }
    }
}
