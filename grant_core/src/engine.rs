//! The generic grant engine: create, read and delete for any grant kind.
//!
//! The engine holds only immutable configuration. The connection is passed
//! into each call, and statements within one call are issued one after the
//! other. Callers must not run two operations on the same identity at once.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{GrantError, Result};
use crate::grantee::{Grantee, GranteeSet};
use crate::identity::GrantIdentity;
use crate::kind::GrantKind;
use crate::log_runtime;
use crate::logging::{debug, info, warn};
use crate::reconcile::{ReadOutcome, Reconciler};
use crate::remote::{ErrorKind, SqlConnection};
use crate::statement::GrantStatements;

/// A grant as declared by the user: what to grant, and to whom.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredGrant {
    /// The grant's identity.
    #[serde(flatten)]
    pub identity: GrantIdentity,
    /// Who should hold it.
    #[serde(default)]
    pub grantees: GranteeSet,
}

impl DeclaredGrant {
    /// Basic constructor
    pub fn new(identity: GrantIdentity, grantees: GranteeSet) -> Self {
        Self { identity, grantees }
    }
}

/// Create/read/delete for one grant kind.
#[derive(Clone, Debug)]
pub struct GrantEngine {
    kind: GrantKind,
    config: EngineConfig,
}

impl GrantEngine {
    /// Build an engine for `kind`.
    pub fn new(kind: GrantKind, config: EngineConfig) -> Self {
        Self { kind, config }
    }

    /// The kind this engine manages.
    pub fn kind(&self) -> &GrantKind {
        &self.kind
    }

    fn reconciler(&self) -> Reconciler<'_> {
        Reconciler {
            kind: &self.kind,
            policy: self.config.grant_option_policy,
        }
    }

    /// Check a declared grant against the kind's capabilities.
    pub fn validate(&self, declared: &DeclaredGrant) -> Result<GrantStatements> {
        let identity = &declared.identity;
        if !self.kind.is_valid_privilege(&identity.privilege) {
            return Err(GrantError::UnsupportedPrivilege {
                privilege: identity.privilege.to_owned(),
                kind: self.kind.keyword,
                valid: self.kind.valid_privileges,
            });
        }
        if identity.grant_option && !self.kind.supports_grant_option {
            return Err(GrantError::UnsupportedGrantOption {
                kind: self.kind.keyword,
                grantee: None,
            });
        }

        let statements = GrantStatements::new(self.kind, identity)?;
        let shares_allowed = self.kind.supports_shares && !statements.target().is_future();
        if let Some(share) = declared
            .grantees
            .iter()
            .find(|g| matches!(g, Grantee::Share(_)))
        {
            if !shares_allowed {
                return Err(GrantError::UnsupportedGrantee {
                    kind: self.kind.keyword,
                    grantee: share.clone(),
                });
            }
            // Shares can't re-grant, so the flag would never read back.
            if identity.grant_option {
                return Err(GrantError::UnsupportedGrantOption {
                    kind: self.kind.keyword,
                    grantee: Some(share.clone()),
                });
            }
        }
        Ok(statements)
    }

    /// Grant the privilege to every declared grantee, then read back.
    ///
    /// Returns the external ID and the observed state. Grantees are granted
    /// in sorted order and the first failure stops the rest; grants already
    /// made stay in place. Grantees that already hold the privilege are fine,
    /// so re-running after a partial failure picks up where it stopped.
    pub async fn create<C>(&self, conn: &C, declared: &DeclaredGrant) -> Result<(String, ReadOutcome)>
    where
        C: SqlConnection + ?Sized,
    {
        let statements = self.validate(declared)?;
        let identity = &declared.identity;
        // Encode up front so a bad identity never reaches the remote.
        let id = identity.encode()?;
        let subjects = statements.subjects();

        log_runtime!(format!("granting {id}"), {
            for grantee in &declared.grantees {
                let grant = statements.grant(&identity.privilege, grantee, identity.grant_option);
                debug!("running {grant}");
                match conn.execute(&grant).await {
                    Ok(()) => (),
                    Err(e) if e.kind(&subjects) == ErrorKind::AlreadyGranted => {
                        debug!("{grantee} already holds {}: {}", identity.privilege, e.message)
                    }
                    Err(source) => {
                        return Err(GrantError::Statement {
                            grantee: Some(grantee.clone()),
                            source,
                        })
                    }
                }
            }
        });

        let outcome = self.reconciler().read(conn, identity).await?;
        match &outcome {
            ReadOutcome::Present(state) => {
                let drift = state.drift(&declared.grantees);
                if !drift.missing.is_empty() {
                    warn!(
                        "{id}: granted but not observed for {:?}",
                        drift.missing.iter().map(|g| g.to_string()).collect::<Vec<_>>()
                    );
                }
            }
            ReadOutcome::Gone => warn!("{id}: target disappeared right after granting"),
        }
        Ok((id, outcome))
    }

    /// Observe who holds the grant named by `id`.
    pub async fn read<C>(&self, conn: &C, id: &str) -> Result<ReadOutcome>
    where
        C: SqlConnection + ?Sized,
    {
        let identity = GrantIdentity::decode(id)?;
        self.reconciler().read(conn, &identity).await
    }

    /// Revoke the grant from everyone currently holding it.
    ///
    /// Grants that are already gone, and targets that no longer exist, count
    /// as revoked. Fails with [`GrantError::GrantsRemain`] if a revoked
    /// grantee still shows up afterwards.
    pub async fn delete<C>(&self, conn: &C, id: &str) -> Result<()>
    where
        C: SqlConnection + ?Sized,
    {
        let identity = GrantIdentity::decode(id)?;
        let statements = GrantStatements::new(self.kind, &identity)?;

        let holders = match self.reconciler().read(conn, &identity).await? {
            ReadOutcome::Gone => {
                info!("{id}: target is gone, nothing to revoke");
                return Ok(());
            }
            ReadOutcome::Present(state) => state.grantees,
        };

        let subjects = statements.subjects();
        let cascade = identity.grant_option || self.config.always_cascade;
        for grantee in &holders {
            let revoke = statements.revoke(&identity.privilege, grantee, cascade);
            debug!("running {revoke}");
            match conn.execute(&revoke).await {
                Ok(()) => (),
                Err(e)
                    if matches!(
                        e.kind(&subjects),
                        ErrorKind::AlreadyRevoked | ErrorKind::ObjectDoesNotExist
                    ) =>
                {
                    debug!("{grantee} no longer holds {}: {}", identity.privilege, e.message)
                }
                Err(source) => {
                    return Err(GrantError::Statement {
                        grantee: Some(grantee.clone()),
                        source,
                    })
                }
            }
        }

        let remaining: Vec<Grantee> = self
            .reconciler()
            .read(conn, &identity)
            .await?
            .grantees()
            .into_iter()
            .filter(|g| holders.contains(g))
            .collect();
        if !remaining.is_empty() {
            return Err(GrantError::GrantsRemain {
                id: id.to_owned(),
                remaining,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind;

    fn declared(kind_privilege: &str, grant_option: bool, grantees: GranteeSet) -> DeclaredGrant {
        DeclaredGrant::new(
            GrantIdentity::new("pii_mask", kind_privilege, grant_option),
            grantees,
        )
    }

    #[test]
    fn validate_rejects_privilege_outside_allow_list() {
        let engine = GrantEngine::new(kind::MASKING_POLICY, Default::default());
        let res = engine.validate(&declared("SELECT", false, GranteeSet::roles(["r"])));
        assert!(matches!(res, Err(GrantError::UnsupportedPrivilege { .. })));
    }

    #[test]
    fn validate_accepts_lowercase_privilege() {
        let engine = GrantEngine::new(kind::MASKING_POLICY, Default::default());
        assert!(engine
            .validate(&declared("usage", false, GranteeSet::roles(["r"])))
            .is_ok());
    }

    #[test]
    fn validate_rejects_shares_on_masking_policies() {
        let engine = GrantEngine::new(kind::MASKING_POLICY, Default::default());
        let grantees = [Grantee::Share("s".to_owned())].into_iter().collect();
        let res = engine.validate(&declared("USAGE", false, grantees));
        assert!(matches!(res, Err(GrantError::UnsupportedGrantee { .. })));
    }

    #[test]
    fn validate_rejects_shares_on_future_grants() {
        let engine = GrantEngine::new(kind::TABLE, Default::default());
        let grant = DeclaredGrant::new(
            GrantIdentity::new("db", "SELECT", false).with_schema("public"),
            [Grantee::Share("s".to_owned())].into_iter().collect(),
        );
        assert!(matches!(
            engine.validate(&grant),
            Err(GrantError::UnsupportedGrantee { .. })
        ));
    }

    #[test]
    fn validate_rejects_grant_option_for_shares() {
        let engine = GrantEngine::new(kind::TABLE, Default::default());
        let grant = DeclaredGrant::new(
            GrantIdentity::new("db", "SELECT", true)
                .with_schema("public")
                .with_object("orders"),
            [
                Grantee::Role("r".to_owned()),
                Grantee::Share("partner".to_owned()),
            ]
            .into_iter()
            .collect(),
        );
        match engine.validate(&grant) {
            Err(GrantError::UnsupportedGrantOption { grantee, .. }) => {
                assert_eq!(grantee, Some(Grantee::Share("partner".to_owned())))
            }
            other => panic!("expected UnsupportedGrantOption, got {other:?}"),
        }

        let roles_only = DeclaredGrant::new(grant.identity.clone(), GranteeSet::roles(["r"]));
        assert!(engine.validate(&roles_only).is_ok());
    }

    #[test]
    fn declared_grant_reads_from_json() {
        let grant: DeclaredGrant = serde_json::from_str(
            r#"{"resource_name": "pii_mask", "privilege": "USAGE", "grantees": [{"role": "a"}]}"#,
        )
        .unwrap();
        assert_eq!(grant, declared("USAGE", false, GranteeSet::roles(["a"])));
    }
}
