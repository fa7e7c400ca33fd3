//! Error types for grant operations

use thiserror::Error;

use crate::grantee::Grantee;
use crate::remote::RemoteError;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, GrantError>;

/// Everything that can make a grant operation fail.
///
/// Remote conditions that the engine can recover from locally (already
/// granted, already revoked, object gone) never surface here.
#[derive(Debug, Error)]
pub enum GrantError {
    /// The external ID could not be decoded. The stored state is corrupt.
    #[error("malformed grant id {id:?}: {reason}")]
    MalformedIdentity {
        /// The offending external ID.
        id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The identity cannot be encoded.
    #[error("unable to encode grant id: {0}")]
    Encoding(String),

    /// The privilege is not in the kind's allow-list.
    #[error("privilege {privilege:?} is not valid on {kind}; expected one of {valid:?}")]
    UnsupportedPrivilege {
        /// The declared privilege.
        privilege: String,
        /// Object kind keyword, e.g. `MASKING POLICY`.
        kind: &'static str,
        /// The kind's allow-list.
        valid: &'static [&'static str],
    },

    /// The grantee type is not accepted for this kind (shares, mostly).
    #[error("{kind} grants can't be given to {grantee}")]
    UnsupportedGrantee {
        /// Object kind keyword.
        kind: &'static str,
        /// The rejected grantee.
        grantee: Grantee,
    },

    /// `WITH GRANT OPTION` requested where it can't be given: on a kind
    /// that doesn't allow it, or together with a share grantee.
    #[error("{}", grant_option_message(.kind, .grantee))]
    UnsupportedGrantOption {
        /// Object kind keyword.
        kind: &'static str,
        /// The grantee that can't hold the grant option, if that's the reason.
        grantee: Option<Grantee>,
    },

    /// The identity doesn't name a target this kind can address.
    #[error("invalid {kind} target: {reason}")]
    InvalidTarget {
        /// Object kind keyword.
        kind: &'static str,
        /// What is missing.
        reason: String,
    },

    /// A future grant was requested for a kind without future grants.
    #[error("{0} doesn't support future grants")]
    UnsupportedFutureGrant(&'static str),

    /// A statement failed in a way the engine doesn't know how to recover from.
    #[error("{}", statement_message(.grantee, .source))]
    Statement {
        /// The grantee the statement was issued for, when there was one.
        grantee: Option<Grantee>,
        /// The underlying remote failure, carrying the statement.
        #[source]
        source: RemoteError,
    },

    /// A listing row didn't have the expected shape.
    #[error("unable to decode grant row returned by {statement:?}")]
    RowDecode {
        /// The listing statement.
        statement: String,
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },

    /// Grantees still hold the grant after every revoke succeeded.
    #[error("grant {id:?} is still held by {remaining:?} after revoking")]
    GrantsRemain {
        /// External ID of the grant being deleted.
        id: String,
        /// Grantees observed after the revokes.
        remaining: Vec<Grantee>,
    },
}

fn statement_message(grantee: &Option<Grantee>, source: &RemoteError) -> String {
    match grantee {
        Some(g) => format!("statement for {g} failed: {source}"),
        None => format!("statement failed: {source}"),
    }
}

fn grant_option_message(kind: &str, grantee: &Option<Grantee>) -> String {
    match grantee {
        Some(g) => format!("{kind} grants to {g} can't carry the grant option"),
        None => format!("{kind} grants don't support the grant option"),
    }
}

impl GrantError {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        GrantError::MalformedIdentity {
            id: id.to_owned(),
            reason: reason.into(),
        }
    }

    /// The grantee a failed statement was issued for, if any.
    pub fn grantee(&self) -> Option<&Grantee> {
        match self {
            GrantError::Statement { grantee, .. } => grantee.as_ref(),
            _ => None,
        }
    }
}
