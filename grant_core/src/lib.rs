//!
//! Grant reconciliation
//!
//! Provides everything needed to manage a declared access-control grant
//! against a warehouse that is only reachable through SQL statements:
//! encoding the grant's identity, building the grant/revoke/list
//! statements, running them idempotently, and rebuilding the observed
//! state from the warehouse's grant listings.
//!
//! ```
//! use grant_core::{kind, GrantEngine, GrantIdentity};
//!
//! let engine = GrantEngine::new(kind::MASKING_POLICY, Default::default());
//! let identity = GrantIdentity::new("pii_mask", "USAGE", false);
//! assert_eq!(identity.encode().unwrap(), "pii_mask|||USAGE|false");
//! # let _ = engine;
//! ```
#![deny(missing_docs)]

pub use config::{EngineConfig, GrantOptionPolicy};
pub use engine::{DeclaredGrant, GrantEngine};
pub use error::{GrantError, Result};
pub use grantee::{Grantee, GranteeSet};
pub use identity::GrantIdentity;
pub use kind::GrantKind;
pub use reconcile::{GrantState, ReadOutcome};
pub use remote::{Row, SqlConnection};

pub mod config;
pub mod engine;
pub mod error;
pub mod grantee;
pub mod identity;
pub mod kind;
pub mod logging;
pub mod reconcile;
pub mod remote;
pub mod statement;

#[macro_export]
/// Time the code inside the macro. Write the elapsed time to debug logs.
/// Derived from https://notes.iveselov.info/programming/time_it-a-case-study-in-rust-macros
macro_rules! log_runtime {
    ($context:expr, $($tt:tt)+) => {
        {
            $crate::logging::debug!("{}: starting", $context);
            let timer = std::time::Instant::now();
            let x =
            $(
                $tt
            )+;
            $crate::logging::debug!("{}: {:?}", $context, timer.elapsed());
            x
        }
    }
}
