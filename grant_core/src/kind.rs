//! Grantable object kinds.
//!
//! Each kind is an immutable capability descriptor. The engine is generic
//! over these, so adding a kind is adding a constant here.

/// How many name parts address an object of a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Qualification {
    /// `"name"`, taken from the identity's resource name.
    Bare,
    /// `"database"."schema"`.
    Database,
    /// `"database"."schema"."object"`.
    Schema,
}

/// Capabilities of one grantable object kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrantKind {
    /// Keyword used in statements, e.g. `MASKING POLICY`.
    pub keyword: &'static str,
    /// Plural keyword used by future grants, e.g. `TABLES`.
    pub plural_keyword: &'static str,
    /// How the target object is named.
    pub qualification: Qualification,
    /// Privileges that may be granted on this kind.
    pub valid_privileges: &'static [&'static str],
    /// Whether future grants exist for this kind.
    pub supports_future_grants: bool,
    /// Whether `WITH GRANT OPTION` is accepted.
    pub supports_grant_option: bool,
    /// Whether the kind can be granted to shares.
    pub supports_shares: bool,
}

impl GrantKind {
    /// Case-insensitive allow-list check.
    pub fn is_valid_privilege(&self, privilege: &str) -> bool {
        self.valid_privileges
            .iter()
            .any(|p| p.eq_ignore_ascii_case(privilege))
    }
}

/// Column masking policies.
pub const MASKING_POLICY: GrantKind = GrantKind {
    keyword: "MASKING POLICY",
    plural_keyword: "MASKING POLICIES",
    qualification: Qualification::Bare,
    valid_privileges: &["USAGE", "OWNERSHIP"],
    supports_future_grants: false,
    supports_grant_option: true,
    supports_shares: false,
};

/// Row access policies.
pub const ROW_ACCESS_POLICY: GrantKind = GrantKind {
    keyword: "ROW ACCESS POLICY",
    plural_keyword: "ROW ACCESS POLICIES",
    qualification: Qualification::Schema,
    valid_privileges: &["APPLY", "OWNERSHIP"],
    supports_future_grants: false,
    supports_grant_option: true,
    supports_shares: false,
};

/// Databases.
pub const DATABASE: GrantKind = GrantKind {
    keyword: "DATABASE",
    plural_keyword: "DATABASES",
    qualification: Qualification::Bare,
    valid_privileges: &[
        "USAGE",
        "OWNERSHIP",
        "MONITOR",
        "CREATE SCHEMA",
        "MODIFY",
        "REFERENCE_USAGE",
        "IMPORTED PRIVILEGES",
    ],
    supports_future_grants: false,
    supports_grant_option: true,
    supports_shares: true,
};

/// Schemas, and future grants on schemas in a database.
pub const SCHEMA: GrantKind = GrantKind {
    keyword: "SCHEMA",
    plural_keyword: "SCHEMAS",
    qualification: Qualification::Database,
    valid_privileges: &[
        "USAGE",
        "OWNERSHIP",
        "MONITOR",
        "MODIFY",
        "ADD SEARCH OPTIMIZATION",
        "CREATE TABLE",
        "CREATE VIEW",
        "CREATE STAGE",
        "CREATE FILE FORMAT",
        "CREATE SEQUENCE",
        "CREATE FUNCTION",
        "CREATE PIPE",
        "CREATE STREAM",
        "CREATE TASK",
        "CREATE PROCEDURE",
        "CREATE EXTERNAL TABLE",
        "CREATE MATERIALIZED VIEW",
        "CREATE MASKING POLICY",
        "CREATE ROW ACCESS POLICY",
        "CREATE TAG",
    ],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: true,
};

/// Tables, and future grants on tables.
pub const TABLE: GrantKind = GrantKind {
    keyword: "TABLE",
    plural_keyword: "TABLES",
    qualification: Qualification::Schema,
    valid_privileges: &[
        "SELECT",
        "INSERT",
        "UPDATE",
        "DELETE",
        "TRUNCATE",
        "REFERENCES",
        "REBUILD",
        "OWNERSHIP",
    ],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: true,
};

/// Views, and future grants on views.
pub const VIEW: GrantKind = GrantKind {
    keyword: "VIEW",
    plural_keyword: "VIEWS",
    qualification: Qualification::Schema,
    valid_privileges: &["SELECT", "REFERENCES", "OWNERSHIP"],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: true,
};

/// External tables.
pub const EXTERNAL_TABLE: GrantKind = GrantKind {
    keyword: "EXTERNAL TABLE",
    plural_keyword: "EXTERNAL TABLES",
    qualification: Qualification::Schema,
    valid_privileges: &["SELECT", "REFERENCES", "OWNERSHIP"],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: true,
};

/// Internal and external stages.
pub const STAGE: GrantKind = GrantKind {
    keyword: "STAGE",
    plural_keyword: "STAGES",
    qualification: Qualification::Schema,
    valid_privileges: &["USAGE", "READ", "WRITE", "OWNERSHIP"],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: false,
};

/// Streams.
pub const STREAM: GrantKind = GrantKind {
    keyword: "STREAM",
    plural_keyword: "STREAMS",
    qualification: Qualification::Schema,
    valid_privileges: &["SELECT", "OWNERSHIP"],
    supports_future_grants: true,
    supports_grant_option: true,
    supports_shares: false,
};

/// Virtual warehouses.
pub const WAREHOUSE: GrantKind = GrantKind {
    keyword: "WAREHOUSE",
    plural_keyword: "WAREHOUSES",
    qualification: Qualification::Bare,
    valid_privileges: &["USAGE", "OPERATE", "MONITOR", "MODIFY", "OWNERSHIP"],
    supports_future_grants: false,
    supports_grant_option: true,
    supports_shares: false,
};

/// Every kind the engine knows about.
pub const ALL: &[GrantKind] = &[
    MASKING_POLICY,
    ROW_ACCESS_POLICY,
    DATABASE,
    SCHEMA,
    TABLE,
    VIEW,
    EXTERNAL_TABLE,
    STAGE,
    STREAM,
    WAREHOUSE,
];

/// Look a kind up by keyword, ignoring case. Grant listings spell
/// multi-word kinds with underscores (`EXTERNAL_TABLE`); those match too.
pub fn by_keyword(keyword: &str) -> Option<GrantKind> {
    let keyword = keyword.trim().replace('_', " ");
    ALL.iter()
        .find(|k| k.keyword.eq_ignore_ascii_case(&keyword))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masking_policy_allows_usage_and_ownership() {
        assert!(MASKING_POLICY.is_valid_privilege("USAGE"));
        assert!(MASKING_POLICY.is_valid_privilege("ownership"));
        assert!(!MASKING_POLICY.is_valid_privilege("SELECT"));
    }

    #[test]
    fn keyword_lookup_ignores_case() {
        assert_eq!(by_keyword("masking policy"), Some(MASKING_POLICY));
        assert_eq!(by_keyword("EXTERNAL_TABLE"), Some(EXTERNAL_TABLE));
        assert_eq!(by_keyword("MASKING_POLICY"), Some(MASKING_POLICY));
        assert_eq!(by_keyword("NOPE"), None);
    }

    #[test]
    fn future_grant_kinds_live_in_schemas() {
        for kind in ALL.iter().filter(|k| k.supports_future_grants) {
            assert_ne!(kind.qualification, Qualification::Bare, "{}", kind.keyword);
        }
    }
}
