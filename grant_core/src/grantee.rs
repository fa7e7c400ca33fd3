//! Grantees: the roles and shares a grant is given to.

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::statement::quote;

/// A principal that can receive a grant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    /// A role in the account.
    Role(String),
    /// A share, for exposing objects to consumer accounts.
    Share(String),
}

impl Grantee {
    /// Keyword used in statements for this grantee type.
    pub fn keyword(&self) -> &'static str {
        match self {
            Grantee::Role(_) => "ROLE",
            Grantee::Share(_) => "SHARE",
        }
    }

    /// The grantee name, unquoted.
    pub fn name(&self) -> &str {
        match self {
            Grantee::Role(n) | Grantee::Share(n) => n,
        }
    }

    /// Build a grantee from the `granted_to` column of a listing row.
    /// Returns `None` for principal types that can't be declared (users,
    /// applications, ...).
    pub(crate) fn from_listing(granted_to: &str, name: &str) -> Option<Self> {
        match granted_to.to_ascii_uppercase().as_str() {
            "ROLE" => Some(Grantee::Role(name.to_owned())),
            "SHARE" => Some(Grantee::Share(name.to_owned())),
            _ => None,
        }
    }
}

impl Display for Grantee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.keyword(), quote(self.name()))
    }
}

/// The set of grantees that should hold (or are observed holding) a grant.
///
/// Iteration is sorted, so statements are always issued in the same order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GranteeSet(BTreeSet<Grantee>);

impl GranteeSet {
    /// Empty set.
    pub fn new() -> Self {
        Default::default()
    }

    /// Build a set of roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        roles.into_iter().map(|r| Grantee::Role(r.into())).collect()
    }

    /// Add a grantee. Returns whether it was new.
    pub fn insert(&mut self, grantee: Grantee) -> bool {
        self.0.insert(grantee)
    }

    /// Whether the grantee is in the set.
    pub fn contains(&self, grantee: &Grantee) -> bool {
        self.0.contains(grantee)
    }

    /// Sorted iteration over the grantees.
    pub fn iter(&self) -> impl Iterator<Item = &Grantee> {
        self.0.iter()
    }

    /// Number of grantees.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nobody holds the grant.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Grantee> for GranteeSet {
    fn from_iter<T: IntoIterator<Item = Grantee>>(iter: T) -> Self {
        GranteeSet(iter.into_iter().collect())
    }
}

impl IntoIterator for GranteeSet {
    type Item = Grantee;
    type IntoIter = std::collections::btree_set::IntoIter<Grantee>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a GranteeSet {
    type Item = &'a Grantee;
    type IntoIter = std::collections::btree_set::Iter<'a, Grantee>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_iterates_in_sorted_order() {
        let set = GranteeSet::roles(["c", "a", "b"]);
        let names: Vec<_> = set.iter().map(Grantee::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicates_collapse() {
        let mut set = GranteeSet::roles(["a"]);
        assert!(!set.insert(Grantee::Role("a".to_owned())));
        assert!(set.insert(Grantee::Share("a".to_owned())));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn listing_principal_types_map_to_grantees() {
        assert_eq!(
            Grantee::from_listing("ROLE", "r"),
            Some(Grantee::Role("r".to_owned()))
        );
        assert_eq!(
            Grantee::from_listing("share", "acct.s"),
            Some(Grantee::Share("acct.s".to_owned()))
        );
        assert_eq!(Grantee::from_listing("USER", "bob"), None);
    }

    #[test]
    fn grantee_displays_as_statement_fragment() {
        assert_eq!(
            Grantee::Share("s".to_owned()).to_string(),
            "SHARE \"s\"".to_owned()
        );
    }
}
