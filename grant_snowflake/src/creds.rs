use anyhow::{anyhow, Result};
use serde::Deserialize;

use grant_core::config::CredentialsMap;

/// Credentials for authenticating to Snowflake with a key pair.
#[derive(Deserialize, Debug, Default, Clone)]
pub(crate) struct SnowflakeCredentials {
    pub(crate) account: String,
    pub(crate) role: String,
    pub(crate) user: String,
    pub(crate) warehouse: String,
    pub(crate) private_key: String,
    pub(crate) public_key_fp: String,
    pub(crate) url: Option<String>,
}

const REQUIRED_FIELDS: &[&str] = &[
    "account",
    "role",
    "user",
    "warehouse",
    "private_key",
    "public_key_fp",
    // "url" is optional; it defaults to the account URL.
];

impl SnowflakeCredentials {
    /// Pull the known fields out of a credentials block.
    pub(crate) fn from_map(credentials: &CredentialsMap) -> Result<Self> {
        let missing: Vec<_> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !credentials.contains_key(**f))
            .collect();
        if !missing.is_empty() {
            return Err(anyhow![
                "Snowflake config missing required fields: {:?}",
                missing
            ]);
        }

        let field = |k: &str| credentials.get(k).cloned().unwrap_or_default();
        let creds = SnowflakeCredentials {
            account: field("account"),
            role: field("role"),
            user: field("user"),
            warehouse: field("warehouse"),
            private_key: field("private_key"),
            public_key_fp: field("public_key_fp"),
            url: credentials.get("url").cloned(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Perform simple field validation to catch bad input.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.account.is_empty()
            || self.role.is_empty()
            || self.user.is_empty()
            || self.warehouse.is_empty()
            || self.private_key.is_empty()
            || self.public_key_fp.is_empty()
        {
            return Err(anyhow!(
                "Credentials are missing. Please make sure your credentials file is correct. Account: {:?}, user: {:?}, role: {:?}",
                self.account,
                self.user,
                self.role,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn full_map() -> CredentialsMap {
        CredentialsMap::from([
            ("account".to_owned(), "my_account".to_owned()),
            ("role".to_owned(), "role".to_owned()),
            ("user".to_owned(), "user".to_owned()),
            ("warehouse".to_owned(), "warehouse".to_owned()),
            ("private_key".to_owned(), "private_key".to_owned()),
            ("public_key_fp".to_owned(), "fp".to_owned()),
        ])
    }

    #[test]
    fn complete_map_loads() {
        let creds = SnowflakeCredentials::from_map(&full_map()).unwrap();
        assert_eq!(creds.account, "my_account");
        assert_eq!(creds.url, None);
    }

    #[test]
    fn missing_field_fails() {
        let mut map = full_map();
        map.remove("warehouse");
        let err = SnowflakeCredentials::from_map(&map).unwrap_err();
        assert!(err.to_string().contains("warehouse"), "{err}");
    }

    #[test]
    fn empty_field_fails() {
        let mut map = full_map();
        map.insert("user".to_owned(), String::new());
        assert!(SnowflakeCredentials::from_map(&map).is_err());
    }
}
