//! Snowflake connection
//!
//! A [`SqlConnection`] that runs statements through Snowflake's SQL REST
//! API, signing each request with a key-pair JWT.
//!
//! ```no_run
//! use grant_core::config::CredentialsMap;
//! use grant_snowflake::{SnowflakeConnection, SnowflakeRestConfig};
//!
//! let credentials = CredentialsMap::new();
//! let conn = SnowflakeConnection::new(&credentials, SnowflakeRestConfig::default());
//! ```
#![deny(missing_docs)]

mod consts;
mod creds;
mod rest;

pub use rest::SnowflakeRestConfig;

use std::iter::zip;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use grant_core::config::CredentialsMap;
use grant_core::logging::{debug, error};
use grant_core::remote::{RemoteError, Row, SqlConnection};

use creds::SnowflakeCredentials;
use rest::SnowflakeRestClient;

/// Runs grant statements against Snowflake.
pub struct SnowflakeConnection {
    rest_client: SnowflakeRestClient,
}

#[derive(Deserialize, Debug)]
struct SnowflakeField {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<SnowflakeField>,
    #[serde(default)]
    partition_info: Vec<JsonValue>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: ResultSetMetaData,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
}

impl SnowflakeConnection {
    /// Build a connection from a credentials block.
    pub fn new(credentials: &CredentialsMap, config: SnowflakeRestConfig) -> Result<Self> {
        let creds = SnowflakeCredentials::from_map(credentials)?;
        Ok(Self {
            rest_client: SnowflakeRestClient::new(creds, config)?,
        })
    }

    /// Check that the connection works.
    pub async fn check(&self) -> bool {
        match self.rest_client.query("SELECT 1").await {
            Err(e) => {
                error!(
                    "connection check as {} failed: {}",
                    self.rest_client.get_snowflake_role(),
                    e
                );
                false
            }
            Ok(_) => true,
        }
    }
}

/// Zip the column names with each data row. Column names are lowercased so
/// rows read the same whatever case Snowflake reports them in.
fn rows_from_body(statement: &str, body: &str) -> std::result::Result<Vec<Row>, RemoteError> {
    if body.is_empty() {
        return Ok(vec![]);
    }
    let response: StatementResponse = serde_json::from_str(body).map_err(|e| {
        RemoteError::new(statement, format!("failed to deserialize response: {e}"))
    })?;
    let meta = response.result_set_meta_data;
    if meta.partition_info.len() > 1 {
        return Err(RemoteError::new(
            statement,
            format!(
                "unexpected partitioned result ({} partitions)",
                meta.partition_info.len()
            ),
        ));
    }

    let fields: Vec<String> = meta.row_type.iter().map(|f| f.name.to_lowercase()).collect();
    Ok(response
        .data
        .into_iter()
        .map(|row| {
            zip(fields.iter().cloned(), row)
                .map(|(name, value)| (name, value.map_or(JsonValue::Null, JsonValue::String)))
                .collect()
        })
        .collect())
}

#[async_trait]
impl SqlConnection for SnowflakeConnection {
    async fn execute(&self, statement: &str) -> std::result::Result<(), RemoteError> {
        self.rest_client.query(statement).await?;
        Ok(())
    }

    async fn query(&self, statement: &str) -> std::result::Result<Vec<Row>, RemoteError> {
        let body = self.rest_client.query(statement).await?;
        let rows = rows_from_body(statement, &body)?;
        debug!("{} rows from {:?}", rows.len(), statement);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_zip_names_with_values() {
        let body = r#"{
            "resultSetMetaData": {
                "numRows": 1,
                "rowType": [{"name": "PRIVILEGE"}, {"name": "grantee_name"}, {"name": "granted_by"}],
                "partitionInfo": [{"rowCount": 1}]
            },
            "data": [["USAGE", "ANALYST", null]]
        }"#;
        let rows = rows_from_body("SHOW", body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["privilege"], JsonValue::String("USAGE".to_owned()));
        assert_eq!(rows[0]["grantee_name"], JsonValue::String("ANALYST".to_owned()));
        assert_eq!(rows[0]["granted_by"], JsonValue::Null);
    }

    #[test]
    fn empty_body_is_no_rows() {
        assert!(rows_from_body("GRANT", "").unwrap().is_empty());
    }

    #[test]
    fn statement_ack_has_no_rows() {
        let body = r#"{"code": "090001", "message": "Statement executed successfully.", "statementHandle": "abc"}"#;
        assert!(rows_from_body("GRANT", body).unwrap().is_empty());
    }

    #[test]
    fn partitioned_result_is_an_error() {
        let body = r#"{
            "resultSetMetaData": {"rowType": [], "partitionInfo": [{}, {}]},
            "data": []
        }"#;
        let err = rows_from_body("SHOW", body).unwrap_err();
        assert!(err.message.contains("partition"), "{}", err.message);
    }

    #[test]
    fn garbage_body_is_an_error() {
        assert!(rows_from_body("SHOW", "not json").is_err());
    }
}
