//! Rest API interface for Snowflake
//!

use crate::{consts, creds::SnowflakeCredentials};

use anyhow::{Context, Result};
use jsonwebtoken::{encode, get_current_timestamp, Algorithm, EncodingKey, Header};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{Deserialize, Serialize};

use grant_core::logging::debug;
use grant_core::remote::RemoteError;

/// Claims for use with the `jsonwebtoken` crate when
/// creating a new JWT.
#[derive(Debug, Serialize, Deserialize)]
struct JwtClaims {
    /// Required (validate_exp defaults to true in validation). Expiration time (as UTC timestamp)
    exp: usize,
    /// Optional. Issued at (as UTC timestamp)
    iat: usize,
    /// Optional. Issuer
    iss: String,
    /// Optional. Subject (whom token refers to)
    sub: String,
}

/// Transport settings for the Snowflake connection.
#[derive(Debug, Clone)]
pub struct SnowflakeRestConfig {
    /// Retry transient HTTP failures (timeouts, 5xx) with exponential
    /// backoff. Statement errors are never retried.
    pub retry: bool,
    /// Sign requests with a key-pair JWT. Only turned off against mock
    /// servers.
    #[doc(hidden)]
    pub use_jwt: bool,
}

impl Default for SnowflakeRestConfig {
    fn default() -> Self {
        Self {
            retry: false,
            use_jwt: true,
        }
    }
}

/// Body of a statement request.
#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    timeout: u64,
    warehouse: &'a str,
    role: &'a str,
}

/// Body Snowflake returns when a statement fails.
#[derive(Debug, Default, Deserialize)]
struct StatementErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default, rename = "sqlState")]
    sql_state: Option<String>,
}

/// Wrapper struct for http functionality
pub(crate) struct SnowflakeRestClient {
    /// The credentials used to authenticate into Snowflake.
    credentials: SnowflakeCredentials,
    config: SnowflakeRestConfig,
    http_client: ClientWithMiddleware,
}

impl SnowflakeRestClient {
    pub(crate) fn new(
        credentials: SnowflakeCredentials,
        config: SnowflakeRestConfig,
    ) -> Result<Self> {
        credentials.validate()?;
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let mut client_builder = ClientBuilder::new(reqwest::Client::new());
        if config.retry {
            client_builder =
                client_builder.with(RetryTransientMiddleware::new_with_policy(retry_policy))
        }
        let client = client_builder.build();
        Ok(Self {
            credentials,
            config,
            http_client: client,
        })
    }

    /// Run a statement and return the raw response body.
    ///
    /// Transport failures and non-success responses both come back as a
    /// [`RemoteError`] for `sql`. When Snowflake sent an error body, its
    /// message, code and SQL state are carried over.
    pub(crate) async fn query(&self, sql: &str) -> std::result::Result<String, RemoteError> {
        let request = self
            .get_request(sql)
            .map_err(|e| RemoteError::new(sql, format!("failed to build request: {e:#}")))?;

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::new(sql, format!("couldn't send request: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RemoteError::new(sql, format!("couldn't get body text: {e}")))?;
        debug!("status for statement {:?}: {:?}", sql, status);

        if status.is_success() {
            Ok(body)
        } else {
            Err(decode_error(sql, status, &body))
        }
    }

    /// If the URL is explicitly defined, that's used first.
    /// Otherwise, the standard account configuration
    /// is used
    fn get_url(&self) -> String {
        self.credentials.url.to_owned().unwrap_or_else(|| {
            format![
                "https://{}.snowflakecomputing.com{}",
                self.credentials.account,
                consts::STATEMENTS_PATH
            ]
        })
    }

    fn get_request(&self, sql: &str) -> Result<RequestBuilder> {
        let body = StatementRequest {
            statement: sql,
            timeout: consts::STATEMENT_TIMEOUT_SECS,
            warehouse: &self.credentials.warehouse,
            role: &self.credentials.role,
        };

        let mut request = self
            .http_client
            .post(self.get_url())
            .json(&body)
            .header(consts::CONTENT_TYPE_HEADER, "application/json")
            .header(consts::ACCEPT_HEADER, "application/json")
            .header(consts::USER_AGENT_HEADER, consts::USER_AGENT);
        if self.config.use_jwt {
            let token = self.get_jwt().context("failed to sign request")?;
            request = request
                .header(consts::AUTH_HEADER, format!["Bearer {}", token])
                .header(consts::SNOWFLAKE_AUTH_HEADER, "KEYPAIR_JWT");
        }
        Ok(request)
    }

    /// Get the role the connection runs statements as.
    pub(crate) fn get_snowflake_role(&self) -> &str {
        &self.credentials.role
    }

    fn get_jwt(&self) -> Result<String> {
        #[cfg(not(test))]
        {
            let qualified_username = format![
                "{}.{}",
                self.credentials.account.to_uppercase(),
                self.credentials.user.to_uppercase()
            ];

            // Generate jwt
            let claims = JwtClaims {
                exp: (get_current_timestamp() + 3600) as usize,
                iat: get_current_timestamp() as usize,
                iss: format!["{}.{}", qualified_username, self.credentials.public_key_fp],
                sub: qualified_username,
            };

            encode(
                &Header::new(Algorithm::RS256),
                &claims,
                &EncodingKey::from_rsa_pem(
                    self.credentials
                        .private_key
                        .replace(' ', "")
                        .replace("ENDPRIVATEKEY", "END PRIVATE KEY")
                        .replace("BEGINPRIVATEKEY", "BEGIN PRIVATE KEY")
                        .as_bytes(),
                )?,
            )
            .map_err(anyhow::Error::from)
        }
        #[cfg(test)]
        Ok("FAKE_JWT".to_owned())
    }
}

/// Turn a failed response into a [`RemoteError`], keeping Snowflake's own
/// message when the body has one.
fn decode_error(sql: &str, status: reqwest::StatusCode, body: &str) -> RemoteError {
    let parsed = serde_json::from_str::<StatementErrorBody>(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        format!("{status}: {body}")
    } else {
        parsed.message
    };

    let mut error = RemoteError::new(sql, message);
    if let Some(code) = parsed.code {
        error = error.with_code(code);
    }
    if let Some(sql_state) = parsed.sql_state {
        error = error.with_sql_state(sql_state);
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockGuard, MockServer, ResponseTemplate};

    pub struct WiremockServer {
        pub server: Option<MockServer>,
    }

    impl WiremockServer {
        pub fn new() -> Self {
            Self { server: None }
        }

        pub async fn init(&mut self) {
            let mock_server = MockServer::start().await;
            self.server = Some(mock_server);
        }

        fn creds(&self) -> SnowflakeCredentials {
            SnowflakeCredentials {
                url: Some(format!(
                    "{}{}",
                    self.server.as_ref().unwrap().uri(),
                    consts::STATEMENTS_PATH
                )),
                ..account_creds()
            }
        }
    }

    fn account_creds() -> SnowflakeCredentials {
        SnowflakeCredentials {
            account: "my_account".to_owned(),
            role: "role".to_owned(),
            user: "user".to_owned(),
            warehouse: "warehouse".to_owned(),
            private_key: "private_key".to_owned(),
            public_key_fp: "fp".to_owned(),
            url: None,
        }
    }

    async fn mount_default_guard(server: &WiremockServer) -> MockGuard {
        Mock::given(method("POST"))
            .and(path(consts::STATEMENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"text": "wiremock"}"#))
            .named("statement succeeds")
            .mount_as_scoped(server.server.as_ref().unwrap())
            .await
    }

    #[test]
    #[should_panic]
    fn empty_creds_fails_to_load() {
        SnowflakeRestClient::new(
            SnowflakeCredentials::default(),
            SnowflakeRestConfig::default(),
        )
        .unwrap();
    }

    #[test]
    fn default_config_signs_without_retries() {
        let config = SnowflakeRestConfig::default();
        assert!(config.use_jwt);
        assert!(!config.retry);
    }

    #[tokio::test]
    async fn unsigned_request_has_no_auth_headers() {
        let mut server = WiremockServer::new();
        server.init().await;
        let _guard = Mock::given(method("POST"))
            .and(path(consts::STATEMENTS_PATH))
            .and(header(consts::AUTH_HEADER, "Bearer FAKE_JWT"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(0)
            .named("signed statement")
            .mount_as_scoped(server.server.as_ref().unwrap())
            .await;
        let _fallback = mount_default_guard(&server).await;

        let client = SnowflakeRestClient::new(
            server.creds(),
            SnowflakeRestConfig {
                retry: false,
                use_jwt: false,
            },
        )
        .unwrap();
        client.query("select 1").await.unwrap();
    }

    #[test]
    fn default_url_uses_account() {
        let client =
            SnowflakeRestClient::new(account_creds(), SnowflakeRestConfig::default()).unwrap();
        assert_eq!(
            client.get_url(),
            "https://my_account.snowflakecomputing.com/api/v2/statements"
        );
    }

    #[tokio::test]
    async fn query_returns_body() {
        let mut server = WiremockServer::new();
        server.init().await;
        let _guard = mount_default_guard(&server).await;
        let client =
            SnowflakeRestClient::new(server.creds(), SnowflakeRestConfig::default()).unwrap();
        assert_eq!(client.query("select 1").await.unwrap(), r#"{"text": "wiremock"}"#);
    }

    #[tokio::test]
    async fn request_carries_statement_role_and_token() {
        let mut server = WiremockServer::new();
        server.init().await;
        let _guard = Mock::given(method("POST"))
            .and(path(consts::STATEMENTS_PATH))
            .and(header(consts::AUTH_HEADER, "Bearer FAKE_JWT"))
            .and(body_partial_json(serde_json::json!({
                "statement": "SHOW GRANTS ON WAREHOUSE \"wh\"",
                "warehouse": "warehouse",
                "role": "role",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount_as_scoped(server.server.as_ref().unwrap())
            .await;

        let client =
            SnowflakeRestClient::new(server.creds(), SnowflakeRestConfig::default()).unwrap();
        client.query("SHOW GRANTS ON WAREHOUSE \"wh\"").await.unwrap();
    }

    #[tokio::test]
    async fn error_body_becomes_remote_error() {
        let mut server = WiremockServer::new();
        server.init().await;
        let _guard = Mock::given(method("POST"))
            .and(path(consts::STATEMENTS_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_string(
                r#"{"code": "002003", "sqlState": "02000", "message": "SQL compilation error:\nMasking policy 'PII_MASK' does not exist or not authorized.", "statementHandle": "abc"}"#,
            ))
            .named("422 compilation error")
            .mount_as_scoped(server.server.as_ref().unwrap())
            .await;

        let client =
            SnowflakeRestClient::new(server.creds(), SnowflakeRestConfig::default()).unwrap();
        let err = client
            .query("SHOW GRANTS ON MASKING POLICY \"pii_mask\"")
            .await
            .unwrap_err();
        assert_eq!(err.statement, "SHOW GRANTS ON MASKING POLICY \"pii_mask\"");
        assert_eq!(err.code.as_deref(), Some("002003"));
        assert_eq!(err.sql_state.as_deref(), Some("02000"));
        assert!(err.message.contains("does not exist"), "{}", err.message);
    }

    #[tokio::test]
    async fn server_error_without_body_keeps_status() {
        let mut server = WiremockServer::new();
        server.init().await;
        let _guard = Mock::given(method("POST"))
            .and(path(consts::STATEMENTS_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .named("500 server error")
            .mount_as_scoped(server.server.as_ref().unwrap())
            .await;

        let client =
            SnowflakeRestClient::new(server.creds(), SnowflakeRestConfig::default()).unwrap();
        let err = client.query("select 2").await.unwrap_err();
        assert!(err.message.contains("500"), "{}", err.message);
        assert!(err.message.contains("oops"), "{}", err.message);
        assert_eq!(err.code, None);
    }
}
