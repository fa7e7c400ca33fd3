pub(crate) const AUTH_HEADER: &str = "Authorization";
pub(crate) const CONTENT_TYPE_HEADER: &str = "Content-Type";
pub(crate) const ACCEPT_HEADER: &str = "Accept";
pub(crate) const SNOWFLAKE_AUTH_HEADER: &str = "X-Snowflake-Authorization-Token-Type";
pub(crate) const USER_AGENT_HEADER: &str = "User-Agent";
pub(crate) const USER_AGENT: &str = "grant-engine";
/// Path of the SQL API statements endpoint.
pub(crate) const STATEMENTS_PATH: &str = "/api/v2/statements";
/// Seconds a statement may run before Snowflake cancels it.
pub(crate) const STATEMENT_TIMEOUT_SECS: u64 = 60;
