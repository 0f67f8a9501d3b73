pub mod push;
pub mod rest;

use url::Url;

/// Connection knobs shared by the REST side and the push channel.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Fixed delay between reconnect attempts on the push channel.
    pub retry_delay_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8000").expect("default url"),
            user_agent: "torview/0.1".to_string(),
            timeout_secs: 30,
            retry_delay_ms: 3000,
        }
    }
}
