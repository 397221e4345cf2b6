use reqwest::Client;
use std::time::Duration;
use anyhow::Result;
use tracing::info;

const USER_AGENT: &str = concat!("close_notice/", env!("CARGO_PKG_VERSION"));

pub struct HttpClientFactory;

impl HttpClientFactory {
    /// Client for the short request/response APIs (news provider, chat bot).
    pub fn create() -> Result<Client> {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Some(Duration::from_secs(30)));

        info!("🌐 [Http Client] standard client ready");

        let client = builder.build()?;
        Ok(client)
    }

    /// Client for model inference: longer total timeout, HTTP/1.1 only and
    /// no connection reuse between prompts.
    pub fn create_llm() -> Result<Client> {
        let builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(15))
            .http1_only()
            .pool_max_idle_per_host(0);

        let client = builder.build()?;
        Ok(client)
    }
}
