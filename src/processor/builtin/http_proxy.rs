//! HttpProxy processor: relays each message to an HTTP endpoint.
//!
//! The JSON form of the message is POSTed to `Url`. HTTP 200 acknowledges
//! the message; any other status or a transport failure rejects it.

use crate::config::{parse_options, ConfigError, ConfigResult, Options};
use crate::processor::{ProcessError, ProcessResult, Processor};
use crate::queue::Job;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct HttpProxyConfiguration {
    url: String,
    /// Request timeout in seconds, 0 disables the timeout
    #[serde(default)]
    timeout: i64,
}

#[derive(Debug, Default)]
pub struct HttpProxyProcessor {
    url: Option<reqwest::Url>,
    client: reqwest::Client,
}

impl HttpProxyProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Processor for HttpProxyProcessor {
    fn configure(&mut self, options: &Options) -> ConfigResult<()> {
        let configuration: HttpProxyConfiguration = parse_options("HttpProxy processor", options)?;
        if configuration.timeout < 0 {
            return Err(ConfigError::invalid_options(
                "HttpProxy processor",
                "Timeout should be >= 0",
            ));
        }
        let url = reqwest::Url::parse(&configuration.url).map_err(|e| {
            ConfigError::invalid_options("HttpProxy processor", format!("Url: {}", e))
        })?;

        let mut builder = reqwest::Client::builder();
        if configuration.timeout > 0 {
            builder = builder.timeout(Duration::from_secs(configuration.timeout as u64));
        }
        self.client = builder
            .build()
            .map_err(|e| ConfigError::invalid_options("HttpProxy processor", e.to_string()))?;

        log::info!(
            "HttpProxy processor configured: url {}, timeout {}s",
            url,
            configuration.timeout
        );
        self.url = Some(url);
        Ok(())
    }

    async fn process(&self, job: &Job) -> ProcessResult<()> {
        let url = self
            .url
            .clone()
            .ok_or_else(|| ProcessError::failed("HttpProxy", "processor used before configure"))?;

        let payload = match job.message().to_json() {
            Ok(payload) => payload,
            Err(e) => {
                log::error!("HttpProxy processor could not serialize message: {}", e);
                job.reject().await?;
                return Err(e.into());
            }
        };

        let delivered = match self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
        {
            Ok(response) if response.status() == reqwest::StatusCode::OK => true,
            Ok(response) => {
                log::debug!(
                    "HttpProxy processor got status {} for {}",
                    response.status(),
                    job.message().id()
                );
                false
            }
            Err(e) => {
                log::debug!("HttpProxy processor request failed: {}", e);
                false
            }
        };

        if delivered {
            job.ack().await?;
            log::debug!("HttpProxy processor acknowledged {}", job.message().id());
        } else {
            job.reject().await?;
            log::debug!("HttpProxy processor rejected {}", job.message().id());
        }
        Ok(())
    }
}

fn create() -> Box<dyn Processor> {
    Box::new(HttpProxyProcessor::new())
}

crate::register_processor!("HTTPProxy", create);
crate::register_processor!("HttpProxy", create);
