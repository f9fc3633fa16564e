/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! HTTP push sink: forwards messages to a LIS endpoint.
//!
//! Each message is POSTed as a JSON envelope
//! `{"consumer": <name>, "messages": [<message text>]}` with basic
//! authentication taken from the configured URL's userinfo. Credentials are
//! stripped from the request URL itself. Failed attempts retry with a fixed
//! delay; exhaustion surfaces as an error for the dispatcher to log.

use crate::traits::MessageSink;
use astmgate_core::{ConfigError, Message, SinkError};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// The JSON body sent to the LIS push endpoint.
#[derive(Debug, Serialize)]
struct PushEnvelope {
    consumer: String,
    messages: Vec<String>,
}

/// POSTs messages to a LIS URL with retry.
#[derive(Debug)]
pub struct HttpSink {
    client: Client,
    url: Url,
    username: String,
    password: Option<String>,
    consumer: String,
    retries: u32,
    delay: Duration,
}

impl HttpSink {
    /// Creates an HTTP sink from a credentialed URL.
    ///
    /// # Arguments
    /// * `url` - `http(s)://user:pass@host/path`; userinfo becomes basic auth
    /// * `consumer` - Consumer name carried in the push envelope
    /// * `retries` - Total delivery attempts per message (minimum 1)
    /// * `delay` - Fixed pause between attempts
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidUrl` if the URL does not parse or uses
    /// a scheme other than http/https.
    pub fn new(
        url: &str,
        consumer: impl Into<String>,
        retries: u32,
        delay: Duration,
    ) -> Result<Self, ConfigError> {
        let mut parsed =
            Url::parse(url).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "unsupported scheme: {}",
                parsed.scheme()
            )));
        }

        let username = parsed.username().to_string();
        let password = parsed.password().map(str::to_string);
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);

        Ok(Self {
            client: Client::new(),
            url: parsed,
            username,
            password,
            consumer: consumer.into(),
            retries: retries.max(1),
            delay,
        })
    }

    /// Returns the push URL with credentials removed.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Checks connectivity and credentials against the endpoint.
    ///
    /// # Errors
    /// Returns `SinkError` on transport failure or a non-2xx answer.
    pub async fn probe(&self) -> Result<(), SinkError> {
        let mut request = self.client.get(self.url.clone());
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, self.password.as_deref());
        }
        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }

    async fn post_once(&self, envelope: &PushEnvelope) -> Result<(), SinkError> {
        let mut request = self.client.post(self.url.clone()).json(envelope);
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, self.password.as_deref());
        }
        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl MessageSink for HttpSink {
    fn name(&self) -> &str {
        "lis-push"
    }

    async fn deliver(&self, message: &Message) -> Result<(), SinkError> {
        let envelope = PushEnvelope {
            consumer: self.consumer.clone(),
            messages: vec![String::from_utf8_lossy(&message.to_text()).into_owned()],
        };

        for attempt in 1..=self.retries {
            match self.post_once(&envelope).await {
                Ok(()) => {
                    debug!(attempt, consumer = %self.consumer, "message pushed");
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        attempt,
                        retries = self.retries,
                        %err,
                        "push attempt failed"
                    );
                    if attempt < self.retries {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        Err(SinkError::RetriesExhausted {
            attempts: self.retries,
        })
    }
}
