//! REST client for the Asterisk REST Interface.
//!
//! A thin, Basic-Auth wrapper over the handful of ARI operations the
//! gateway needs. Every method checks the exact status the PBX
//! documents for the operation; anything else surfaces as
//! [`Error::UnexpectedResponse`] and is the caller's to log and skip.

use crate::{
    config::Config,
    error::{Error, Result},
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Client for the PBX REST interface.
#[derive(Clone, Debug)]
pub struct AriClient {
    http: Client,
    base: Url,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct BridgeCreated {
    id: String,
}

impl AriClient {
    /// Creates a client from the configured base URL and credentials.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            base: Url::parse(&config.ast_url)?,
            username: config.ast_user.clone(),
            password: config.ast_pass.clone(),
        })
    }

    fn post(&self, path: &str) -> Result<RequestBuilder> {
        let url = self.base.join(path)?;
        debug!("POST {}", url);
        Ok(self
            .http
            .post(url)
            .basic_auth(&self.username, Some(&self.password)))
    }

    async fn expect(
        request: RequestBuilder,
        endpoint: &'static str,
        status: StatusCode,
    ) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if response.status() != status {
            return Err(Error::UnexpectedResponse {
                endpoint,
                status: response.status(),
            });
        }
        Ok(response)
    }

    /// Answers a channel.
    pub async fn answer(&self, channel_id: &str) -> Result<()> {
        let request = self.post(&format!("ari/channels/{}/answer", channel_id))?;
        Self::expect(request, "answer", StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    /// Creates an External Media channel sending the call's µ-law audio
    /// to `external_host` over RTP/UDP, both directions.
    pub async fn external_media(
        &self,
        channel_id: &str,
        app: &str,
        external_host: &str,
    ) -> Result<()> {
        let request = self.post("ari/channels/externalMedia")?.query(&[
            ("channelId", channel_id),
            ("app", app),
            ("external_host", external_host),
            ("format", "ulaw"),
            ("encapsulation", "rtp"),
            ("transport", "udp"),
            ("connection_type", "client"),
            ("direction", "both"),
        ]);
        Self::expect(request, "externalMedia", StatusCode::OK).await?;
        Ok(())
    }

    /// Creates a mixing bridge, returning its id.
    pub async fn create_bridge(&self) -> Result<String> {
        let request = self.post("ari/bridges")?.query(&[("type", "mixing")]);
        let response = Self::expect(request, "bridges", StatusCode::OK).await?;
        let bridge: BridgeCreated = response.json().await?;
        Ok(bridge.id)
    }

    /// Adds a channel to a bridge.
    pub async fn add_channel(&self, bridge_id: &str, channel_id: &str) -> Result<()> {
        let request = self
            .post(&format!("ari/bridges/{}/addChannel", bridge_id))?
            .query(&[("channel", channel_id)]);
        Self::expect(request, "addChannel", StatusCode::NO_CONTENT).await?;
        Ok(())
    }

    /// Plays a PBX-side media resource (e.g. `sound:hello-world`) on a
    /// channel.
    pub async fn play(&self, channel_id: &str, media: &str) -> Result<()> {
        let request = self
            .post(&format!("ari/channels/{}/play", channel_id))?
            .query(&[("media", media)]);
        Self::expect(request, "play", StatusCode::CREATED).await?;
        Ok(())
    }

    /// Starts recording a bridge to a WAV file. Fails if a recording of
    /// that name already exists.
    pub async fn record(&self, bridge_id: &str, name: &str) -> Result<()> {
        let request = self
            .post(&format!("ari/bridges/{}/record", bridge_id))?
            .query(&[
                ("name", name),
                ("format", "wav"),
                ("maxDurationSeconds", "0"),
                ("maxSilenceSeconds", "0"),
                ("ifExists", "fail"),
                ("beep", "true"),
            ]);
        Self::expect(request, "record", StatusCode::CREATED).await?;
        Ok(())
    }
}
