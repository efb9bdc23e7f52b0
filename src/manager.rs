use crate::{
    backend::{LanguageModel, Recognizer, Synthesizer},
    call::Call,
    client::AriClient,
    config::Config,
    driver::MediaEndpoint,
    error::Result,
    events::{AriEvent, Channel},
    ws,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Handle to one running call's orchestrator task.
///
/// Dropping the handle cancels the task; its owned endpoint, playback
/// worker and child pipelines are released by the resulting drops.
#[derive(Debug)]
struct CallHandle {
    task: JoinHandle<()>,
}

impl Drop for CallHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// The control-plane adapter, responsible for managing [`Call`]s.
///
/// One instance serves the whole gateway: it consumes Stasis events,
/// performs the PBX-side setup for each accepted call (answer, External
/// Media channel, mixing bridge) and keeps the channel-id registry of
/// running orchestrators. Backends are shared immutably across calls.
///
/// [`Call`]: Call
pub struct Myna {
    calls: DashMap<String, CallHandle>,
    client: AriClient,
    config: Config,
    recognizer: Arc<dyn Recognizer>,
    synthesizer: Arc<dyn Synthesizer>,
    language_model: Arc<dyn LanguageModel>,
}

impl Myna {
    /// Creates an adapter over the given configuration and backends.
    pub fn new(
        config: Config,
        recognizer: Arc<dyn Recognizer>,
        synthesizer: Arc<dyn Synthesizer>,
        language_model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let client = AriClient::new(&config)?;

        Ok(Self {
            calls: DashMap::new(),
            client,
            config,
            recognizer,
            synthesizer,
            language_model,
        })
    }

    /// Number of calls currently being serviced.
    #[must_use]
    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Whether a call is registered for the given channel id.
    #[must_use]
    pub fn contains(&self, channel_id: &str) -> bool {
        self.calls.contains_key(channel_id)
    }

    /// Connects to the PBX event stream and services it until it fails.
    ///
    /// Per-call failures are contained inside [`process`]; only the loss
    /// of the event transport itself surfaces, and reconnection is the
    /// caller's policy.
    ///
    /// [`process`]: Myna::process
    pub async fn run(&self) -> Result<()> {
        let mut events = ws::connect(&self.config).await?;
        info!("Listening for calls.");

        loop {
            let event = events.recv().await?;
            self.process(&event).await;
        }
    }

    /// Handles one control-plane event.
    ///
    /// Unknown events are ignored; `StasisStart` and `StasisEnd` drive
    /// the call registry. This is the entry point for embedders running
    /// their own event loop.
    pub async fn process(&self, event: &AriEvent) {
        match event {
            AriEvent::StasisStart { channel, .. } => self.start_call(channel).await,
            AriEvent::StasisEnd { channel, .. } => self.end_call(&channel.id),
            _ => {},
        }
    }

    #[instrument(skip(self, channel), fields(channel = %channel.id))]
    async fn start_call(&self, channel: &Channel) {
        if channel.caller.number.is_empty() {
            info!("Ignoring call without a caller number.");
            return;
        }
        info!(
            "Incoming call from {} (state {:?}).",
            channel.caller.number, channel.state
        );

        if let Err(e) = self.client.answer(&channel.id).await {
            warn!("Failed to answer: {}", e);
            return;
        }

        // A fresh id for the External Media leg keeps it distinct from
        // anything the dialplan may have created.
        let external_id = Uuid::new_v4().to_string();
        if let Err(e) = self
            .client
            .external_media(&external_id, &self.config.ast_app, &self.config.external_host)
            .await
        {
            warn!("Failed to create External Media channel: {}", e);
            return;
        }

        let bridge_id = match self.client.create_bridge().await {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to create bridge: {}", e);
                return;
            },
        };
        if let Err(e) = self.client.add_channel(&bridge_id, &channel.id).await {
            warn!("Failed to bridge caller channel: {}", e);
            return;
        }
        if let Err(e) = self.client.add_channel(&bridge_id, &external_id).await {
            warn!("Failed to bridge External Media channel: {}", e);
            return;
        }

        if self.config.record_calls {
            let name = format!("recording_{}", channel.id);
            if let Err(e) = self.client.record(&bridge_id, &name).await {
                // Recording is best-effort; the call proceeds without it.
                warn!("Failed to start bridge recording: {}", e);
            }
        }

        let endpoint = match MediaEndpoint::bind(self.config.rtp_bind).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                error!("Failed to bind the RTP endpoint: {}", e);
                return;
            },
        };

        let call = Call::from_config(
            endpoint,
            Arc::clone(&self.recognizer),
            Arc::clone(&self.synthesizer),
            Arc::clone(&self.language_model),
            &self.config,
        );
        let task = tokio::spawn(call.run());

        self.calls.insert(channel.id.clone(), CallHandle { task });
        info!("Call registered ({} active).", self.calls.len());
    }

    fn end_call(&self, channel_id: &str) {
        if self.calls.remove(channel_id).is_some() {
            info!("Call on channel {} ended.", channel_id);
        }
    }

    /// Registers a dormant call so registry behaviour can be exercised
    /// without a PBX.
    #[cfg(test)]
    fn register_idle_call(&self, channel_id: &str) {
        let task = tokio::spawn(futures::future::pending());
        self.calls.insert(channel_id.to_owned(), CallHandle { task });
    }
}
