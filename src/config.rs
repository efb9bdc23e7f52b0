use crate::constants::{
    SILENCE_FRAMES_THRESHOLD,
    SILENCE_RMS_THRESHOLD,
    SPEECH_FRAMES_THRESHOLD,
};
use std::{env, net::SocketAddr, time::Duration};
use tracing::warn;

/// Configuration for the gateway and its calls.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct Config {
    /// Hostname of the PBX.
    ///
    /// Defaults to `asterisk`.
    pub ast_host: String,
    /// Port of the PBX REST interface.
    ///
    /// Defaults to `8088`.
    pub ast_port: u16,
    /// Base URL of the PBX REST interface. Derived from
    /// [`ast_host`]/[`ast_port`] unless set explicitly.
    ///
    /// [`ast_host`]: Config::ast_host
    /// [`ast_port`]: Config::ast_port
    pub ast_url: String,
    /// Name of the Stasis application to register as.
    ///
    /// Defaults to `voicebot`.
    pub ast_app: String,
    /// REST/WebSocket username.
    ///
    /// Defaults to `ariuser`.
    pub ast_user: String,
    /// REST/WebSocket password.
    ///
    /// Defaults to `ariuser`.
    pub ast_pass: String,
    /// Local address per-call RTP endpoints bind to. Use port 0 to let
    /// the OS pick one per call.
    ///
    /// Defaults to `0.0.0.0:10000`.
    pub rtp_bind: SocketAddr,
    /// `host:port` under which the PBX can reach the RTP endpoint; this
    /// is what the External Media channel is pointed at.
    ///
    /// Defaults to `ari-handler:10000`.
    pub external_host: String,
    /// Whether to ask the PBX to record each bridged call to a WAV file.
    ///
    /// Defaults to `false`.
    pub record_calls: bool,
    /// Upper bound on any single recognizer, synthesizer or language
    /// model invocation. `None` waits forever.
    ///
    /// Defaults to 30 seconds.
    pub backend_timeout: Option<Duration>,
    /// RMS amplitude below which an inbound frame counts as silence.
    ///
    /// Defaults to [`SILENCE_RMS_THRESHOLD`].
    pub rms_threshold: f32,
    /// Consecutive speech frames which trigger barge-in.
    ///
    /// Defaults to [`SPEECH_FRAMES_THRESHOLD`].
    pub speech_frames_threshold: usize,
    /// Consecutive silence frames which close an utterance.
    ///
    /// Defaults to [`SILENCE_FRAMES_THRESHOLD`].
    pub silence_frames_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ast_host: "asterisk".into(),
            ast_port: 8088,
            ast_url: "http://asterisk:8088/".into(),
            ast_app: "voicebot".into(),
            ast_user: "ariuser".into(),
            ast_pass: "ariuser".into(),
            rtp_bind: ([0, 0, 0, 0], 10_000).into(),
            external_host: "ari-handler:10000".into(),
            record_calls: false,
            backend_timeout: Some(Duration::from_secs(30)),
            rms_threshold: SILENCE_RMS_THRESHOLD,
            speech_frames_threshold: SPEECH_FRAMES_THRESHOLD,
            silence_frames_threshold: SILENCE_FRAMES_THRESHOLD,
        }
    }
}

impl Config {
    /// Reads configuration from the environment, falling back to the
    /// defaults above for anything unset.
    ///
    /// Honored variables: `AST_HOST`, `AST_PORT`, `AST_URL`, `AST_APP`,
    /// `AST_USER`, `AST_PASS`, `MYNA_RTP_BIND`, `MYNA_EXTERNAL_HOST`.
    /// Unparseable values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("AST_HOST") {
            config.ast_host = host;
        }
        if let Ok(port) = env::var("AST_PORT") {
            match port.parse() {
                Ok(port) => config.ast_port = port,
                Err(_) => warn!("Ignoring unparseable AST_PORT {:?}.", port),
            }
        }
        config.ast_url = format!("http://{}:{}/", config.ast_host, config.ast_port);
        if let Ok(url) = env::var("AST_URL") {
            config.ast_url = url;
        }
        if let Ok(app) = env::var("AST_APP") {
            config.ast_app = app;
        }
        if let Ok(user) = env::var("AST_USER") {
            config.ast_user = user;
        }
        if let Ok(pass) = env::var("AST_PASS") {
            config.ast_pass = pass;
        }
        if let Ok(bind) = env::var("MYNA_RTP_BIND") {
            match bind.parse() {
                Ok(bind) => config.rtp_bind = bind,
                Err(_) => warn!("Ignoring unparseable MYNA_RTP_BIND {:?}.", bind),
            }
        }
        if let Ok(host) = env::var("MYNA_EXTERNAL_HOST") {
            config.external_host = host;
        }

        config
    }

    /// Sets the Stasis application name.
    #[must_use]
    pub fn ast_app(mut self, ast_app: String) -> Self {
        self.ast_app = ast_app;
        self
    }

    /// Sets the REST base URL.
    #[must_use]
    pub fn ast_url(mut self, ast_url: String) -> Self {
        self.ast_url = ast_url;
        self
    }

    /// Sets the REST/WebSocket credentials.
    #[must_use]
    pub fn credentials(mut self, user: String, pass: String) -> Self {
        self.ast_user = user;
        self.ast_pass = pass;
        self
    }

    /// Sets the local RTP bind address.
    #[must_use]
    pub fn rtp_bind(mut self, rtp_bind: SocketAddr) -> Self {
        self.rtp_bind = rtp_bind;
        self
    }

    /// Sets the externally reachable RTP address advertised to the PBX.
    #[must_use]
    pub fn external_host(mut self, external_host: String) -> Self {
        self.external_host = external_host;
        self
    }

    /// Enables or disables PBX-side call recording.
    #[must_use]
    pub fn record_calls(mut self, record_calls: bool) -> Self {
        self.record_calls = record_calls;
        self
    }

    /// Sets the backend invocation timeout.
    #[must_use]
    pub fn backend_timeout(mut self, backend_timeout: Option<Duration>) -> Self {
        self.backend_timeout = backend_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.ast_url, "http://asterisk:8088/");
        assert_eq!(config.ast_app, "voicebot");
        assert_eq!(config.rtp_bind.port(), 10_000);
        assert!(!config.record_calls);
    }

    #[test]
    fn setters_chain() {
        let config = Config::default()
            .ast_app("reception".into())
            .record_calls(true)
            .backend_timeout(None);
        assert_eq!(config.ast_app, "reception");
        assert!(config.record_calls);
        assert!(config.backend_timeout.is_none());
    }
}
