use std::time::Duration;

use super::error::{ParseError, ParseResult};

const DEFAULT_PUSH_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Runtime configuration describing how to reach a Parse server.
#[derive(Debug, Clone)]
pub struct ParseConfig {
    /// Server mount point, e.g. `https://host/parse`.
    pub server_url: String,
    /// Value of the `X-Parse-Application-Id` header.
    pub application_id: String,
    /// Value of the `X-Parse-REST-API-Key` header.
    pub rest_key: Option<String>,
    /// Session token of the signed-in player.
    pub session_token: Option<String>,
    /// Period of the REST polls standing in for live queries.
    pub push_poll_interval: Duration,
}

impl ParseConfig {
    /// Construct a configuration from explicit server URL and application id.
    pub fn new(server_url: impl Into<String>, application_id: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            application_id: application_id.into(),
            rest_key: None,
            session_token: None,
            push_poll_interval: DEFAULT_PUSH_POLL_INTERVAL,
        }
    }

    /// Attach a REST API key.
    pub fn with_rest_key(mut self, rest_key: impl Into<String>) -> Self {
        self.rest_key = Some(rest_key.into());
        self
    }

    /// Act on behalf of the user owning `token`.
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Override the push emulation period.
    pub fn with_push_poll_interval(mut self, interval: Duration) -> Self {
        self.push_poll_interval = interval;
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> ParseResult<Self> {
        let server_url = std::env::var("PARSE_SERVER_URL").map_err(|_| ParseError::MissingEnvVar {
            var: "PARSE_SERVER_URL",
        })?;
        let application_id = std::env::var("PARSE_APP_ID")
            .map_err(|_| ParseError::MissingEnvVar { var: "PARSE_APP_ID" })?;

        let mut config = Self::new(server_url, application_id);

        if let Ok(rest_key) = std::env::var("PARSE_REST_KEY") {
            config = config.with_rest_key(rest_key);
        }
        if let Ok(token) = std::env::var("PARSE_SESSION_TOKEN") {
            config = config.with_session_token(token);
        }
        if let Ok(raw) = std::env::var("PARSE_PUSH_POLL_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ParseError::InvalidEnvVar {
                    var: "PARSE_PUSH_POLL_MS",
                    value: raw.clone(),
                })?;
            config = config.with_push_poll_interval(Duration::from_millis(millis));
        }

        Ok(config)
    }
}
