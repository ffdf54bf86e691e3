//! Session-scoped connection and client.
//!
//! Both are created on first use and shared for the rest of the session.
//! Dropping the session is the teardown; the connection needs no close.

use std::{sync::Arc, time::Duration};

use crate::client::{ClientSettings, TestClient};
use crate::config::{Config, Resolver};
use crate::databricks::{Connection, ConnectionSettings, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT};
use crate::error::ServiceResult;

pub struct Session {
    settings: ConnectionSettings,
    client_settings: ClientSettings,
    poll_interval: Duration,
    request_timeout: Duration,
    connection: Option<Arc<Connection>>,
    client: Option<TestClient>,
}

impl Session {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            client_settings: ClientSettings::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connection: None,
            client: None,
        }
    }

    /// Resolve connection settings and session options from `resolver` and `cfg`.
    pub fn from_sources(resolver: &Resolver, cfg: &Config) -> Self {
        let mut session = Self::new(resolver.connection_settings())
            .with_client_settings(ClientSettings::from_config(cfg));
        if let Some(interval) = cfg.get_secs("poll-interval-secs") {
            session.poll_interval = interval;
        }
        if let Some(timeout) = cfg.get_secs("request-timeout-secs") {
            session.request_timeout = timeout;
        }
        session
    }

    pub fn with_client_settings(mut self, settings: ClientSettings) -> Self {
        self.client_settings = settings;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn client_settings_mut(&mut self) -> &mut ClientSettings {
        &mut self.client_settings
    }

    /// The shared connection, created on first call.
    pub fn connection(&mut self) -> ServiceResult<Arc<Connection>> {
        if let Some(conn) = &self.connection {
            return Ok(Arc::clone(conn));
        }
        let conn = Arc::new(
            Connection::with_timeout(&self.settings, self.request_timeout)?
                .with_poll_interval(self.poll_interval),
        );
        self.connection = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// The shared test client, bound to [`Session::connection`].
    pub fn client(&mut self) -> ServiceResult<&mut TestClient> {
        let client = match self.client.take() {
            Some(client) => client,
            None => TestClient::new(self.connection()?).with_settings(self.client_settings.clone()),
        };
        Ok(self.client.insert(client))
    }
}
