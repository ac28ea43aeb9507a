//! HTTPS client for the flag directory.
//!
//! Implements [`AnnouncePort`] on `EspHttpConnection`.  A fresh
//! connection is opened per announce; at one POST every few minutes
//! there is nothing worth keeping alive.

use core::time::Duration;

use embedded_svc::http::client::{Client as HttpClient, Method};
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use esp_idf_svc::sys::esp_crt_bundle_attach;
use log::{debug, warn};

use crate::app::ports::AnnouncePort;
use crate::error::AnnounceError;

const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Default)]
pub struct HttpAnnouncer;

impl HttpAnnouncer {
    pub fn new() -> Self {
        Self
    }

    fn connect() -> Result<HttpClient<EspHttpConnection>, AnnounceError> {
        let connection = EspHttpConnection::new(&HttpConfiguration {
            buffer_size: Some(1024),
            timeout: Some(ANNOUNCE_TIMEOUT),
            crt_bundle_attach: Some(esp_crt_bundle_attach),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("Directory: connection setup failed: {}", e);
            AnnounceError::Transport
        })?;
        Ok(HttpClient::wrap(connection))
    }
}

impl AnnouncePort for HttpAnnouncer {
    fn announce(&mut self, url: &str) -> Result<u16, AnnounceError> {
        let mut client = Self::connect()?;
        let headers = [("Content-Length", "0")];
        let request = client.request(Method::Post, url, &headers).map_err(|e| {
            warn!("Directory: request failed: {}", e);
            AnnounceError::Transport
        })?;
        let response = request.submit().map_err(|e| {
            warn!("Directory: submit failed: {}", e);
            AnnounceError::Transport
        })?;
        let status = response.status();
        debug!("Directory: HTTP {}", status);
        Ok(status)
    }
}
