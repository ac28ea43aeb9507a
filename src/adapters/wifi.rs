//! Wi-Fi station-mode adapter.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `BlockingWifi<EspWifi>` from `esp-idf-svc`.
//! - **all other targets**: only credential validation is compiled.
//!
//! ## Reconnection policy
//!
//! The first connect blocks until the netif is up.  After that the
//! control loop calls [`WifiStation::ensure_connected`] periodically; it
//! never blocks and only kicks off a new association when the link is
//! down, so the tick cadence survives an access point outage.

use core::fmt;

use super::utils::is_printable_ascii;

#[cfg(target_os = "espidf")]
use std::net::Ipv4Addr;

#[cfg(target_os = "espidf")]
use esp_idf_svc::eventloop::EspSystemEventLoop;
#[cfg(target_os = "espidf")]
use esp_idf_svc::hal::modem::Modem;
#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::EspDefaultNvsPartition;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::EspError;
#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
#[cfg(target_os = "espidf")]
use log::{info, warn};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

// ───────────────────────────────────────────────────────────────
// Credentials
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl Credentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds
            .ssid
            .push_str(ssid)
            .map_err(|()| ConnectivityError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|()| ConnectivityError::InvalidPassword)?;
        Ok(creds)
    }

    /// Credentials baked in at build time through `BUILDFLAG_WIFI_SSID`
    /// and `BUILDFLAG_WIFI_PASSWORD`.
    pub fn from_build_env() -> Result<Self, ConnectivityError> {
        match option_env!("BUILDFLAG_WIFI_SSID") {
            None | Some("") => Err(ConnectivityError::NoCredentials),
            Some(ssid) => Self::new(ssid, option_env!("BUILDFLAG_WIFI_PASSWORD").unwrap_or("")),
        }
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    /// Open network when no password is set.
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Station
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct WifiStation {
    inner: BlockingWifi<EspWifi<'static>>,
    credentials: Credentials,
}

#[cfg(target_os = "espidf")]
impl WifiStation {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        credentials: Credentials,
    ) -> Result<Self, EspError> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let inner = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self { inner, credentials })
    }

    /// Configure, associate and wait for DHCP.  Blocks.
    pub fn connect(&mut self) -> Result<Ipv4Addr, ConnectivityError> {
        let auth_method = if self.credentials.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self.credentials.ssid.clone(),
            password: self.credentials.password.clone(),
            auth_method,
            ..Default::default()
        });

        info!("WiFi: connecting to '{}'", self.credentials.ssid());
        let result = self
            .inner
            .set_configuration(&config)
            .and_then(|()| self.inner.start())
            .and_then(|()| self.inner.connect())
            .and_then(|()| self.inner.wait_netif_up());
        if let Err(e) = result {
            warn!("WiFi: connection failed: {}", e);
            return Err(ConnectivityError::ConnectionFailed);
        }

        let ip = self.ip().ok_or(ConnectivityError::ConnectionFailed)?;
        info!("WiFi: connected, ip={}", ip);
        Ok(ip)
    }

    /// Station address while associated.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        if !self.inner.is_connected().unwrap_or(false) {
            return None;
        }
        let info = self.inner.wifi().sta_netif().get_ip_info().ok()?;
        let ip: Ipv4Addr = info.ip.into();
        (!ip.is_unspecified()).then_some(ip)
    }

    /// Non-blocking link check.  Starts a new association when down.
    pub fn ensure_connected(&mut self) -> Option<Ipv4Addr> {
        let ip = self.ip();
        if ip.is_none() {
            warn!("WiFi: link down, reassociating");
            if let Err(e) = self.inner.wifi_mut().connect() {
                warn!("WiFi: reconnect request failed: {}", e);
            }
        }
        ip
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ssid() {
        assert_eq!(Credentials::new("", "password123"), Err(ConnectivityError::InvalidSsid));
    }

    #[test]
    fn rejects_long_ssid() {
        let ssid = "x".repeat(33);
        assert_eq!(Credentials::new(&ssid, ""), Err(ConnectivityError::InvalidSsid));
    }

    #[test]
    fn rejects_short_password() {
        assert_eq!(
            Credentials::new("MyNet", "short"),
            Err(ConnectivityError::InvalidPassword)
        );
    }

    #[test]
    fn accepts_open_network() {
        let creds = Credentials::new("OpenCafe", "").unwrap();
        assert!(creds.is_open());
        assert_eq!(creds.ssid(), "OpenCafe");
    }

    #[test]
    fn accepts_valid_wpa2() {
        let creds = Credentials::new("HomeWiFi", "mysecret8").unwrap();
        assert!(!creds.is_open());
    }
}
