//! HTTP / WebSocket Command Surface on `EspHttpServer`.
//!
//! | Route   | Handler                                        |
//! |---------|------------------------------------------------|
//! | `/ws`   | WebSocket; clients receive pushed events       |
//! | `/*`    | GET; parsed and answered by [`api::respond`]   |
//!
//! Handlers run on the httpd task.  They never touch the service: commands
//! go through the [`CommandBus`] and status comes from its snapshot.

use std::sync::{Arc, Mutex};

use esp_idf_svc::http::Method;
use esp_idf_svc::http::server::ws::EspHttpWsDetachedSender;
use esp_idf_svc::http::server::{Configuration, EspHttpServer};
use esp_idf_svc::io::Write;
use esp_idf_svc::sys::EspError;
use esp_idf_svc::ws::FrameType;
use log::{debug, info, warn};

use crate::api;
use crate::app::bus::CommandBus;
use crate::app::events::FlagEvent;
use crate::app::ports::EventSink;
use crate::config::FlagConfig;

/// Most WebSocket clients kept at once; the oldest is dropped beyond this.
const MAX_WS_CLIENTS: usize = 4;

type Clients = Arc<Mutex<Vec<EspHttpWsDetachedSender>>>;

/// Keeps the server alive; dropping it stops httpd.
pub struct HttpApi {
    _server: EspHttpServer<'static>,
    clients: Clients,
}

impl HttpApi {
    pub fn start(config: &FlagConfig, bus: Arc<CommandBus>) -> anyhow::Result<Self> {
        let mut server = EspHttpServer::new(&Configuration {
            http_port: config.http_port,
            uri_match_wildcard: true,
            ..Default::default()
        })?;
        let clients: Clients = Arc::new(Mutex::new(Vec::new()));

        let ws_clients = clients.clone();
        server.ws_handler("/ws", move |ws| {
            if ws.is_new() {
                let sender = ws.create_detached_sender()?;
                if let Ok(mut list) = ws_clients.lock() {
                    if list.len() >= MAX_WS_CLIENTS {
                        list.remove(0);
                    }
                    list.push(sender);
                    info!("WS: client {} connected ({} total)", ws.session(), list.len());
                }
            } else if ws.is_closed() {
                debug!("WS: client {} closed", ws.session());
            } else {
                // Inbound frames carry nothing; drain them.
                let (_, len) = ws.recv(&mut [])?;
                let mut buf = vec![0u8; len];
                ws.recv(&mut buf)?;
            }
            Ok::<(), EspError>(())
        })?;

        let hostname = config.hostname.clone();
        let layout = config.leds;
        server.fn_handler("/*", Method::Get, move |req| {
            let response = api::respond(req.uri(), &bus, &hostname, &layout);
            let mut resp = req.into_response(
                response.status,
                None,
                &[
                    ("Content-Type", "application/json"),
                    ("Access-Control-Allow-Origin", "*"),
                ],
            )?;
            resp.write_all(response.body.as_bytes())?;
            Ok::<(), anyhow::Error>(())
        })?;

        info!("HTTP API listening on :{}", config.http_port);
        Ok(Self {
            _server: server,
            clients,
        })
    }

    /// Event sink that pushes to every connected WebSocket client.
    pub fn event_sink(&self) -> WsEventSink {
        WsEventSink {
            clients: self.clients.clone(),
        }
    }
}

/// Adapter that broadcasts [`FlagEvent`]s as JSON text frames.
pub struct WsEventSink {
    clients: Clients,
}

impl EventSink for WsEventSink {
    fn emit(&mut self, event: &FlagEvent) {
        let Some(json) = api::event_json(event) else {
            return;
        };
        let Ok(mut list) = self.clients.lock() else {
            warn!("WS: client list poisoned");
            return;
        };
        list.retain_mut(|sender| {
            if sender.is_closed() {
                return false;
            }
            match sender.send(FrameType::Text(false), json.as_bytes()) {
                Ok(()) => true,
                Err(e) => {
                    debug!("WS: dropping client: {}", e);
                    false
                }
            }
        });
    }
}
