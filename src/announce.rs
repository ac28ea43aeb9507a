//! Directory announce job.
//!
//! The flag registers itself with a directory service at boot and then
//! periodically, so dashboards can find its current address.  The job is
//! a [`SchedulerDelegate`]; a failed announce is logged and the next
//! period simply tries again.
//!
//! A directory POST can take seconds, far longer than a tick.  On the
//! device the job therefore runs on its own thread: the scheduler fires
//! an [`AnnounceTrigger`], which only raises a signal that the worker
//! spawned by [`spawn_announce_worker`] waits on.

use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread::JoinHandle;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::adapters::utils::encode_query_value;
use crate::app::ports::{AnnouncePort, ScheduleFiredKind, SchedulerDelegate};
use crate::config::FlagConfig;
use crate::drivers::task_pin::{Core, spawn_on_core};
use crate::error::AnnounceError;

/// Schedule label the job answers to.
pub const ANNOUNCE_LABEL: &str = "announce";

/// `<base>?name=<hostname>&link=http://<ip>:<port>`
pub fn announce_url(base: &str, hostname: &str, ip: Ipv4Addr, port: u16) -> String {
    let link = format!("http://{ip}:{port}");
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}name={}&link={}",
        encode_query_value(hostname),
        encode_query_value(&link)
    )
}

pub struct AnnounceJob<A> {
    announcer: A,
    base_url: String,
    hostname: String,
    advertised_port: u16,
    ip: Option<Ipv4Addr>,
}

impl<A: AnnouncePort> AnnounceJob<A> {
    pub fn new(announcer: A, config: &FlagConfig) -> Self {
        Self {
            announcer,
            base_url: config.announce_url.clone(),
            hostname: config.hostname.clone(),
            advertised_port: config.advertised_port,
            ip: None,
        }
    }

    /// Address to advertise.  `None` while the station has no lease.
    pub fn set_ip(&mut self, ip: Option<Ipv4Addr>) {
        self.ip = ip;
    }

    pub fn announce_now(&mut self) -> Result<u16, AnnounceError> {
        let ip = self.ip.ok_or(AnnounceError::Offline)?;
        let url = announce_url(&self.base_url, &self.hostname, ip, self.advertised_port);
        debug!("Announcing at {}", url);
        match self.announcer.announce(&url)? {
            status @ 200..=299 => Ok(status),
            status => Err(AnnounceError::Status(status)),
        }
    }
}

impl<A: AnnouncePort> SchedulerDelegate for AnnounceJob<A> {
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind) {
        if label != ANNOUNCE_LABEL {
            return;
        }
        match self.announce_now() {
            Ok(status) => info!("Directory announce ok ({:?}, HTTP {})", kind, status),
            Err(e) => warn!("Directory announce failed: {}", e),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Worker hand-off
// ───────────────────────────────────────────────────────────────

/// One pending announce: the address to advertise and why it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnounceRequest {
    pub ip: Option<Ipv4Addr>,
    pub kind: ScheduleFiredKind,
}

/// Latest-wins slot between the control loop and the announce worker.
pub type AnnounceLink = Signal<CriticalSectionRawMutex, AnnounceRequest>;

/// Scheduler-side half: turns a schedule fire into a signal.
pub struct AnnounceTrigger {
    link: Arc<AnnounceLink>,
    ip: Option<Ipv4Addr>,
}

impl AnnounceTrigger {
    pub fn new(link: Arc<AnnounceLink>) -> Self {
        Self { link, ip: None }
    }

    pub fn set_ip(&mut self, ip: Option<Ipv4Addr>) {
        self.ip = ip;
    }
}

impl SchedulerDelegate for AnnounceTrigger {
    fn on_schedule_fired(&mut self, label: &str, kind: ScheduleFiredKind) {
        if label != ANNOUNCE_LABEL {
            return;
        }
        if self.link.signaled() {
            debug!("Announce still pending, replacing it");
        }
        self.link.signal(AnnounceRequest { ip: self.ip, kind });
    }
}

/// Run `job` on a low-priority thread, one announce per signal.
pub fn spawn_announce_worker<A>(
    mut job: AnnounceJob<A>,
    link: Arc<AnnounceLink>,
) -> io::Result<JoinHandle<()>>
where
    A: AnnouncePort + Send + 'static,
{
    spawn_on_core(Core::Pro, 2, 8, "announce\0", move || {
        loop {
            let request = futures_lite::future::block_on(link.wait());
            job.set_ip(request.ip);
            job.on_schedule_fired(ANNOUNCE_LABEL, request.kind);
        }
    })
}
