use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Advertised service types and the source kind each one suggests.
const BROWSED: &[(&str, &str)] = &[("_smb._tcp.local.", "smb"), ("_sftp-ssh._tcp.local.", "ssh")];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiscoveredService {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub host: String,
    pub port: u16,
    pub addresses: Vec<String>,
}

/// Hosts seen on the LAN, keyed by (name, type).
#[derive(Clone, Default)]
pub struct DiscoveryManager {
    services: Arc<RwLock<Vec<DiscoveredService>>>,
}

impl DiscoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self) -> Vec<DiscoveredService> {
        self.services.read().clone()
    }

    /// Refreshes addresses of a known service or records a new one.
    pub fn merge(&self, service: DiscoveredService) {
        let mut services = self.services.write();
        match services
            .iter_mut()
            .find(|known| known.name == service.name && known.kind == service.kind)
        {
            Some(known) => known.addresses = service.addresses,
            None => {
                info!(
                    "Discovered {} service {} at {}:{}",
                    service.kind, service.name, service.host, service.port
                );
                services.push(service);
            }
        }
    }

    /// Spawns one browse loop per service type. The loops run for the life
    /// of the process.
    pub fn start(&self, browse: Duration, interval: Duration) {
        for (service_type, kind) in BROWSED {
            let manager = self.clone();
            let spawned = thread::Builder::new()
                .name(format!("mdns-{}", kind))
                .spawn(move || manager.browse_loop(service_type, kind, browse, interval));
            if let Err(err) = spawned {
                warn!("Failed to start {} discovery: {}", kind, err);
            }
        }
    }

    fn browse_loop(&self, service_type: &str, kind: &str, browse: Duration, interval: Duration) {
        loop {
            let daemon = match ServiceDaemon::new() {
                Ok(daemon) => daemon,
                Err(err) => {
                    warn!("mDNS daemon for {} unavailable: {}", kind, err);
                    thread::sleep(RETRY_DELAY);
                    continue;
                }
            };
            let receiver = match daemon.browse(service_type) {
                Ok(receiver) => receiver,
                Err(err) => {
                    warn!("mDNS browse for {} failed: {}", service_type, err);
                    let _ = daemon.shutdown();
                    thread::sleep(RETRY_DELAY);
                    continue;
                }
            };

            let deadline = Instant::now() + browse;
            loop {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                match receiver.recv_timeout(deadline - now) {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        self.merge(service_from_info(&info, kind));
                    }
                    Ok(other) => debug!("mDNS event: {:?}", other),
                    Err(_) => break,
                }
            }

            let _ = daemon.stop_browse(service_type);
            let _ = daemon.shutdown();
            thread::sleep(interval);
        }
    }
}

fn service_from_info(info: &ServiceInfo, kind: &str) -> DiscoveredService {
    let fullname = info.get_fullname();
    let instance = fullname
        .strip_suffix(info.get_type())
        .map(|name| name.trim_end_matches('.'))
        .unwrap_or(fullname);
    let mut addresses: Vec<String> = info.get_addresses().iter().map(|addr| addr.to_string()).collect();
    addresses.sort();
    DiscoveredService {
        name: decode_service_name(instance),
        kind: kind.to_string(),
        host: info.get_hostname().trim_end_matches('.').to_string(),
        port: info.get_port(),
        addresses,
    }
}

/// Undoes DNS-SD label escaping: `\ ` is a space and `\DDD` a raw byte,
/// with the byte sequence read back as UTF-8.
pub fn decode_service_name(raw: &str) -> String {
    let raw = raw.replace("\\ ", " ");
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(u8::is_ascii_digit) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, digit| acc * 10 + u32::from(digit - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, kind: &str, addr: &str) -> DiscoveredService {
        DiscoveredService {
            name: name.to_string(),
            kind: kind.to_string(),
            host: "nas.local".to_string(),
            port: 445,
            addresses: vec![addr.to_string()],
        }
    }

    #[test]
    fn decodes_escaped_names() {
        assert_eq!(
            decode_service_name("Living\\032Room\\226\\128\\153s\\032Music"),
            "Living Room\u{2019}s Music"
        );
        assert_eq!(decode_service_name("My\\ NAS"), "My NAS");
        assert_eq!(decode_service_name("plain"), "plain");
    }

    #[test]
    fn leaves_short_or_oversized_escapes() {
        assert_eq!(decode_service_name("end\\03"), "end\\03");
        assert_eq!(decode_service_name("big\\999"), "big\\999");
    }

    #[test]
    fn merge_replaces_addresses_by_name_and_type() {
        let manager = DiscoveryManager::new();
        manager.merge(service("NAS", "smb", "10.0.0.2"));
        manager.merge(service("NAS", "ssh", "10.0.0.2"));
        manager.merge(service("NAS", "smb", "10.0.0.9"));

        let services = manager.services();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].addresses, vec!["10.0.0.9".to_string()]);
        assert_eq!(services[1].kind, "ssh");
    }

    #[test]
    fn services_returns_a_copy() {
        let manager = DiscoveryManager::new();
        manager.merge(service("NAS", "smb", "10.0.0.2"));
        let mut copy = manager.services();
        copy.clear();
        assert_eq!(manager.services().len(), 1);
    }
}
