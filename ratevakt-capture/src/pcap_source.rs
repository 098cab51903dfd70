//! Live capture using the pcap crate.
//!
//! Opens the interface once at startup; failures here are fatal and are
//! surfaced to the caller before the pipeline starts.

use bytes::Bytes;
use pcap::{Active, Capture, Device, Linktype};
use tracing::{debug, info};

use crate::packet::{LinkKind, Packet};
use crate::source::{CaptureError, PacketSource};

// DLT values for bare IP frames (DLT_RAW differs between platforms).
const DLT_RAW: [i32; 4] = [12, 14, 101, 228];

/// Parameters for opening a live capture.
#[derive(Debug, Clone)]
pub struct PcapOptions {
    pub interface: String,
    pub snapshot_len: i32,
    pub promiscuous: bool,
    pub read_timeout_ms: i32,
    /// TCP/UDP port to restrict capture to; `0` captures everything.
    pub port: u16,
}

impl PcapOptions {
    /// BPF expression for the configured port, if any.
    pub fn bpf_filter(&self) -> Option<String> {
        (self.port != 0).then(|| format!("port {}", self.port))
    }
}

pub struct PcapSource {
    capture: Capture<Active>,
    link: LinkKind,
}

impl PcapSource {
    pub fn open(options: &PcapOptions) -> Result<Self, CaptureError> {
        let device = Device::list()?
            .into_iter()
            .find(|d| d.name == options.interface)
            .ok_or_else(|| CaptureError::DeviceNotFound(options.interface.clone()))?;

        let mut capture = Capture::from_device(device)?
            .promisc(options.promiscuous)
            .snaplen(options.snapshot_len)
            .timeout(options.read_timeout_ms)
            .open()?;

        match options.bpf_filter() {
            Some(filter) => {
                capture
                    .filter(&filter, true)
                    .map_err(|e| CaptureError::Filter {
                        filter: filter.clone(),
                        reason: e.to_string(),
                    })?;
                info!("Applied BPF filter {filter:?}");
            }
            None => info!("No BPF filter applied, capturing all traffic"),
        }

        let link = link_kind(capture.get_datalink());
        debug!(
            "Opened capture on {} with link type {:?}",
            options.interface, link
        );

        Ok(Self { capture, link })
    }
}

impl PacketSource for PcapSource {
    fn next_packet(&mut self) -> Result<Option<Packet>, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(Packet::new(
                Bytes::copy_from_slice(packet.data),
                self.link,
            ))),
            Err(pcap::Error::TimeoutExpired) => Err(CaptureError::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn link_kind(link: Linktype) -> LinkKind {
    match link.0 {
        1 => LinkKind::Ethernet,
        dlt if DLT_RAW.contains(&dlt) => LinkKind::RawIp,
        _ => LinkKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(port: u16) -> PcapOptions {
        PcapOptions {
            interface: "eth0".into(),
            snapshot_len: 1024,
            promiscuous: true,
            read_timeout_ms: 100,
            port,
        }
    }

    #[test]
    fn no_filter_for_port_zero() {
        assert_eq!(options(0).bpf_filter(), None);
    }

    #[test]
    fn port_filter_expression() {
        assert_eq!(options(8080).bpf_filter().as_deref(), Some("port 8080"));
    }

    #[test]
    fn maps_link_types() {
        assert_eq!(link_kind(Linktype(1)), LinkKind::Ethernet);
        assert_eq!(link_kind(Linktype(12)), LinkKind::RawIp);
        assert_eq!(link_kind(Linktype(228)), LinkKind::RawIp);
        assert_eq!(link_kind(Linktype(113)), LinkKind::Other);
    }

    #[test]
    fn missing_device_is_fatal() {
        let mut opts = options(0);
        opts.interface = "ratevakt-none0".into();
        match PcapSource::open(&opts) {
            Err(CaptureError::DeviceNotFound(name)) => assert_eq!(name, "ratevakt-none0"),
            // Device listing itself may be denied in sandboxed environments.
            Err(CaptureError::Pcap(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("opened a device that should not exist"),
        }
    }
}
