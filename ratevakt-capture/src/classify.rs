//! Source classification.
//!
//! Only IPv4 source addresses key rate accounting. Anything else is ignored
//! silently; a miss is a classification outcome, not an error.

use std::net::Ipv4Addr;

use etherparse::{EtherType, Ethernet2HeaderSlice, Ipv4HeaderSlice, SingleVlanHeaderSlice};
use ratevakt_core::SourceId;

use crate::packet::{LinkKind, Packet};

pub fn classify(packet: &Packet) -> Option<SourceId> {
    let ip = match packet.link {
        LinkKind::Ethernet => ethernet_payload(&packet.data)?,
        LinkKind::RawIp => &packet.data[..],
        LinkKind::Other => return None,
    };
    ipv4_source(ip).map(SourceId::from)
}

/// Network-layer bytes of an IPv4-carrying Ethernet frame, single VLAN tag
/// allowed.
fn ethernet_payload(frame: &[u8]) -> Option<&[u8]> {
    let eth = Ethernet2HeaderSlice::from_slice(frame).ok()?;
    let rest = &frame[eth.slice().len()..];
    let ether_type = eth.ether_type();

    if ether_type == EtherType::IPV4 {
        Some(rest)
    } else if ether_type == EtherType::VLAN_TAGGED_FRAME {
        let vlan = SingleVlanHeaderSlice::from_slice(rest).ok()?;
        (vlan.ether_type() == EtherType::IPV4).then(|| &rest[vlan.slice().len()..])
    } else {
        None
    }
}

fn ipv4_source(data: &[u8]) -> Option<Ipv4Addr> {
    Ipv4HeaderSlice::from_slice(data)
        .ok()
        .map(|header| header.source_addr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn ipv4_frame(src: [u8; 4]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv4(src, [192, 168, 0, 1], 64)
            .udp(40000, 53);
        let payload = [0xAAu8; 8];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();
        frame
    }

    fn ipv6_frame() -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
            .ipv6([0x20; 16], [0x21; 16], 64)
            .udp(40000, 53);
        let mut frame = Vec::new();
        builder.write(&mut frame, &[]).unwrap();
        frame
    }

    #[test]
    fn extracts_ipv4_source() {
        let packet = Packet::ethernet(ipv4_frame([10, 0, 0, 1]));
        assert_eq!(classify(&packet).unwrap().as_str(), "10.0.0.1");
    }

    #[test]
    fn extracts_source_behind_vlan_tag() {
        let frame = ipv4_frame([172, 16, 0, 9]);
        let mut tagged = Vec::with_capacity(frame.len() + 4);
        tagged.extend_from_slice(&frame[..12]);
        tagged.extend_from_slice(&[0x81, 0x00, 0x00, 0x05]); // TPID + VLAN 5
        tagged.extend_from_slice(&frame[12..]);
        let packet = Packet::ethernet(tagged);
        assert_eq!(classify(&packet).unwrap().as_str(), "172.16.0.9");
    }

    #[test]
    fn raw_ip_frames_are_classified() {
        let frame = ipv4_frame([10, 9, 8, 7]);
        let packet = Packet::new(frame[14..].to_vec(), LinkKind::RawIp);
        assert_eq!(classify(&packet).unwrap().as_str(), "10.9.8.7");
    }

    #[test]
    fn ignores_ipv6() {
        assert!(classify(&Packet::ethernet(ipv6_frame())).is_none());
    }

    #[test]
    fn ignores_truncated_header() {
        let frame = ipv4_frame([10, 0, 0, 1]);
        assert!(classify(&Packet::ethernet(frame[..20].to_vec())).is_none());
        assert!(classify(&Packet::ethernet(vec![0u8; 3])).is_none());
    }

    #[test]
    fn ignores_arp() {
        let mut frame = vec![0u8; 42];
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert!(classify(&Packet::ethernet(frame)).is_none());
    }

    #[test]
    fn ignores_unsupported_link_type() {
        let packet = Packet::new(ipv4_frame([10, 0, 0, 1]), LinkKind::Other);
        assert!(classify(&packet).is_none());
    }
}
