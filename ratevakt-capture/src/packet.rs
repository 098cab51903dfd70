/// A captured frame as handed to the classifier.
use bytes::Bytes;

/// Link-layer framing of a captured packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// Ethernet II, optionally 802.1Q tagged.
    Ethernet,
    /// Bare IP datagram with no link header.
    RawIp,
    /// Anything the classifier does not decode.
    Other,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub data: Bytes,
    pub link: LinkKind,
}

impl Packet {
    pub fn new(data: impl Into<Bytes>, link: LinkKind) -> Self {
        Packet {
            data: data.into(),
            link,
        }
    }

    /// Shorthand for an Ethernet frame, the common case on live interfaces.
    pub fn ethernet(data: impl Into<Bytes>) -> Self {
        Self::new(data, LinkKind::Ethernet)
    }
}
