//! ratevakt-capture
//!
//! Packet acquisition for ratevakt. Every source implements [`PacketSource`];
//! [`classify`] turns a captured frame into the identifier used for rate
//! accounting.

pub mod classify;
pub mod packet;
pub mod pcap_source;
pub mod source;

pub use classify::classify;
pub use packet::{LinkKind, Packet};
pub use pcap_source::{PcapOptions, PcapSource};
pub use source::{CaptureError, ChannelSource, PacketSource, VecSource};
