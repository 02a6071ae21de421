// SPDX-License-Identifier: Apache-2.0

//! A parsed, mutable view over one captured frame.
//!
//! [`Packet::parse`] is also the classifier required by the packet-processing
//! core: only `Ethernet + IPv4 + (TCP | UDP)` frames produce a [`Packet`];
//! anything else is rejected with a typed [`ParseError`] and never reaches a
//! processor.

use crate::eth::Mac;
use etherparse::{Ethernet2Header, IpNumber, Ipv4Header, TcpHeader, UdpHeader};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// The transport protocol carried by a [`Packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportProtocol {
    /// Transmission Control Protocol
    Tcp,
    /// User Datagram Protocol
    Udp,
}

impl Display for TransportProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportProtocol::Tcp => write!(f, "TCP"),
            TransportProtocol::Udp => write!(f, "UDP"),
        }
    }
}

/// The TCP flags a connection tracker cares about.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TcpFlags {
    /// synchronize sequence numbers
    pub syn: bool,
    /// no more data from sender
    pub fin: bool,
    /// acknowledgment field is significant
    pub ack: bool,
    /// reset the connection
    pub rst: bool,
}

#[derive(Debug, Clone)]
enum Transport {
    Tcp(TcpHeader),
    Udp(UdpHeader),
}

/// Errors which can occur while parsing a frame into a [`Packet`].
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// A layer's header was truncated or malformed.
    #[error("malformed or truncated {0} header")]
    BadHeader(&'static str),
    /// The frame does not carry IPv4.
    #[error("not an IPv4 frame (ether type {0:#06x})")]
    NotIpv4(u16),
    /// The frame carries an IPv4 protocol other than TCP or UDP.
    #[error("unsupported transport protocol ({0})")]
    UnsupportedTransport(u8),
    /// Zero is not a legal transport source port.
    #[error("zero source port")]
    ZeroSourcePort,
    /// Zero is not a legal transport destination port.
    #[error("zero destination port")]
    ZeroDestinationPort,
}

/// A parsed `Ethernet + IPv4 + (TCP | UDP)` frame.
///
/// All three layers are mutable in place; after rewriting any addressing
/// field, call [`Packet::update_checksums`] before the frame is put back on
/// a wire.
#[derive(Debug, Clone)]
pub struct Packet {
    eth: Ethernet2Header,
    ipv4: Ipv4Header,
    transport: Transport,
    payload: Vec<u8>,
}

impl Packet {
    /// Parse and classify a captured frame.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the frame is not well-formed
    /// `Ethernet + IPv4 + (TCP | UDP)` or uses a zero transport port.
    pub fn parse(frame: &[u8]) -> Result<Packet, ParseError> {
        let (eth, rest) =
            Ethernet2Header::from_slice(frame).map_err(|_| ParseError::BadHeader("ethernet"))?;
        if eth.ether_type != etherparse::EtherType::IPV4 {
            return Err(ParseError::NotIpv4(eth.ether_type.0));
        }
        let (ipv4, rest) =
            Ipv4Header::from_slice(rest).map_err(|_| ParseError::BadHeader("ipv4"))?;
        let (transport, payload) = match ipv4.protocol {
            IpNumber::TCP => {
                let (tcp, rest) =
                    TcpHeader::from_slice(rest).map_err(|_| ParseError::BadHeader("tcp"))?;
                (Transport::Tcp(tcp), rest)
            }
            IpNumber::UDP => {
                let (udp, rest) =
                    UdpHeader::from_slice(rest).map_err(|_| ParseError::BadHeader("udp"))?;
                (Transport::Udp(udp), rest)
            }
            other => return Err(ParseError::UnsupportedTransport(other.0)),
        };
        let packet = Packet {
            eth,
            ipv4,
            transport,
            payload: payload.to_vec(),
        };
        if packet.transport_source() == 0 {
            return Err(ParseError::ZeroSourcePort);
        }
        if packet.transport_destination() == 0 {
            return Err(ParseError::ZeroDestinationPort);
        }
        Ok(packet)
    }

    /// The transport protocol this packet was classified as.
    #[must_use]
    pub fn transport_protocol(&self) -> TransportProtocol {
        match self.transport {
            Transport::Tcp(_) => TransportProtocol::Tcp,
            Transport::Udp(_) => TransportProtocol::Udp,
        }
    }

    /// The link-layer source address.
    #[must_use]
    pub fn link_source(&self) -> Mac {
        Mac(self.eth.source)
    }

    /// The link-layer destination address.
    #[must_use]
    pub fn link_destination(&self) -> Mac {
        Mac(self.eth.destination)
    }

    /// Rewrite the link-layer source address.
    pub fn set_link_source(&mut self, mac: Mac) {
        self.eth.source = mac.0;
    }

    /// Rewrite the link-layer destination address.
    pub fn set_link_destination(&mut self, mac: Mac) {
        self.eth.destination = mac.0;
    }

    /// The network-layer source address.
    #[must_use]
    pub fn ipv4_source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ipv4.source)
    }

    /// The network-layer destination address.
    #[must_use]
    pub fn ipv4_destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ipv4.destination)
    }

    /// Rewrite the network-layer source address.
    pub fn set_ipv4_source(&mut self, addr: Ipv4Addr) {
        self.ipv4.source = addr.octets();
    }

    /// Rewrite the network-layer destination address.
    pub fn set_ipv4_destination(&mut self, addr: Ipv4Addr) {
        self.ipv4.destination = addr.octets();
    }

    /// The transport-layer source port.
    #[must_use]
    pub fn transport_source(&self) -> u16 {
        match &self.transport {
            Transport::Tcp(tcp) => tcp.source_port,
            Transport::Udp(udp) => udp.source_port,
        }
    }

    /// The transport-layer destination port.
    #[must_use]
    pub fn transport_destination(&self) -> u16 {
        match &self.transport {
            Transport::Tcp(tcp) => tcp.destination_port,
            Transport::Udp(udp) => udp.destination_port,
        }
    }

    /// Rewrite the transport-layer source port.
    pub fn set_transport_source(&mut self, port: u16) {
        match &mut self.transport {
            Transport::Tcp(tcp) => tcp.source_port = port,
            Transport::Udp(udp) => udp.source_port = port,
        }
    }

    /// Rewrite the transport-layer destination port.
    pub fn set_transport_destination(&mut self, port: u16) {
        match &mut self.transport {
            Transport::Tcp(tcp) => tcp.destination_port = port,
            Transport::Udp(udp) => udp.destination_port = port,
        }
    }

    /// The TCP flags, or `None` for a non-TCP packet.
    #[must_use]
    pub fn tcp_flags(&self) -> Option<TcpFlags> {
        match &self.transport {
            Transport::Tcp(tcp) => Some(TcpFlags {
                syn: tcp.syn,
                fin: tcp.fin,
                ack: tcp.ack,
                rst: tcp.rst,
            }),
            Transport::Udp(_) => None,
        }
    }

    /// Recompute the transport checksum and the IPv4 header checksum.
    ///
    /// Call after any mutation of addressing fields. The transport checksum
    /// is computed over the IPv4 pseudo-header, so the network layer must be
    /// rewritten before this is called, not after.
    pub fn update_checksums(&mut self) {
        // calc_checksum_ipv4 only fails on payloads larger than the IPv4
        // length field can express; parse() never builds such a packet.
        match &mut self.transport {
            Transport::Tcp(tcp) => {
                if let Ok(sum) = tcp.calc_checksum_ipv4(&self.ipv4, &self.payload) {
                    tcp.checksum = sum;
                }
            }
            Transport::Udp(udp) => {
                if let Ok(sum) = udp.calc_checksum_ipv4(&self.ipv4, &self.payload) {
                    udp.checksum = sum;
                }
            }
        }
        self.ipv4.header_checksum = self.ipv4.calc_header_checksum();
    }

    /// Serialize the packet back into a frame.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        let transport_len = match &self.transport {
            Transport::Tcp(tcp) => tcp.header_len(),
            Transport::Udp(udp) => udp.header_len(),
        };
        let eth_bytes = self.eth.to_bytes();
        let mut out = Vec::with_capacity(
            eth_bytes.len() + self.ipv4.header_len() + transport_len + self.payload.len(),
        );
        out.extend_from_slice(&eth_bytes);
        out.extend_from_slice(&self.ipv4.to_bytes());
        match &self.transport {
            Transport::Tcp(tcp) => out.extend_from_slice(&tcp.to_bytes()),
            Transport::Udp(udp) => out.extend_from_slice(&udp.to_bytes()),
        }
        out.extend_from_slice(&self.payload);
        out
    }
}

impl Display for Packet {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{}",
            self.transport_protocol(),
            self.ipv4_source(),
            self.transport_source(),
            self.ipv4_destination(),
            self.transport_destination()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::test_utils::{tcp_frame, udp_frame};
    use super::{Packet, ParseError, TcpFlags, TransportProtocol};
    use crate::eth::Mac;
    use pretty_assertions::assert_eq;
    use std::net::Ipv4Addr;

    const SRC_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x01]);
    const DST_MAC: Mac = Mac([0x02, 0, 0, 0, 0, 0x02]);

    fn ip(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
        Ipv4Addr::new(a, b, c, d)
    }

    #[test]
    fn parse_tcp_round_trip() {
        let mut packet = tcp_frame(
            SRC_MAC,
            DST_MAC,
            ip(10, 0, 0, 5),
            5000,
            ip(8, 8, 8, 8),
            80,
            TcpFlags {
                syn: true,
                ..TcpFlags::default()
            },
        );
        assert_eq!(packet.transport_protocol(), TransportProtocol::Tcp);
        let bytes = packet.to_vec();
        let reparsed = Packet::parse(&bytes).unwrap();
        assert_eq!(reparsed.ipv4_source(), ip(10, 0, 0, 5));
        assert_eq!(reparsed.transport_destination(), 80);
        assert!(reparsed.tcp_flags().unwrap().syn);
        assert_eq!(reparsed.link_source(), SRC_MAC);

        packet.set_ipv4_source(ip(192, 0, 2, 1));
        packet.set_transport_source(10000);
        packet.update_checksums();
        let rewritten = Packet::parse(&packet.to_vec()).unwrap();
        assert_eq!(rewritten.ipv4_source(), ip(192, 0, 2, 1));
        assert_eq!(rewritten.transport_source(), 10000);
    }

    #[test]
    fn parse_udp() {
        let packet = udp_frame(SRC_MAC, DST_MAC, ip(10, 0, 0, 7), 6000, ip(1, 1, 1, 1), 53);
        assert_eq!(packet.transport_protocol(), TransportProtocol::Udp);
        assert_eq!(packet.tcp_flags(), None);
        assert_eq!(format!("{packet}"), "UDP 10.0.0.7:6000 -> 1.1.1.1:53");
    }

    #[test]
    fn classification_rejects_junk() {
        assert!(matches!(
            Packet::parse(&[0u8; 4]),
            Err(ParseError::BadHeader("ethernet"))
        ));
        // ARP frame: ether type 0x0806
        let mut arp = vec![0u8; 64];
        arp[12] = 0x08;
        arp[13] = 0x06;
        assert!(matches!(Packet::parse(&arp), Err(ParseError::NotIpv4(0x0806))));
    }

    #[test]
    fn classification_rejects_non_transport_ipv4() {
        // ICMP inside IPv4: protocol 1
        let packet = udp_frame(SRC_MAC, DST_MAC, ip(10, 0, 0, 7), 6000, ip(1, 1, 1, 1), 53);
        let mut bytes = packet.to_vec();
        bytes[14 + 9] = 1; // IPv4 protocol field
        assert!(matches!(
            Packet::parse(&bytes),
            Err(ParseError::UnsupportedTransport(1))
        ));
    }
}
