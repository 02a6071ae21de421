// SPDX-License-Identifier: Apache-2.0

//! Frame builders for tests.
//!
//! These construct well-formed [`Packet`]s directly, with checksums already
//! valid, so tests never hand-assemble byte buffers.

use crate::eth::Mac;
use crate::packet::{Packet, TcpFlags, Transport};
use etherparse::{EtherType, Ethernet2Header, IpNumber, Ipv4Header, TcpHeader, UdpHeader};
use std::net::Ipv4Addr;

const TTL: u8 = 64;

#[allow(clippy::unwrap_used)] // header payloads built here are far below the length limit
fn ipv4_header(
    protocol: IpNumber,
    source: Ipv4Addr,
    destination: Ipv4Addr,
    payload_len: u16,
) -> Ipv4Header {
    Ipv4Header::new(
        payload_len,
        TTL,
        protocol,
        source.octets(),
        destination.octets(),
    )
    .unwrap()
}

/// Build a TCP frame with the given addressing and flags and no payload.
#[must_use]
pub fn tcp_frame(
    link_source: Mac,
    link_destination: Mac,
    source: Ipv4Addr,
    source_port: u16,
    destination: Ipv4Addr,
    destination_port: u16,
    flags: TcpFlags,
) -> Packet {
    let mut tcp = TcpHeader::new(source_port, destination_port, 0, 64_240);
    tcp.syn = flags.syn;
    tcp.fin = flags.fin;
    tcp.ack = flags.ack;
    tcp.rst = flags.rst;
    #[allow(clippy::cast_possible_truncation)] // header length is at most 60
    let header_len = tcp.header_len() as u16;
    let mut packet = Packet {
        eth: Ethernet2Header {
            source: link_source.0,
            destination: link_destination.0,
            ether_type: EtherType::IPV4,
        },
        ipv4: ipv4_header(IpNumber::TCP, source, destination, header_len),
        transport: Transport::Tcp(tcp),
        payload: Vec::new(),
    };
    packet.update_checksums();
    packet
}

/// Build a UDP frame with the given addressing and no payload.
#[must_use]
pub fn udp_frame(
    link_source: Mac,
    link_destination: Mac,
    source: Ipv4Addr,
    source_port: u16,
    destination: Ipv4Addr,
    destination_port: u16,
) -> Packet {
    let udp = UdpHeader {
        source_port,
        destination_port,
        length: 8,
        checksum: 0,
    };
    let mut packet = Packet {
        eth: Ethernet2Header {
            source: link_source.0,
            destination: link_destination.0,
            ether_type: EtherType::IPV4,
        },
        ipv4: ipv4_header(IpNumber::UDP, source, destination, 8),
        transport: Transport::Udp(udp),
        payload: Vec::new(),
    };
    packet.update_checksums();
    packet
}
