// SPDX-License-Identifier: Apache-2.0

//! Addressable endpoints and the translation-table keys built from them.

use crate::transport::TransportAddress;
use net::eth::Mac;
use net::interface::InterfaceId;
use net::packet::Packet;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;

/// An addressable endpoint: network address, transport address, the
/// interface it was seen on, and its link-layer address.
///
/// Equality and hashing cover the network and transport addresses only.
/// Interface and link address are how to *reach* the endpoint, not part of
/// its identity, and the same endpoint must key the same table slot however
/// it was learned.
#[derive(Debug, Clone, Copy)]
pub struct Node<A: TransportAddress> {
    address: Ipv4Addr,
    transport: A,
    interface: InterfaceId,
    link_address: Mac,
}

impl<A: TransportAddress> Node<A> {
    /// An endpoint at `address`/`transport`, reached via `interface` at
    /// `link_address`.
    #[must_use]
    pub fn new(
        address: Ipv4Addr,
        transport: A,
        interface: InterfaceId,
        link_address: Mac,
    ) -> Node<A> {
        Node {
            address,
            transport,
            interface,
            link_address,
        }
    }

    /// The node's network address.
    #[must_use]
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// The node's transport address.
    #[must_use]
    pub fn transport(&self) -> A {
        self.transport
    }

    /// The interface this node is reached through.
    #[must_use]
    pub fn interface(&self) -> InterfaceId {
        self.interface
    }

    /// The node's link-layer address.
    #[must_use]
    pub fn link_address(&self) -> Mac {
        self.link_address
    }

    /// Rewrite the packet's source addressing (link, network, transport) to
    /// this node. Checksums are left stale; the caller recomputes them once
    /// all rewrites are done.
    pub fn rewrite_packet_source(&self, packet: &mut Packet) {
        packet.set_link_source(self.link_address);
        packet.set_ipv4_source(self.address);
        self.transport.set_as_source_of(packet);
    }

    /// Rewrite the packet's destination addressing to this node.
    pub fn rewrite_packet_destination(&self, packet: &mut Packet) {
        packet.set_link_destination(self.link_address);
        packet.set_ipv4_destination(self.address);
        self.transport.set_as_destination_of(packet);
    }
}

impl<A: TransportAddress> PartialEq for Node<A> {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.transport == other.transport
    }
}

impl<A: TransportAddress> Eq for Node<A> {}

impl<A: TransportAddress> Hash for Node<A> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address.hash(state);
        self.transport.hash(state);
    }
}

impl<A: TransportAddress> Display for Node<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.address, self.transport)
    }
}

/// An ordered (source, destination) pair keying a translation table.
///
/// The pair is ordered: `(a, b)` and `(b, a)` are distinct keys because the
/// two roles are not interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionKey<A: TransportAddress> {
    source: Node<A>,
    destination: Node<A>,
}

impl<A: TransportAddress> ConnectionKey<A> {
    /// The key for traffic from `source` to `destination`.
    #[must_use]
    pub fn new(source: Node<A>, destination: Node<A>) -> ConnectionKey<A> {
        ConnectionKey {
            source,
            destination,
        }
    }
}

impl<A: TransportAddress> Display for ConnectionKey<A> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}
