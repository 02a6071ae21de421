// SPDX-License-Identifier: Apache-2.0

//! A protocol-typed view over a parsed packet.

use crate::node::Node;
use crate::protocol::NatProtocol;
use net::eth::Mac;
use net::interface::InterfaceId;
use net::packet::Packet;
use std::marker::PhantomData;

/// A view over a [`Packet`] known to carry protocol `P`.
///
/// Construction is the protocol check; everything downstream of a
/// successfully built encapsulation may assume the packet's transport layer
/// is `P`'s.
pub struct PacketEncapsulation<'p, P: NatProtocol> {
    packet: &'p mut Packet,
    _protocol: PhantomData<P>,
}

impl<'p, P: NatProtocol> PacketEncapsulation<'p, P> {
    /// Wrap `packet` if it carries protocol `P`.
    #[must_use]
    pub fn new(packet: &'p mut Packet) -> Option<PacketEncapsulation<'p, P>> {
        if P::matches(packet) {
            Some(PacketEncapsulation {
                packet,
                _protocol: PhantomData,
            })
        } else {
            None
        }
    }

    /// The packet's source endpoint, taken to have arrived on `interface`.
    #[must_use]
    pub fn source_node(&self, interface: InterfaceId) -> Option<Node<P::Addr>> {
        Some(Node::new(
            self.packet.ipv4_source(),
            P::source_address(self.packet)?,
            interface,
            self.packet.link_source(),
        ))
    }

    /// The packet's destination endpoint, reachable via `interface`.
    #[must_use]
    pub fn destination_node(&self, interface: InterfaceId) -> Option<Node<P::Addr>> {
        Some(Node::new(
            self.packet.ipv4_destination(),
            P::destination_address(self.packet)?,
            interface,
            self.packet.link_destination(),
        ))
    }

    /// True iff this packet opens a connection when sent inside to outside.
    #[must_use]
    pub fn signals_start_of_connection(&self) -> bool {
        P::signals_start_of_connection(self.packet)
    }

    /// Force the link-layer destination, e.g. to the next-hop router.
    pub fn set_link_destination(&mut self, mac: Mac) {
        self.packet.set_link_destination(mac);
    }

    /// Recompute transport and IPv4 checksums after rewrites.
    pub fn update_checksums(&mut self) {
        self.packet.update_checksums();
    }

    /// The underlying packet.
    #[must_use]
    pub fn packet(&self) -> &Packet {
        self.packet
    }

    /// The underlying packet, mutably.
    pub fn packet_mut(&mut self) -> &mut Packet {
        self.packet
    }
}
