// SPDX-License-Identifier: Apache-2.0

//! The NAT engine: translation tables, forwarding algorithm, garbage
//! collection.
//!
//! Two tables are kept per engine. `to_outside` is keyed by
//! `(inside, outside)` and matches traffic leaving the inside network;
//! `to_inside` is keyed by `(outside, masquerade)` and matches replies
//! arriving on the outside interface. Both entries of a connection are
//! inserted at creation and removed together by the garbage collector;
//! nothing else removes them, so a close is only ever torn down by the next
//! sweep.

use crate::connection::NatConnection;
use crate::encap::PacketEncapsulation;
use crate::node::{ConnectionKey, Node};
use crate::protocol::NatProtocol;
use crate::transport::Direction;
use ahash::RandomState;
use dashmap::DashMap;
use net::eth::Mac;
use net::interface::InterfaceId;
use net::packet::Packet;
use pipeline::ForwardingDecision;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

type Table<P> =
    DashMap<ConnectionKey<<P as NatProtocol>::Addr>, Arc<NatConnection<P>>, RandomState>;

/// A stateful NAT over one transport protocol.
#[derive(Debug)]
pub struct NatEngine<P: NatProtocol> {
    outside_address: Ipv4Addr,
    outside_hop_mac: Mac,
    outside_interface_mac: Mac,
    inactivity_timeout: Duration,
    protocol: P,
    to_inside: Table<P>,
    to_outside: Table<P>,
}

impl<P: NatProtocol> NatEngine<P> {
    /// An engine masquerading inside traffic as `outside_address`.
    ///
    /// `outside_hop_mac` is the link address of the next hop on the outside
    /// network; `outside_interface_mac` is the hardware address of the
    /// outside interface itself, used as the masquerade nodes' link address.
    #[must_use]
    pub fn new(
        protocol: P,
        outside_address: Ipv4Addr,
        outside_hop_mac: Mac,
        outside_interface_mac: Mac,
        inactivity_timeout: Duration,
    ) -> NatEngine<P> {
        NatEngine {
            outside_address,
            outside_hop_mac,
            outside_interface_mac,
            inactivity_timeout,
            protocol,
            to_inside: DashMap::with_hasher(RandomState::new()),
            to_outside: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Process one packet of this engine's protocol.
    ///
    /// Every failure mode (wrong protocol, unmappable addressing, no
    /// matching connection) resolves to [`ForwardingDecision::Drop`].
    pub fn handle_packet(&self, packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision {
        let Some(mut encap) = PacketEncapsulation::<P>::new(packet) else {
            return ForwardingDecision::Drop;
        };
        if ingress == InterfaceId::OUTSIDE {
            self.handle_from_outside(&mut encap)
        } else {
            self.handle_from_inside(&mut encap, ingress)
        }
    }

    /// A reply from the outside: translate back to the inside endpoint.
    fn handle_from_outside(&self, encap: &mut PacketEncapsulation<'_, P>) -> ForwardingDecision {
        let (Some(source), Some(destination)) = (
            encap.source_node(InterfaceId::OUTSIDE),
            encap.destination_node(InterfaceId::OUTSIDE),
        ) else {
            return ForwardingDecision::Drop;
        };
        let key = ConnectionKey::new(source, destination);
        let Some(connection) = self.to_inside.get(&key).map(|entry| Arc::clone(entry.value())) else {
            trace!(protocol = P::NAME, %key, "no mapping for outside packet");
            return ForwardingDecision::Drop;
        };
        connection.received_packet(encap.packet(), Direction::FromOutside);
        let inside = connection.inside();
        inside.rewrite_packet_destination(encap.packet_mut());
        encap.update_checksums();
        trace!(protocol = P::NAME, %key, inside = %inside, "translated outside packet");
        ForwardingDecision::Forward(inside.interface())
    }

    /// Traffic leaving the inside network: masquerade it, creating the
    /// mapping if this packet opens a connection.
    fn handle_from_inside(
        &self,
        encap: &mut PacketEncapsulation<'_, P>,
        ingress: InterfaceId,
    ) -> ForwardingDecision {
        // everything leaving goes via the outside next hop; forced before
        // key construction so the outside node records the next hop's MAC
        encap.set_link_destination(self.outside_hop_mac);
        let (Some(source), Some(destination)) = (
            encap.source_node(ingress),
            encap.destination_node(InterfaceId::OUTSIDE),
        ) else {
            return ForwardingDecision::Drop;
        };
        let key = ConnectionKey::new(source, destination);
        let connection = match self.to_outside.get(&key).map(|entry| Arc::clone(entry.value())) {
            Some(connection) => connection,
            None if encap.signals_start_of_connection() => {
                self.create_mapping(source, destination, key)
            }
            None => {
                trace!(protocol = P::NAME, %key, "inside packet matches no connection and opens none");
                return ForwardingDecision::Drop;
            }
        };
        connection.received_packet(encap.packet(), Direction::FromInside);
        connection.nat().rewrite_packet_source(encap.packet_mut());
        encap.update_checksums();
        trace!(protocol = P::NAME, %key, nat = %connection.nat(), "masqueraded inside packet");
        ForwardingDecision::Forward(InterfaceId::OUTSIDE)
    }

    /// Build the masquerade node and insert the connection under both keys.
    fn create_mapping(
        &self,
        inside: Node<P::Addr>,
        outside: Node<P::Addr>,
        out_key: ConnectionKey<P::Addr>,
    ) -> Arc<NatConnection<P>> {
        // the masquerade node is never a forwarding target, hence the
        // sentinel interface; its link address is the outside interface's
        // own, which becomes the source MAC of masqueraded packets
        let nat = Node::new(
            self.outside_address,
            self.protocol.next_masquerade_address(),
            InterfaceId::NONE,
            self.outside_interface_mac,
        );
        let connection = Arc::new(NatConnection::new(
            inside,
            outside,
            nat,
            self.protocol.initial_state(),
        ));
        let in_key = ConnectionKey::new(outside, nat);
        self.to_outside.insert(out_key, Arc::clone(&connection));
        self.to_inside.insert(in_key, Arc::clone(&connection));
        debug!(protocol = P::NAME, %inside, %outside, %nat, "created NAT mapping");
        connection
    }

    /// Sweep the tables, removing connections idle longer than the
    /// inactivity timeout and connections the protocol reports closed.
    ///
    /// Safe to call concurrently with packet handling: candidate keys are
    /// collected first, then removed, so the tables are never mutated while
    /// iterated.
    pub fn garbage_collect(&self, now: Instant) {
        let mut expired = Vec::new();
        for entry in self.to_inside.iter() {
            let connection = entry.value();
            let idle = now.saturating_duration_since(connection.last_used());
            if idle > self.inactivity_timeout || connection.can_be_closed(now) {
                let out_key = ConnectionKey::new(connection.inside(), connection.outside());
                expired.push((*entry.key(), out_key));
            }
        }
        if expired.is_empty() {
            return;
        }
        for (in_key, out_key) in expired {
            self.to_inside.remove(&in_key);
            self.to_outside.remove(&out_key);
            debug!(protocol = P::NAME, key = %out_key, "removed NAT mapping");
        }
        self.dump_mappings();
    }

    /// Log the live mappings at debug level.
    pub fn dump_mappings(&self) {
        debug!(
            protocol = P::NAME,
            connections = self.to_inside.len(),
            "live NAT mappings"
        );
        for entry in self.to_inside.iter() {
            let connection = entry.value();
            debug!(
                protocol = P::NAME,
                inside = %connection.inside(),
                nat = %connection.nat(),
                outside = %connection.outside(),
                "mapping"
            );
        }
    }

    /// The number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.to_inside.len()
    }
}
