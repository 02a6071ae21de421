// SPDX-License-Identifier: Apache-2.0

//! The contract between packet processors and the capture layer.
//!
//! A middlebox is a [`PacketProcessor`]: the capture layer hands it every
//! classified frame together with the number of the interface it arrived on,
//! and acts on the returned [`ForwardingDecision`]. Processors must be
//! callable from several capture threads at once, so `handle_packet` takes
//! `&self`; processors keep their mutable state behind their own
//! synchronization.

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use net::interface::InterfaceId;
use net::packet::Packet;
use std::fmt::{Display, Formatter};

/// What the capture layer should do with a packet after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardingDecision {
    /// Discard the packet.
    Drop,
    /// Emit the (possibly rewritten) packet on the given interface.
    Forward(InterfaceId),
}

impl Display for ForwardingDecision {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ForwardingDecision::Drop => write!(f, "drop"),
            ForwardingDecision::Forward(interface) => write!(f, "forward({interface})"),
        }
    }
}

/// A network function which inspects, and possibly rewrites, one packet at a
/// time.
pub trait PacketProcessor: Send + Sync {
    /// Process one packet which arrived on `ingress`.
    ///
    /// The packet may be mutated in place; the returned decision tells the
    /// capture layer where the mutated packet goes.
    fn handle_packet(&self, packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision;
}

impl<T: PacketProcessor + ?Sized> PacketProcessor for &T {
    fn handle_packet(&self, packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision {
        (**self).handle_packet(packet, ingress)
    }
}

impl<T: PacketProcessor + ?Sized> PacketProcessor for Box<T> {
    fn handle_packet(&self, packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision {
        (**self).handle_packet(packet, ingress)
    }
}

#[cfg(test)]
mod test {
    use super::{ForwardingDecision, PacketProcessor};
    use net::eth::Mac;
    use net::interface::InterfaceId;
    use net::packet::{Packet, test_utils::udp_frame};
    use std::net::Ipv4Addr;

    /// Emits every packet back out the interface it came in on.
    struct Reflector;

    impl PacketProcessor for Reflector {
        fn handle_packet(&self, _packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision {
            ForwardingDecision::Forward(ingress)
        }
    }

    #[test]
    fn boxed_processor_dispatches() {
        let processor: Box<dyn PacketProcessor> = Box::new(Reflector);
        let mut packet = udp_frame(
            Mac([2, 0, 0, 0, 0, 1]),
            Mac([2, 0, 0, 0, 0, 2]),
            Ipv4Addr::new(10, 0, 0, 1),
            4000,
            Ipv4Addr::new(10, 0, 0, 2),
            53,
        );
        assert_eq!(
            processor.handle_packet(&mut packet, InterfaceId::new(1)),
            ForwardingDecision::Forward(InterfaceId::new(1))
        );
    }

    #[test]
    fn decision_display() {
        assert_eq!(format!("{}", ForwardingDecision::Drop), "drop");
        assert_eq!(
            format!("{}", ForwardingDecision::Forward(InterfaceId::OUTSIDE)),
            "forward(0)"
        );
    }
}
