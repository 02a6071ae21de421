// SPDX-License-Identifier: Apache-2.0

//! Protocol-specific transport addressing and connection lifecycle.
//!
//! The NAT engine is generic over two small traits: [`TransportAddress`],
//! the endpoint-within-a-node (a TCP or UDP port, or nothing for protocols
//! without ports), and [`TransportState`], the per-connection lifecycle
//! tracker (the TCP half-close machine, or nothing for UDP).

use net::packet::Packet;
use net::tcp::TcpPort;
use net::udp::UdpPort;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Which way a packet is traveling through the NAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// From an inside-facing interface toward the outside.
    FromInside,
    /// From the outside interface toward an inside node.
    FromOutside,
}

/// A protocol-specific endpoint within a node.
///
/// Implementations know how to match themselves against a parsed packet's
/// transport layer and how to rewrite that layer in place.
pub trait TransportAddress:
    Copy + Eq + Hash + Debug + Display + Send + Sync + 'static
{
    /// True iff this address is the packet's transport source.
    fn is_source_of(&self, packet: &Packet) -> bool;

    /// True iff this address is the packet's transport destination.
    fn is_destination_of(&self, packet: &Packet) -> bool;

    /// Rewrite the packet's transport source to this address.
    fn set_as_source_of(&self, packet: &mut Packet);

    /// Rewrite the packet's transport destination to this address.
    fn set_as_destination_of(&self, packet: &mut Packet);
}

impl TransportAddress for TcpPort {
    fn is_source_of(&self, packet: &Packet) -> bool {
        packet.transport_source() == self.as_u16()
    }

    fn is_destination_of(&self, packet: &Packet) -> bool {
        packet.transport_destination() == self.as_u16()
    }

    fn set_as_source_of(&self, packet: &mut Packet) {
        packet.set_transport_source(self.as_u16());
    }

    fn set_as_destination_of(&self, packet: &mut Packet) {
        packet.set_transport_destination(self.as_u16());
    }
}

impl TransportAddress for UdpPort {
    fn is_source_of(&self, packet: &Packet) -> bool {
        packet.transport_source() == self.as_u16()
    }

    fn is_destination_of(&self, packet: &Packet) -> bool {
        packet.transport_destination() == self.as_u16()
    }

    fn set_as_source_of(&self, packet: &mut Packet) {
        packet.set_transport_source(self.as_u16());
    }

    fn set_as_destination_of(&self, packet: &mut Packet) {
        packet.set_transport_destination(self.as_u16());
    }
}

/// The transport address of a protocol without ports.
///
/// Matches every packet and rewrites nothing, so a NAT over such a protocol
/// degenerates to pure network-address translation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoTransportAddress;

impl Display for NoTransportAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "-")
    }
}

impl TransportAddress for NoTransportAddress {
    fn is_source_of(&self, _packet: &Packet) -> bool {
        true
    }

    fn is_destination_of(&self, _packet: &Packet) -> bool {
        true
    }

    fn set_as_source_of(&self, _packet: &mut Packet) {}

    fn set_as_destination_of(&self, _packet: &mut Packet) {}
}

/// Per-connection protocol lifecycle state.
pub trait TransportState: Debug + Send + 'static {
    /// Account for one packet traveling in `direction`.
    fn update(&mut self, packet: &Packet, direction: Direction);

    /// True iff the protocol considers this connection finished.
    fn can_be_closed(&self, now: Instant) -> bool;
}

/// The state of a connection whose protocol has no lifecycle (UDP).
///
/// Never closable; such connections are evicted by inactivity only.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTransportState;

impl TransportState for NoTransportState {
    fn update(&mut self, _packet: &Packet, _direction: Direction) {}

    fn can_be_closed(&self, _now: Instant) -> bool {
        false
    }
}

/// One direction's progress through open and close handshakes.
///
/// `None -> Syn -> SynAck` and independently `None -> Fin -> FinAck`; the
/// transitions to `SynAck` and `FinAck` are driven by an ACK traveling in
/// the opposite direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionalState {
    None,
    Syn,
    SynAck,
    Fin,
    FinAck,
}

impl DirectionalState {
    fn is_closed(self) -> bool {
        matches!(self, DirectionalState::None | DirectionalState::FinAck)
    }
}

/// A simplified TCP close-handshake tracker.
///
/// Tracks two independent directional states. On every packet, the
/// direction the packet travels in updates its own state from the packet's
/// SYN/FIN flags, and the packet's ACK flag advances the *other* direction
/// (an ACK sent one way acknowledges a SYN or FIN sent the other way).
///
/// This is enough to detect teardown; it is not full TCP correctness. In
/// particular an RST does not close the connection, only FIN/ACK sequences
/// or inactivity do.
#[derive(Debug)]
pub struct TcpState {
    time_wait: Duration,
    from_inside: DirectionalState,
    from_outside: DirectionalState,
    close_time: Option<Instant>,
}

impl TcpState {
    /// A fresh state machine for a connection which has not yet seen a packet.
    #[must_use]
    pub fn new(time_wait: Duration) -> TcpState {
        TcpState {
            time_wait,
            from_inside: DirectionalState::None,
            from_outside: DirectionalState::None,
            close_time: None,
        }
    }

    /// True iff the close handshake completed less than the TIME-WAIT
    /// duration before `now`.
    ///
    /// Informational only; closability is decided by the directional states.
    #[must_use]
    pub fn in_time_wait(&self, now: Instant) -> bool {
        self.close_time
            .is_some_and(|closed| now.saturating_duration_since(closed) < self.time_wait)
    }
}

impl TransportState for TcpState {
    fn update(&mut self, packet: &Packet, direction: Direction) {
        let Some(flags) = packet.tcp_flags() else {
            return;
        };
        let (own, other) = match direction {
            Direction::FromInside => (&mut self.from_inside, &mut self.from_outside),
            Direction::FromOutside => (&mut self.from_outside, &mut self.from_inside),
        };
        if flags.fin {
            *own = DirectionalState::Fin;
        } else if *own == DirectionalState::None && flags.syn {
            *own = DirectionalState::Syn;
        }
        if flags.ack {
            match *other {
                DirectionalState::Syn => *other = DirectionalState::SynAck,
                DirectionalState::Fin => {
                    *other = DirectionalState::FinAck;
                    self.close_time = Some(Instant::now());
                }
                _ => {}
            }
        }
    }

    fn can_be_closed(&self, _now: Instant) -> bool {
        self.from_inside.is_closed() && self.from_outside.is_closed()
    }
}

#[cfg(test)]
mod test {
    use super::{
        Direction, NoTransportState, TcpState, TransportAddress, TransportState,
    };
    use net::eth::Mac;
    use net::packet::{Packet, TcpFlags, test_utils::tcp_frame};
    use net::tcp::TcpPort;
    use std::net::Ipv4Addr;
    use std::time::{Duration, Instant};

    fn tcp(flags: TcpFlags) -> Packet {
        tcp_frame(
            Mac([2, 0, 0, 0, 0, 1]),
            Mac([2, 0, 0, 0, 0, 2]),
            Ipv4Addr::new(10, 0, 0, 5),
            5000,
            Ipv4Addr::new(8, 8, 8, 8),
            80,
            flags,
        )
    }

    const SYN: TcpFlags = TcpFlags {
        syn: true,
        fin: false,
        ack: false,
        rst: false,
    };
    const SYN_ACK: TcpFlags = TcpFlags {
        syn: true,
        fin: false,
        ack: true,
        rst: false,
    };
    const ACK: TcpFlags = TcpFlags {
        syn: false,
        fin: false,
        ack: true,
        rst: false,
    };
    const FIN_ACK: TcpFlags = TcpFlags {
        syn: false,
        fin: true,
        ack: true,
        rst: false,
    };
    const RST: TcpFlags = TcpFlags {
        syn: false,
        fin: false,
        ack: false,
        rst: true,
    };

    #[test]
    fn four_way_close_makes_connection_closable() {
        let mut state = TcpState::new(Duration::from_secs(240));
        state.update(&tcp(SYN), Direction::FromInside);
        state.update(&tcp(SYN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);
        assert!(!state.can_be_closed(Instant::now()));

        state.update(&tcp(FIN_ACK), Direction::FromInside);
        state.update(&tcp(ACK), Direction::FromOutside);
        assert!(!state.can_be_closed(Instant::now()));

        state.update(&tcp(FIN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);
        assert!(state.can_be_closed(Instant::now()));
        assert!(state.in_time_wait(Instant::now()));
    }

    #[test]
    fn close_initiated_from_outside() {
        let mut state = TcpState::new(Duration::from_secs(240));
        state.update(&tcp(SYN), Direction::FromInside);
        state.update(&tcp(SYN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);

        state.update(&tcp(FIN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);
        state.update(&tcp(FIN_ACK), Direction::FromInside);
        state.update(&tcp(ACK), Direction::FromOutside);
        assert!(state.can_be_closed(Instant::now()));
    }

    #[test]
    fn half_close_is_not_closable() {
        let mut state = TcpState::new(Duration::from_secs(240));
        state.update(&tcp(SYN), Direction::FromInside);
        state.update(&tcp(SYN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);
        state.update(&tcp(FIN_ACK), Direction::FromInside);
        state.update(&tcp(ACK), Direction::FromOutside);
        assert!(!state.can_be_closed(Instant::now()));
    }

    #[test]
    fn rst_does_not_close() {
        let mut state = TcpState::new(Duration::from_secs(240));
        state.update(&tcp(SYN), Direction::FromInside);
        state.update(&tcp(SYN_ACK), Direction::FromOutside);
        state.update(&tcp(ACK), Direction::FromInside);
        state.update(&tcp(RST), Direction::FromOutside);
        assert!(!state.can_be_closed(Instant::now()));
    }

    #[test]
    fn udp_state_never_closable() {
        let mut state = NoTransportState;
        state.update(&tcp(ACK), Direction::FromInside);
        assert!(!state.can_be_closed(Instant::now()));
    }

    #[test]
    fn port_rewrites_transport_layer() {
        let mut packet = tcp(SYN);
        let port = TcpPort::new_checked(10000).unwrap();
        assert!(!port.is_source_of(&packet));
        port.set_as_source_of(&mut packet);
        assert!(port.is_source_of(&packet));
        assert_eq!(packet.transport_source(), 10000);
    }
}
