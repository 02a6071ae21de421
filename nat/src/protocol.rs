// SPDX-License-Identifier: Apache-2.0

//! Protocol specializations: what makes a TCP NAT a TCP NAT.
//!
//! A [`NatProtocol`] supplies the engine with typed access to a packet's
//! transport addresses, the connection-start signal, the initial lifecycle
//! state for new connections, and the masquerade-address allocation policy.

use crate::PortRange;
use crate::transport::{NoTransportState, TcpState, TransportAddress, TransportState};
use net::packet::{Packet, TransportProtocol};
use net::tcp::TcpPort;
use net::udp::UdpPort;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// The protocol-specialization seam of the NAT engine.
pub trait NatProtocol: Send + Sync + 'static {
    /// The transport address type of this protocol.
    type Addr: TransportAddress;
    /// The per-connection lifecycle state of this protocol.
    type State: TransportState;

    /// Protocol name for logs.
    const NAME: &'static str;

    /// True iff the packet carries this protocol.
    fn matches(packet: &Packet) -> bool;

    /// The packet's transport source address, if it carries this protocol.
    fn source_address(packet: &Packet) -> Option<Self::Addr>;

    /// The packet's transport destination address, if it carries this
    /// protocol.
    fn destination_address(packet: &Packet) -> Option<Self::Addr>;

    /// True iff this packet opens a connection when sent inside to outside.
    fn signals_start_of_connection(packet: &Packet) -> bool;

    /// The lifecycle state a freshly created connection starts with.
    fn initial_state(&self) -> Self::State;

    /// Allocate the next masquerade transport address.
    ///
    /// Allocation is serialized per protocol; whether an address is still
    /// held by a live connection is not checked (a known limitation of this
    /// NAT, see the crate docs).
    fn next_masquerade_address(&self) -> Self::Addr;
}

/// TCP specialization: connections open on SYN, close via the half-close
/// machine, and masquerade ports come from a counter that never wraps.
/// Pool exhaustion is unhandled.
#[derive(Debug)]
pub struct TcpNat {
    time_wait: Duration,
    next_port: Mutex<u16>,
}

impl TcpNat {
    /// A TCP specialization drawing masquerade ports from `ports`.
    #[must_use]
    pub fn new(ports: PortRange, time_wait: Duration) -> TcpNat {
        TcpNat {
            time_wait,
            next_port: Mutex::new(ports.start()),
        }
    }
}

impl NatProtocol for TcpNat {
    type Addr = TcpPort;
    type State = TcpState;

    const NAME: &'static str = "tcp";

    fn matches(packet: &Packet) -> bool {
        packet.transport_protocol() == TransportProtocol::Tcp
    }

    fn source_address(packet: &Packet) -> Option<TcpPort> {
        if Self::matches(packet) {
            TcpPort::new_checked(packet.transport_source()).ok()
        } else {
            None
        }
    }

    fn destination_address(packet: &Packet) -> Option<TcpPort> {
        if Self::matches(packet) {
            TcpPort::new_checked(packet.transport_destination()).ok()
        } else {
            None
        }
    }

    fn signals_start_of_connection(packet: &Packet) -> bool {
        packet.tcp_flags().is_some_and(|flags| flags.syn)
    }

    fn initial_state(&self) -> TcpState {
        TcpState::new(self.time_wait)
    }

    fn next_masquerade_address(&self) -> TcpPort {
        let mut next = self
            .next_port
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let port = *next;
        *next = next.saturating_add(1);
        // never zero: the range starts non-zero and the counter saturates
        TcpPort::new_checked(port).unwrap_or_else(|_| unreachable!())
    }
}

/// UDP specialization: every first packet opens a connection, there is no
/// lifecycle state, and masquerade ports rotate within the configured range.
#[derive(Debug)]
pub struct UdpNat {
    ports: PortRange,
    next_port: Mutex<u16>,
}

impl UdpNat {
    /// A UDP specialization drawing masquerade ports from `ports`.
    #[must_use]
    pub fn new(ports: PortRange) -> UdpNat {
        UdpNat {
            ports,
            next_port: Mutex::new(ports.start()),
        }
    }
}

impl NatProtocol for UdpNat {
    type Addr = UdpPort;
    type State = NoTransportState;

    const NAME: &'static str = "udp";

    fn matches(packet: &Packet) -> bool {
        packet.transport_protocol() == TransportProtocol::Udp
    }

    fn source_address(packet: &Packet) -> Option<UdpPort> {
        if Self::matches(packet) {
            UdpPort::new_checked(packet.transport_source()).ok()
        } else {
            None
        }
    }

    fn destination_address(packet: &Packet) -> Option<UdpPort> {
        if Self::matches(packet) {
            UdpPort::new_checked(packet.transport_destination()).ok()
        } else {
            None
        }
    }

    fn signals_start_of_connection(packet: &Packet) -> bool {
        Self::matches(packet)
    }

    fn initial_state(&self) -> NoTransportState {
        NoTransportState
    }

    fn next_masquerade_address(&self) -> UdpPort {
        let mut next = self
            .next_port
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let port = *next;
        let candidate = port.wrapping_add(1);
        *next = if candidate < self.ports.start() || candidate > self.ports.end() {
            self.ports.start()
        } else {
            candidate
        };
        UdpPort::new_checked(port).unwrap_or_else(|_| unreachable!())
    }
}

#[cfg(test)]
mod test {
    use super::{NatProtocol, TcpNat, UdpNat};
    use crate::PortRange;
    use net::eth::Mac;
    use net::packet::{TcpFlags, test_utils::{tcp_frame, udp_frame}};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    #[test]
    fn tcp_ports_increment_without_wrapping() {
        let tcp = TcpNat::new(
            PortRange::new(u16::MAX - 1, u16::MAX).unwrap(),
            Duration::from_secs(240),
        );
        assert_eq!(tcp.next_masquerade_address().as_u16(), u16::MAX - 1);
        assert_eq!(tcp.next_masquerade_address().as_u16(), u16::MAX);
        // saturated: the pool is exhausted and the counter stays put
        assert_eq!(tcp.next_masquerade_address().as_u16(), u16::MAX);
    }

    #[test]
    fn udp_ports_wrap_within_range() {
        let udp = UdpNat::new(PortRange::new(20000, 20002).unwrap());
        assert_eq!(udp.next_masquerade_address().as_u16(), 20000);
        assert_eq!(udp.next_masquerade_address().as_u16(), 20001);
        assert_eq!(udp.next_masquerade_address().as_u16(), 20002);
        assert_eq!(udp.next_masquerade_address().as_u16(), 20000);
    }

    #[test]
    fn start_signals() {
        let syn = tcp_frame(
            Mac([2, 0, 0, 0, 0, 1]),
            Mac([2, 0, 0, 0, 0, 2]),
            Ipv4Addr::new(10, 0, 0, 5),
            5000,
            Ipv4Addr::new(8, 8, 8, 8),
            80,
            TcpFlags {
                syn: true,
                ..TcpFlags::default()
            },
        );
        let ack = tcp_frame(
            Mac([2, 0, 0, 0, 0, 1]),
            Mac([2, 0, 0, 0, 0, 2]),
            Ipv4Addr::new(10, 0, 0, 5),
            5000,
            Ipv4Addr::new(8, 8, 8, 8),
            80,
            TcpFlags {
                ack: true,
                ..TcpFlags::default()
            },
        );
        let udp = udp_frame(
            Mac([2, 0, 0, 0, 0, 1]),
            Mac([2, 0, 0, 0, 0, 2]),
            Ipv4Addr::new(10, 0, 0, 7),
            6000,
            Ipv4Addr::new(1, 1, 1, 1),
            53,
        );
        assert!(TcpNat::signals_start_of_connection(&syn));
        assert!(!TcpNat::signals_start_of_connection(&ack));
        assert!(UdpNat::signals_start_of_connection(&udp));
        assert!(!TcpNat::matches(&udp));
        assert!(TcpNat::source_address(&udp).is_none());
        assert_eq!(TcpNat::source_address(&syn).map(|p| p.as_u16()), Some(5000));
        assert_eq!(
            UdpNat::destination_address(&udp).map(|p| p.as_u16()),
            Some(53)
        );
    }
}
