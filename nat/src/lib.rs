// SPDX-License-Identifier: Apache-2.0

#![deny(clippy::all, clippy::pedantic)]
#![deny(rustdoc::all)]

//! Stateful Network Address Translation for middlebox pipelines.
//!
//! This package implements a [`pipeline::PacketProcessor`] that masquerades
//! TCP and UDP connections originated by inside nodes behind a single
//! outside-facing address, keeps per-connection state (including a
//! simplified TCP half-close tracker), and garbage-collects mappings that
//! closed or went idle.
//!
//! Connections are created only by inside-to-outside packets that signal
//! connection start (a TCP SYN, or any UDP packet), and are removed only by
//! [`Nat::garbage_collect`], never synchronously on close. Two known
//! limitations are inherited by design: a masquerade port is allocated from
//! a serialized counter but never checked against live connections, and a
//! TCP RST does not tear a connection down.
//!
//! # Example
//!
//! ```
//! # use net::eth::Mac;
//! # use net::interface::{InterfaceId, InterfaceMap};
//! use midbox_nat::{Nat, NatConfig, PortRange};
//! use std::net::Ipv4Addr;
//!
//! let mut interfaces = InterfaceMap::new();
//! interfaces.insert(InterfaceId::OUTSIDE, Mac([0x02, 0, 0, 0, 0, 0x10]));
//! let config = NatConfig::new(
//!     Ipv4Addr::new(192, 0, 2, 1),
//!     Mac([0x02, 0, 0, 0, 0, 0x20]),
//!     PortRange::new(10_000, 19_999)?,
//!     PortRange::new(20_000, 29_999)?,
//! );
//! let nat = Nat::new(config, &interfaces)?;
//! # let _ = nat;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use net::eth::Mac;
use net::interface::{InterfaceId, InterfaceMap};
use net::packet::{Packet, TransportProtocol};
use pipeline::{ForwardingDecision, PacketProcessor};
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

pub mod connection;
pub mod encap;
pub mod engine;
pub mod node;
pub mod protocol;
pub mod transport;

use engine::NatEngine;
use protocol::{TcpNat, UdpNat};

/// How often a driver should call [`Nat::garbage_collect`].
pub const RECOMMENDED_GC_PERIOD: Duration = Duration::from_secs(1);

/// Errors which can occur when building a [`Nat`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NatError {
    /// The interface directory has no entry for the outside interface, so
    /// no masquerade link address can be constructed.
    #[error("no hardware address known for the outside interface")]
    UnknownOutsideInterface,
}

/// Errors which can occur when constructing a [`PortRange`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PortRangeError {
    /// Port zero is reserved and cannot start a pool.
    #[error("port range must not start at zero")]
    ZeroStart,
    /// The range is empty.
    #[error("port range start {start} exceeds end {end}")]
    StartAfterEnd {
        /// The offending start port.
        start: u16,
        /// The offending end port.
        end: u16,
    },
}

/// An inclusive ephemeral-port pool `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// The pool `[start, end]`.
    ///
    /// # Errors
    ///
    /// Rejects a zero start port and an empty range.
    pub const fn new(start: u16, end: u16) -> Result<PortRange, PortRangeError> {
        if start == 0 {
            return Err(PortRangeError::ZeroStart);
        }
        if start > end {
            return Err(PortRangeError::StartAfterEnd { start, end });
        }
        Ok(PortRange { start, end })
    }

    /// The first port of the pool.
    #[must_use]
    pub const fn start(self) -> u16 {
        self.start
    }

    /// The last port of the pool.
    #[must_use]
    pub const fn end(self) -> u16 {
        self.end
    }
}

/// Construction parameters for a [`Nat`].
#[derive(Debug, Clone, Copy)]
pub struct NatConfig {
    /// The outside-facing address inside traffic is masqueraded as.
    pub outside_address: Ipv4Addr,
    /// Link address of the next hop on the outside network.
    pub outside_hop_mac: Mac,
    /// How long an idle connection is retained.
    pub inactivity_timeout: Duration,
    /// Ephemeral-port pool for TCP masquerading.
    pub tcp_ports: PortRange,
    /// TIME-WAIT-equivalent duration recorded by the TCP close tracker.
    pub tcp_time_wait: Duration,
    /// Ephemeral-port pool for UDP masquerading.
    pub udp_ports: PortRange,
}

impl NatConfig {
    /// Default idle retention.
    pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default TIME-WAIT-equivalent duration.
    pub const DEFAULT_TCP_TIME_WAIT: Duration = Duration::from_secs(4 * 60);

    /// A configuration with default timeouts.
    #[must_use]
    pub fn new(
        outside_address: Ipv4Addr,
        outside_hop_mac: Mac,
        tcp_ports: PortRange,
        udp_ports: PortRange,
    ) -> NatConfig {
        NatConfig {
            outside_address,
            outside_hop_mac,
            inactivity_timeout: NatConfig::DEFAULT_INACTIVITY_TIMEOUT,
            tcp_ports,
            tcp_time_wait: NatConfig::DEFAULT_TCP_TIME_WAIT,
            udp_ports,
        }
    }
}

/// A stateful TCP+UDP NAT middlebox.
///
/// Owns one [`NatEngine`] per protocol and dispatches each packet to the
/// engine matching its transport.
#[derive(Debug)]
pub struct Nat {
    pub(crate) tcp: NatEngine<TcpNat>,
    pub(crate) udp: NatEngine<UdpNat>,
}

impl Nat {
    /// Build a NAT from `config`, resolving the outside interface's
    /// hardware address from `interfaces`.
    ///
    /// # Errors
    ///
    /// Fails with [`NatError::UnknownOutsideInterface`] if `interfaces` has
    /// no entry for [`InterfaceId::OUTSIDE`].
    pub fn new(config: NatConfig, interfaces: &InterfaceMap) -> Result<Nat, NatError> {
        let outside_interface_mac = interfaces
            .mac_of(InterfaceId::OUTSIDE)
            .ok_or(NatError::UnknownOutsideInterface)?;
        Ok(Nat {
            tcp: NatEngine::new(
                TcpNat::new(config.tcp_ports, config.tcp_time_wait),
                config.outside_address,
                config.outside_hop_mac,
                outside_interface_mac,
                config.inactivity_timeout,
            ),
            udp: NatEngine::new(
                UdpNat::new(config.udp_ports),
                config.outside_address,
                config.outside_hop_mac,
                outside_interface_mac,
                config.inactivity_timeout,
            ),
        })
    }

    /// Sweep both protocols' tables. The TCP and UDP tables are swept
    /// independently, not transactionally.
    pub fn garbage_collect(&self, now: Instant) {
        self.tcp.garbage_collect(now);
        self.udp.garbage_collect(now);
    }
}

impl PacketProcessor for Nat {
    fn handle_packet(&self, packet: &mut Packet, ingress: InterfaceId) -> ForwardingDecision {
        match packet.transport_protocol() {
            TransportProtocol::Tcp => self.tcp.handle_packet(packet, ingress),
            TransportProtocol::Udp => self.udp.handle_packet(packet, ingress),
        }
    }
}
