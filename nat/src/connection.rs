// SPDX-License-Identifier: Apache-2.0

//! One tracked flow and its shared mutable state.

use crate::node::Node;
use crate::protocol::NatProtocol;
use crate::transport::{Direction, TransportState};
use net::packet::Packet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// A last-activity timestamp updatable from several packet-handling threads
/// without a lock.
///
/// Stored as milliseconds since a per-connection epoch in an `AtomicU64`;
/// refreshes use `fetch_max` so the timestamp never moves backward when
/// packets of the same flow race each other.
#[derive(Debug)]
struct LastUsed {
    epoch: Instant,
    offset_millis: AtomicU64,
}

impl LastUsed {
    fn now() -> LastUsed {
        LastUsed {
            epoch: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    fn refresh(&self) {
        let elapsed = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.offset_millis.fetch_max(elapsed, Ordering::Relaxed);
    }

    fn get(&self) -> Instant {
        self.epoch + Duration::from_millis(self.offset_millis.load(Ordering::Relaxed))
    }
}

/// One tracked flow: the true inside endpoint, the outside peer, the
/// masquerade endpoint presented in the inside endpoint's place, the
/// protocol lifecycle state, and the last time a packet matched.
#[derive(Debug)]
pub struct NatConnection<P: NatProtocol> {
    inside: Node<P::Addr>,
    outside: Node<P::Addr>,
    nat: Node<P::Addr>,
    state: Mutex<P::State>,
    last_used: LastUsed,
}

impl<P: NatProtocol> NatConnection<P> {
    /// A fresh connection, last used now.
    #[must_use]
    pub fn new(
        inside: Node<P::Addr>,
        outside: Node<P::Addr>,
        nat: Node<P::Addr>,
        initial_state: P::State,
    ) -> NatConnection<P> {
        NatConnection {
            inside,
            outside,
            nat,
            state: Mutex::new(initial_state),
            last_used: LastUsed::now(),
        }
    }

    /// The true inside endpoint.
    #[must_use]
    pub fn inside(&self) -> Node<P::Addr> {
        self.inside
    }

    /// The outside peer.
    #[must_use]
    pub fn outside(&self) -> Node<P::Addr> {
        self.outside
    }

    /// The masquerade endpoint.
    #[must_use]
    pub fn nat(&self) -> Node<P::Addr> {
        self.nat
    }

    /// Account for one packet of this flow: advance the lifecycle state and
    /// refresh the last-activity timestamp.
    pub fn received_packet(&self, packet: &Packet, direction: Direction) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .update(packet, direction);
        self.last_used.refresh();
    }

    /// True iff the protocol considers this connection finished.
    #[must_use]
    pub fn can_be_closed(&self, now: Instant) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .can_be_closed(now)
    }

    /// When a packet last matched this connection.
    #[must_use]
    pub fn last_used(&self) -> Instant {
        self.last_used.get()
    }
}
