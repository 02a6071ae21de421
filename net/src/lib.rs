// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(missing_docs, clippy::all, clippy::pedantic)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Strictly typed views over the network data a middlebox touches.
//!
//! The heavy lifting of wire-format parsing is delegated to [`etherparse`];
//! this crate owns the newtypes ([`eth::Mac`], [`tcp::TcpPort`],
//! [`udp::UdpPort`], [`interface::InterfaceId`]) and the [`packet::Packet`]
//! view that packet processors mutate in place.

pub mod eth;
pub mod interface;
pub mod packet;
pub mod tcp;
pub mod udp;
