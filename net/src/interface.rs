// SPDX-License-Identifier: Apache-2.0

//! Network interface numbering and the interface directory.
//!
//! Middleboxes address the interfaces they sit between by small integer
//! numbers assigned by the capture layer. Interface `0` faces "outside" by
//! convention; the capture layer owns the mapping from numbers to devices,
//! and exposes each device's hardware address through an [`InterfaceMap`].

use crate::eth::Mac;
use ahash::RandomState;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// The number of a network interface attached to a middlebox.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceId(i32);

impl InterfaceId {
    /// The outside-facing interface. Interface `0` faces outside by convention.
    pub const OUTSIDE: InterfaceId = InterfaceId(0);

    /// A sentinel for "no interface". Never a legal forwarding target.
    pub const NONE: InterfaceId = InterfaceId(-1);

    /// An interface number assigned by the capture layer.
    #[must_use]
    #[allow(clippy::cast_lossless)] // u16 to i32 in const context
    pub const fn new(index: u16) -> InterfaceId {
        InterfaceId(index as i32)
    }

    /// The interface index, or `None` for the [`InterfaceId::NONE`] sentinel.
    #[must_use]
    pub fn index(self) -> Option<u16> {
        u16::try_from(self.0).ok()
    }
}

impl Display for InterfaceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if *self == InterfaceId::NONE {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// The interface directory: interface number to hardware address.
#[derive(Debug, Default, Clone)]
pub struct InterfaceMap {
    macs: HashMap<InterfaceId, Mac, RandomState>,
}

impl InterfaceMap {
    /// An empty directory.
    #[must_use]
    pub fn new() -> InterfaceMap {
        InterfaceMap::default()
    }

    /// Record the hardware address of `interface`, replacing any previous entry.
    pub fn insert(&mut self, interface: InterfaceId, mac: Mac) {
        self.macs.insert(interface, mac);
    }

    /// The hardware address of `interface`, if the directory knows it.
    #[must_use]
    pub fn mac_of(&self, interface: InterfaceId) -> Option<Mac> {
        self.macs.get(&interface).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::{InterfaceId, InterfaceMap};
    use crate::eth::Mac;

    #[test]
    fn directory_lookup() {
        let mut map = InterfaceMap::new();
        map.insert(InterfaceId::OUTSIDE, Mac([0x02, 0, 0, 0, 0, 1]));
        map.insert(InterfaceId::new(1), Mac([0x02, 0, 0, 0, 0, 2]));
        assert_eq!(
            map.mac_of(InterfaceId::OUTSIDE),
            Some(Mac([0x02, 0, 0, 0, 0, 1]))
        );
        assert_eq!(map.mac_of(InterfaceId::new(7)), None);
    }

    #[test]
    fn sentinel_has_no_index() {
        assert_eq!(InterfaceId::NONE.index(), None);
        assert_eq!(InterfaceId::new(3).index(), Some(3));
        assert_eq!(format!("{}", InterfaceId::NONE), "none");
    }
}
