// SPDX-License-Identifier: Apache-2.0

//! TCP port type

use std::fmt::{Display, Formatter};
use std::num::NonZero;

/// A TCP port number.
///
/// Zero is not a legal TCP port, and the niche is used to keep
/// `Option<TcpPort>` the size of a `u16`.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct TcpPort(NonZero<u16>);

/// Errors which can occur when constructing a [`TcpPort`]
#[repr(transparent)]
#[derive(Debug, thiserror::Error)]
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum TcpPortError {
    /// port zero is reserved
    #[error("port must be non-zero")]
    Zero,
}

impl TcpPort {
    /// Create a [`TcpPort`].
    #[must_use]
    pub const fn new(port: NonZero<u16>) -> TcpPort {
        TcpPort(port)
    }

    /// Create a [`TcpPort`] from a raw port number.
    ///
    /// # Errors
    ///
    /// Will return an error if the submitted raw port number is zero.
    pub const fn new_checked(port: u16) -> Result<TcpPort, TcpPortError> {
        match NonZero::new(port) {
            None => Err(TcpPortError::Zero),
            Some(port) => Ok(TcpPort(port)),
        }
    }

    /// The port as a raw `u16`.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0.get()
    }
}

impl From<TcpPort> for u16 {
    fn from(port: TcpPort) -> Self {
        port.0.get()
    }
}

impl TryFrom<u16> for TcpPort {
    type Error = TcpPortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new_checked(value)
    }
}

impl Display for TcpPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.get())
    }
}

#[cfg(test)]
mod tests {
    use super::{TcpPort, TcpPortError};

    #[test]
    fn zero_port_rejected() {
        assert_eq!(TcpPort::new_checked(0), Err(TcpPortError::Zero));
        assert_eq!(TcpPort::new_checked(443).map(TcpPort::as_u16), Ok(443));
    }
}
