//! A sequence of octets

use bytes::Bytes;

/// A sequence of octets (vbin8 / vbin32).
///
/// Backed by [`Bytes`] so that frame payloads can be sliced without copying.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Binary(Bytes);

impl Binary {
    /// Creates an empty binary
    pub fn new() -> Self {
        Self(Bytes::new())
    }

    /// Length in octets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the binary holds no octets
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The octets as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the binary and returns the inner [`Bytes`]
    pub fn into_inner(self) -> Bytes {
        self.0
    }
}

impl AsRef<[u8]> for Binary {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::ops::Deref for Binary {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Bytes> for Binary {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Binary {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<&[u8]> for Binary {
    fn from(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }
}

impl From<Binary> for Bytes {
    fn from(binary: Binary) -> Self {
        binary.0
    }
}
