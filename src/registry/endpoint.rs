//! Endpoint addressing
//!
//! An [`EndpointId`] names one message sink (in practice, one connection)
//! for as long as it is registered with a [`MessageRouter`](super::MessageRouter).

/// Opaque address of a message sink
///
/// Ids are handed out by the router from a monotonic counter, so an id is
/// never reused within one router's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(u64);

impl EndpointId {
    /// Wrap a raw id
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EndpointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(EndpointId::from_raw(42).to_string(), "#42");
    }

    #[test]
    fn test_hash_eq() {
        let mut set = HashSet::new();
        set.insert(EndpointId::from_raw(1));
        set.insert(EndpointId::from_raw(1));
        set.insert(EndpointId::from_raw(2));

        assert_eq!(set.len(), 2);
        assert_eq!(EndpointId::from_raw(2).as_u64(), 2);
    }
}
