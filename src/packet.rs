use alloc::vec::Vec;

/// A timestamped raw sensor payload.
///
/// The storage is meant to be reused across a whole replay session: it only
/// ever grows (to the largest payload seen) and is released when the packet
/// is dropped. Storage size and logical payload length are tracked
/// separately.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Packet {
    /// Source timestamp
    pub timestamp: u32,
    /// Source sequence number, in log order but not necessarily monotonic
    pub sequence: u32,
    storage: Vec<u8>,
    length: usize,
}

impl Packet {
    /// Empty packet with `capacity` bytes of storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: alloc::vec![0; capacity],
            ..Default::default()
        }
    }

    /// Packet holding a copy of `payload`.
    pub fn new(timestamp: u32, sequence: u32, payload: &[u8]) -> Self {
        let mut p = Self::default();
        p.set(timestamp, sequence, payload);
        p
    }

    /// Replace header and payload, growing the storage if needed.
    pub fn set(&mut self, timestamp: u32, sequence: u32, payload: &[u8]) {
        self.storage(payload.len()).copy_from_slice(payload);
        self.commit(timestamp, sequence, payload.len());
    }

    /// The current payload.
    pub fn payload(&self) -> &[u8] {
        &self.storage[..self.length]
    }

    /// Logical payload length in bytes
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Size of the storage. Never decreases.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Storage for a payload of `size` bytes.
    ///
    /// Grows (reallocates) if the current storage is smaller. Does not touch
    /// the logical length.
    pub(crate) fn storage(&mut self, size: usize) -> &mut [u8] {
        if self.storage.len() < size {
            log::trace!("growing packet storage {} -> {size}", self.storage.len());
            self.storage.resize(size, 0);
        }
        &mut self.storage[..size]
    }

    /// Publish a payload previously written through [`Packet::storage()`].
    pub(crate) fn commit(&mut self, timestamp: u32, sequence: u32, length: usize) {
        debug_assert!(length <= self.storage.len());
        self.timestamp = timestamp;
        self.sequence = sequence;
        self.length = length;
    }
}
