//! ## flowext-core::store
//! **Attaching and finding the flow extension record**
//!
//! [`ExtensionStore::ensure`] appends a descriptor plus zeroed payload to a
//! flow object's extension buffer while the object is still unconfirmed.
//! [`ExtensionStore::lookup`] re-derives the descriptor position from the
//! compact length and only returns the payload if magic and owner tag match.
//!
//! ```
//! use flowext_core::prelude::*;
//! # use std::sync::atomic::{AtomicBool, Ordering};
//! # struct Flow { id: u64, confirmed: AtomicBool, ext: ExtCell }
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("no side slots")]
//! # struct NoSlots;
//! # impl FlowObject for Flow {
//! #     type SlotError = NoSlots;
//! #     fn identity(&self) -> u64 { self.id }
//! #     fn is_confirmed(&self) -> bool { self.confirmed.load(Ordering::Acquire) }
//! #     fn extension(&self) -> &ExtCell { &self.ext }
//! #     fn side_slot(&self, _: SlotKind) -> Result<SideSlot, NoSlots> { Err(NoSlots) }
//! # }
//! let flow = Flow { id: 7, confirmed: AtomicBool::new(false), ext: ExtCell::new() };
//! let store = ExtensionStore::new(Layout::default());
//!
//! store.ensure(&flow).unwrap();
//!
//! let guard = flowext_core::pin();
//! let payload = store.lookup(&flow, &guard).unwrap();
//! assert!(payload.is_zeroed());
//! ```

use crossbeam::epoch::{self, Guard};
use tracing::{debug, error, trace, warn};

use crate::align::{checked_align_up, WORD};
use crate::alloc::{stats, BlobAllocator, SizeClassAllocator};
use crate::error::ExtError;
use crate::ext::GrowError;
use crate::layout::{Layout, ALLOC_GRANULARITY, BASE_OFFSET};
use crate::object::{FlowObject, SlotKind};
use crate::record::{Payload, SlotDescriptor};

/// Attaches and validates flow extension records of one [`Layout`].
#[derive(Debug, Clone)]
pub struct ExtensionStore<A = SizeClassAllocator> {
    layout: Layout,
    prerequisite: Option<SlotKind>,
    allocator: A,
}

impl ExtensionStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            prerequisite: None,
            allocator: SizeClassAllocator::default(),
        }
    }
}

impl<A: BlobAllocator> ExtensionStore<A> {
    /// Requires side slot `kind` to exist before the record is appended.
    pub fn with_prerequisite(mut self, kind: SlotKind) -> Self {
        self.prerequisite = Some(kind);
        self
    }

    /// Replaces the buffer allocator used for growth.
    pub fn with_allocator<B: BlobAllocator>(self, allocator: B) -> ExtensionStore<B> {
        ExtensionStore {
            layout: self.layout,
            prerequisite: self.prerequisite,
            allocator,
        }
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn prerequisite(&self) -> Option<SlotKind> {
        self.prerequisite
    }

    /// Makes sure `object` carries a flow extension record.
    ///
    /// Succeeds without side effects if the record is already there. On error
    /// the object's extension buffer is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`ExtError::TooLateToAttach`] once the object is confirmed
    /// - [`ExtError::PrerequisiteFailed`] if the object refuses the prerequisite side slot
    /// - [`ExtError::CapacityExceeded`] if the aligned offset passes the layout's maximum
    /// - [`ExtError::AllocationFailed`] if the grown buffer cannot be allocated
    pub fn ensure<O: FlowObject>(&self, object: &O) -> Result<(), ExtError> {
        let stats = stats::global();
        let identity = object.identity();
        let guard = epoch::pin();

        if self.lookup(object, &guard).is_some() {
            return Ok(());
        }

        if object.is_confirmed() {
            stats.increment_too_late();
            warn!(identity, "flow already confirmed, not attaching extension");
            return Err(ExtError::TooLateToAttach);
        }

        // Described up front; registered together with the record below.
        let prerequisite = match self.prerequisite {
            Some(kind) if !object.has_side_slot(kind) => match object.side_slot(kind) {
                Ok(slot) => Some((kind, slot)),
                Err(err) => {
                    stats.increment_prerequisite_failures();
                    warn!(identity, %kind, error = %err, "prerequisite side slot refused");
                    return Err(ExtError::PrerequisiteFailed {
                        kind,
                        reason: err.to_string(),
                    });
                }
            },
            _ => None,
        };

        let mut writer = object.extension().writer();
        // Another writer may have attached while we were unlocked.
        if self.lookup(object, &guard).is_some() {
            return Ok(());
        }

        let current = writer.current(&guard);
        let base = current.map_or(BASE_OFFSET, |blob| blob.used());
        let prerequisite =
            prerequisite.filter(|(kind, _)| current.and_then(|b| b.slot_offset(*kind)).is_none());

        let (slot, record_base) = match prerequisite {
            Some((kind, side)) => {
                let slot_offset = checked_align_up(base, side.align.max(WORD))
                    .ok_or_else(|| self.capacity_exceeded(identity, base))?;
                let end = slot_offset
                    .checked_add(side.size)
                    .ok_or_else(|| self.capacity_exceeded(identity, slot_offset))?;
                (Some((kind, slot_offset)), end)
            }
            None => (None, base),
        };

        let max = self.layout.max_offset();
        let (offset, compact) = match checked_align_up(record_base, self.layout.scale_factor()) {
            Some(offset) if offset <= max => match self.layout.compact_from_offset(offset) {
                Some(compact) => (offset, compact),
                None => return Err(self.capacity_exceeded(identity, offset)),
            },
            Some(offset) => return Err(self.capacity_exceeded(identity, offset)),
            None => return Err(self.capacity_exceeded(identity, record_base)),
        };
        // The slot precedes the record, so it is within the maximum as well.
        let slot = match slot {
            Some((kind, slot_offset)) => match u16::try_from(slot_offset) {
                Ok(encoded) if encoded != u16::MAX => Some((kind, encoded)),
                _ => return Err(self.capacity_exceeded(identity, slot_offset)),
            },
            None => None,
        };

        let size = offset
            .checked_add(self.layout.record_span())
            .and_then(|end| checked_align_up(end, ALLOC_GRANULARITY))
            .ok_or_else(|| self.capacity_exceeded(identity, offset))?;

        let payload_len = u32::try_from(self.layout.payload_size())
            .map_err(|_| ExtError::InvalidLayout("payload size out of range"))?;
        let [first, second] = SlotDescriptor::new(identity, payload_len).encode();

        let growth = writer
            .grow(size, &self.allocator, &guard, |tail| {
                if let Some((kind, slot_offset)) = slot {
                    tail.set_slot(kind, slot_offset);
                }
                tail.store_word(offset, first);
                tail.store_word(offset + WORD, second);
                tail.set_compact_len(compact);
            })
            .map_err(|err| match err {
                GrowError::OutOfMemory { size } => {
                    stats.increment_allocation_failures();
                    warn!(identity, size, "extension growth allocation failed");
                    ExtError::AllocationFailed { size }
                }
                GrowError::OutOfRange { offset } => {
                    error!(identity, offset, "record descriptor outside the grown region");
                    ExtError::InvalidLayout("record descriptor outside the grown region")
                }
            })?;

        stats.increment_records_attached();
        debug!(
            identity,
            offset,
            size,
            growth = ?growth.kind,
            "flow extension attached"
        );
        Ok(())
    }

    fn capacity_exceeded(&self, identity: u64, offset: usize) -> ExtError {
        let max = self.layout.max_offset();
        stats::global().increment_capacity_exceeded();
        error!(identity, offset, max, "extension offset beyond the supported maximum");
        ExtError::CapacityExceeded { offset, max }
    }

    /// Finds the payload of `object`'s flow extension record.
    ///
    /// Returns `None` when the object has no buffer, when the recorded
    /// position is out of bounds, or when the descriptor there does not carry
    /// the magic and this object's owner tag.
    pub fn lookup<'g, O: FlowObject>(&self, object: &'g O, guard: &'g Guard) -> Option<Payload<'g>> {
        let blob = object.extension().load(guard)?;
        let offset = self.layout.offset_from_compact(blob.compact_len());
        if offset > self.layout.max_offset() {
            return None;
        }

        let descriptor = SlotDescriptor::read(blob, offset)?;
        if !descriptor.validates(object.identity(), self.layout.payload_size()) {
            trace!(
                identity = object.identity(),
                offset,
                "no flow extension record at recorded offset"
            );
            return None;
        }

        let payload_offset = offset + self.layout.descriptor_span();
        let view = blob.view(payload_offset, self.layout.payload_size())?;
        Some(Payload::new(view, payload_offset))
    }

    /// Convenience wrapper around [`lookup`](Self::lookup) with its own guard.
    pub fn is_attached<O: FlowObject>(&self, object: &O) -> bool {
        let guard = epoch::pin();
        self.lookup(object, &guard).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{owner_tag, MAGIC};
    use crate::testing::{TestFlow, SIDE_SLOT_SIZE};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use tracing_test::traced_test;

    #[derive(Default)]
    struct CountingAllocator {
        calls: AtomicUsize,
    }

    impl BlobAllocator for CountingAllocator {
        fn allocate(&self, size: usize) -> Option<Box<[AtomicU64]>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            SizeClassAllocator::exact().allocate(size)
        }
    }

    struct NoMemory;

    impl BlobAllocator for NoMemory {
        fn allocate(&self, _size: usize) -> Option<Box<[AtomicU64]>> {
            None
        }
    }

    fn layout() -> Layout {
        Layout::new(64, 255 * 64, 48).unwrap()
    }

    #[test]
    fn test_fresh_object_gets_record_at_base() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(0xabcd);

        store.ensure(&flow).unwrap();

        let guard = epoch::pin();
        let blob = flow.ext.load(&guard).unwrap();
        assert_eq!(blob.compact_len(), 0);
        assert_eq!(blob.used(), 16 + 48);

        let descriptor = SlotDescriptor::read(blob, 0).unwrap();
        assert_eq!(descriptor.magic, MAGIC);
        assert_eq!(descriptor.owner_tag, owner_tag(0xabcd));

        let payload = store.lookup(&flow, &guard).unwrap();
        assert_eq!(payload.offset(), 16);
        assert_eq!(payload.len(), 48);
        assert!(payload.is_zeroed());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(1);

        store.ensure(&flow).unwrap();
        let guard = epoch::pin();
        let first = store.lookup(&flow, &guard).unwrap().as_ptr();
        let bytes = flow.ext.to_bytes();

        store.ensure(&flow).unwrap();
        let second = store.lookup(&flow, &guard).unwrap().as_ptr();

        assert_eq!(first, second);
        assert_eq!(bytes, flow.ext.to_bytes());
    }

    #[test]
    fn test_lookup_without_ensure_is_absent() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(2);
        assert!(!store.is_attached(&flow));

        flow.prefill(128, 0);
        assert!(!store.is_attached(&flow));
    }

    #[test]
    fn test_confirmed_object_is_rejected_untouched() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(3);
        flow.prefill(24, 0x5a);
        flow.confirm();

        let before = flow.ext.to_bytes();
        assert_eq!(store.ensure(&flow), Err(ExtError::TooLateToAttach));
        assert_eq!(before, flow.ext.to_bytes());
        assert!(!store.is_attached(&flow));
    }

    #[test]
    fn test_confirmed_object_with_record_still_succeeds() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(4);
        store.ensure(&flow).unwrap();
        flow.confirm();
        assert_eq!(store.ensure(&flow), Ok(()));
    }

    #[test]
    fn test_growth_preserves_existing_slots() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(5);
        flow.prefill(40, 0xc3);
        let before = flow.ext.to_bytes();

        store.ensure(&flow).unwrap();

        let after = flow.ext.to_bytes();
        assert_eq!(&after[..40], &before[..]);
        // Record starts at the next scale-factor boundary; the gap is zeroed.
        assert!(after[40..64].iter().all(|b| *b == 0));
        let guard = epoch::pin();
        assert_eq!(flow.ext.load(&guard).unwrap().compact_len(), 1);
        assert_eq!(store.lookup(&flow, &guard).unwrap().offset(), 64 + 16);
    }

    #[test]
    fn test_prerequisite_slot_registered_with_record() {
        let kind = SlotKind::new(1).unwrap();
        let store = ExtensionStore::new(layout())
            .with_prerequisite(kind)
            .with_allocator(CountingAllocator::default());
        let flow = TestFlow::new(6);

        store.ensure(&flow).unwrap();

        let guard = epoch::pin();
        let blob = flow.ext.load(&guard).unwrap();
        assert_eq!(blob.slot_offset(kind), Some(0));
        assert_eq!(blob.compact_len(), 1);
        assert!(blob.used() >= 64 + SIDE_SLOT_SIZE);
        assert!(store.lookup(&flow, &guard).is_some());
        // Slot and record arrive in one growth.
        assert_eq!(store.allocator.calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_prerequisite_that_pushes_past_max_leaves_object_untouched() {
        let kind = SlotKind::new(1).unwrap();
        let store = ExtensionStore::new(Layout::new(64, 256, 48).unwrap())
            .with_prerequisite(kind)
            .with_allocator(CountingAllocator::default());
        let flow = TestFlow::new(16);
        // Fits on its own at 256, but not behind a 32 byte side slot at 232.
        flow.prefill(232, 0x31);
        let before = flow.ext.to_bytes();

        let err = store.ensure(&flow).unwrap_err();

        assert_eq!(err, ExtError::CapacityExceeded { offset: 320, max: 256 });
        assert_eq!(store.allocator.calls.load(Ordering::Relaxed), 0);
        assert_eq!(before, flow.ext.to_bytes());
        assert!(!flow.has_side_slot(kind));
    }

    #[test]
    fn test_allocation_failure_does_not_leave_prerequisite_behind() {
        let kind = SlotKind::new(1).unwrap();
        let flow = TestFlow::new(17);
        flow.prefill(8, 0x24);
        let before = flow.ext.to_bytes();

        let store = ExtensionStore::new(layout())
            .with_prerequisite(kind)
            .with_allocator(NoMemory);
        let err = store.ensure(&flow).unwrap_err();

        assert!(matches!(err, ExtError::AllocationFailed { .. }));
        assert_eq!(before, flow.ext.to_bytes());
        assert!(!flow.has_side_slot(kind));
    }

    #[test]
    fn test_prerequisite_failure_leaves_object_untouched() {
        let kind = SlotKind::new(1).unwrap();
        let store = ExtensionStore::new(layout()).with_prerequisite(kind);
        let mut flow = TestFlow::new(7);
        flow.refuse_slots = true;

        let err = store.ensure(&flow).unwrap_err();
        assert!(matches!(err, ExtError::PrerequisiteFailed { kind: k, .. } if k == kind));
        assert!(flow.ext.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_capacity_exceeded_performs_no_allocation() {
        let store = ExtensionStore::new(Layout::new(64, 256, 48).unwrap())
            .with_allocator(CountingAllocator::default());
        let flow = TestFlow::new(8);
        flow.prefill(264, 0x77);
        let before = flow.ext.to_bytes();

        let err = store.ensure(&flow).unwrap_err();

        assert_eq!(err, ExtError::CapacityExceeded { offset: 320, max: 256 });
        assert!(err.is_permanent());
        assert_eq!(store.allocator.calls.load(Ordering::Relaxed), 0);
        assert_eq!(before, flow.ext.to_bytes());
        assert!(logs_contain("extension offset beyond the supported maximum"));
    }

    #[test]
    fn test_offset_exactly_at_max_is_allowed() {
        let store = ExtensionStore::new(Layout::new(64, 256, 48).unwrap());
        let flow = TestFlow::new(9);
        flow.prefill(256, 0x10);

        store.ensure(&flow).unwrap();
        let guard = epoch::pin();
        assert_eq!(flow.ext.load(&guard).unwrap().compact_len(), 4);
        assert!(store.lookup(&flow, &guard).is_some());
    }

    #[test]
    fn test_allocation_failure_is_transient_and_clean() {
        let flow = TestFlow::new(10);
        flow.prefill(8, 0x42);
        let before = flow.ext.to_bytes();

        let failing = ExtensionStore::new(layout()).with_allocator(NoMemory);
        let err = failing.ensure(&flow).unwrap_err();
        assert!(matches!(err, ExtError::AllocationFailed { .. }));
        assert!(err.is_transient());
        assert_eq!(before, flow.ext.to_bytes());

        ExtensionStore::new(layout()).ensure(&flow).unwrap();
        assert!(ExtensionStore::new(layout()).is_attached(&flow));
    }

    #[test]
    fn test_foreign_owner_tag_is_rejected() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(11);
        let [first, second] = SlotDescriptor::new(12, 48).encode();
        let guard = epoch::pin();
        flow.ext
            .writer()
            .grow(16 + 48, &SizeClassAllocator::default(), &guard, |tail| {
                tail.store_word(0, first);
                tail.store_word(8, second);
            })
            .unwrap();

        assert!(store.lookup(&flow, &guard).is_none());
        let blob = flow.ext.load(&guard).unwrap();
        assert!(SlotDescriptor::read(blob, 0).unwrap().validates(12, 48));
    }

    #[test]
    fn test_corrupted_magic_is_rejected() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(13);
        store.ensure(&flow).unwrap();

        let guard = epoch::pin();
        let blob = flow.ext.load(&guard).unwrap();
        let view = blob.view(0, 16).unwrap();
        let corrupted = view.load_u64(0).unwrap() ^ 0xff;
        view.store_u64(0, corrupted);

        assert!(store.lookup(&flow, &guard).is_none());
    }

    #[test]
    fn test_owner_tag_uses_low_identity_bits() {
        let store = ExtensionStore::new(layout());
        let flow = TestFlow::new(14);
        store.ensure(&flow).unwrap();

        let guard = epoch::pin();
        let blob = flow.ext.load(&guard).unwrap();
        let alias = TestFlow::new(14 | (1 << 32));
        assert_eq!(owner_tag(alias.id), owner_tag(flow.id));
        assert_eq!(
            SlotDescriptor::read(blob, 0).map(|d| d.owner_tag),
            Some(14)
        );
    }

    #[test]
    fn test_out_of_bounds_locator_is_absent() {
        let store = ExtensionStore::new(Layout::new(64, 128, 48).unwrap());
        let flow = TestFlow::new(15);
        let guard = epoch::pin();
        flow.ext
            .writer()
            .grow(64, &SizeClassAllocator::default(), &guard, |tail| {
                tail.set_compact_len(3);
            })
            .unwrap();
        assert!(store.lookup(&flow, &guard).is_none());

        flow.ext
            .writer()
            .grow(64, &SizeClassAllocator::default(), &guard, |tail| {
                tail.set_compact_len(1);
            })
            .unwrap();
        // Offset 64 is in range but the descriptor would extend past `used`.
        assert!(store.lookup(&flow, &guard).is_none());
    }
}
