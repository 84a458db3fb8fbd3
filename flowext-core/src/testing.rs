//! Minimal flow object for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::align::WORD;
use crate::alloc::SizeClassAllocator;
use crate::ext::ExtCell;
use crate::object::{FlowObject, SideSlot, SlotKind};

pub(crate) const SIDE_SLOT_SIZE: usize = 32;

#[derive(Debug, Error)]
#[error("side slot refused")]
pub(crate) struct SlotRefused;

pub(crate) struct TestFlow {
    pub id: u64,
    pub confirmed: AtomicBool,
    pub ext: ExtCell,
    pub refuse_slots: bool,
}

impl TestFlow {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            confirmed: AtomicBool::new(false),
            ext: ExtCell::new(),
            refuse_slots: false,
        }
    }

    pub fn confirm(&self) {
        self.confirmed.store(true, Ordering::Release);
    }

    /// Appends `size` bytes of `byte` as if another subsystem owned them.
    pub fn prefill(&self, size: usize, byte: u8) {
        let guard = crossbeam::epoch::pin();
        let value = u64::from_le_bytes([byte; WORD]);
        let mut writer = self.ext.writer();
        let base = writer.current(&guard).map_or(0, |b| b.used());
        writer
            .grow(base + size, &SizeClassAllocator::exact(), &guard, |tail| {
                let mut offset = tail.start();
                while offset < tail.end() {
                    tail.store_word(offset, value);
                    offset += WORD;
                }
            })
            .expect("prefill allocation");
    }
}

impl FlowObject for TestFlow {
    type SlotError = SlotRefused;

    fn identity(&self) -> u64 {
        self.id
    }

    fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    fn extension(&self) -> &ExtCell {
        &self.ext
    }

    fn side_slot(&self, _kind: SlotKind) -> Result<SideSlot, SlotRefused> {
        if self.refuse_slots {
            return Err(SlotRefused);
        }
        Ok(SideSlot {
            size: SIDE_SLOT_SIZE,
            align: WORD,
        })
    }
}
