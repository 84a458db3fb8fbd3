//! ## flowext-core::alloc::stats
//! **Extension buffer statistics**
//!
//! Process-wide counters for buffer growth, reclamation and `ensure`
//! outcomes. Updated with relaxed atomics from any thread.

use std::sync::atomic::{AtomicU64, Ordering};

static GLOBAL_STATS: ExtStats = ExtStats::new();

/// The process-wide statistics instance.
#[inline]
pub fn global() -> &'static ExtStats {
    &GLOBAL_STATS
}

/// Thread-safe statistics tracker.
pub struct ExtStats {
    buffers_allocated: AtomicU64,
    in_place_growths: AtomicU64,
    relocations: AtomicU64,
    buffers_retired: AtomicU64,
    buffers_released: AtomicU64,
    records_attached: AtomicU64,
    too_late: AtomicU64,
    prerequisite_failures: AtomicU64,
    capacity_exceeded: AtomicU64,
    allocation_failures: AtomicU64,
}

/// Point-in-time copy of [`ExtStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub buffers_allocated: u64,
    pub in_place_growths: u64,
    pub relocations: u64,
    pub buffers_retired: u64,
    pub buffers_released: u64,
    pub records_attached: u64,
    pub too_late: u64,
    pub prerequisite_failures: u64,
    pub capacity_exceeded: u64,
    pub allocation_failures: u64,
}

impl StatsSnapshot {
    /// Named counters, in a stable order.
    pub fn counters(&self) -> [(&'static str, u64); 10] {
        [
            ("buffers_allocated", self.buffers_allocated),
            ("in_place_growths", self.in_place_growths),
            ("relocations", self.relocations),
            ("buffers_retired", self.buffers_retired),
            ("buffers_released", self.buffers_released),
            ("records_attached", self.records_attached),
            ("too_late", self.too_late),
            ("prerequisite_failures", self.prerequisite_failures),
            ("capacity_exceeded", self.capacity_exceeded),
            ("allocation_failures", self.allocation_failures),
        ]
    }
}

impl ExtStats {
    /// Creates a tracker with all counters at zero.
    pub const fn new() -> Self {
        ExtStats {
            buffers_allocated: AtomicU64::new(0),
            in_place_growths: AtomicU64::new(0),
            relocations: AtomicU64::new(0),
            buffers_retired: AtomicU64::new(0),
            buffers_released: AtomicU64::new(0),
            records_attached: AtomicU64::new(0),
            too_late: AtomicU64::new(0),
            prerequisite_failures: AtomicU64::new(0),
            capacity_exceeded: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn increment_buffers_allocated(&self) {
        self.buffers_allocated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_in_place_growths(&self) {
        self.in_place_growths.fetch_add(1, Ordering::Relaxed);
    }

    /// A growth moved the buffer; the old one was handed to reclamation.
    #[inline]
    pub fn increment_relocations(&self) {
        self.relocations.fetch_add(1, Ordering::Relaxed);
        self.buffers_retired.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_buffers_released(&self) {
        self.buffers_released.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_records_attached(&self) {
        self.records_attached.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_too_late(&self) {
        self.too_late.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_prerequisite_failures(&self) {
        self.prerequisite_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_capacity_exceeded(&self) {
        self.capacity_exceeded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_allocation_failures(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_allocated: self.buffers_allocated.load(Ordering::Relaxed),
            in_place_growths: self.in_place_growths.load(Ordering::Relaxed),
            relocations: self.relocations.load(Ordering::Relaxed),
            buffers_retired: self.buffers_retired.load(Ordering::Relaxed),
            buffers_released: self.buffers_released.load(Ordering::Relaxed),
            records_attached: self.records_attached.load(Ordering::Relaxed),
            too_late: self.too_late.load(Ordering::Relaxed),
            prerequisite_failures: self.prerequisite_failures.load(Ordering::Relaxed),
            capacity_exceeded: self.capacity_exceeded.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for ExtStats {
    fn default() -> Self {
        Self::new()
    }
}
