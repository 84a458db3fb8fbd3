//! ## flowext-conntrack::conn
//! **Tracked connection records**
//!
//! A connection starts unconfirmed, private to the code that created it.
//! Extensions may only be added in that phase; confirmation publishes it
//! to the table and freezes the extension layout.

use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::epoch::{self, Guard};
use tracing::{debug, trace};

use flowext_core::align::{align_up, WORD};
use flowext_core::alloc::{BlobAllocator, SizeClassAllocator};
use flowext_core::ext::{ExtCell, GrowError, SlotView};
use flowext_core::{FlowObject, SideSlot, SlotKind};

use crate::error::ConnError;
use crate::ext::ExtKind;

/// Transport protocol numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Proto {
    Tcp,
    Udp,
    Other(u8),
}

impl Proto {
    pub fn number(self) -> u8 {
        match self {
            Proto::Tcp => 6,
            Proto::Udp => 17,
            Proto::Other(n) => n,
        }
    }
}

/// Original-direction tuple identifying a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    pub proto: Proto,
    pub src: SocketAddr,
    pub dst: SocketAddr,
}

impl FlowTuple {
    pub fn new(proto: Proto, src: SocketAddr, dst: SocketAddr) -> Self {
        Self { proto, src, dst }
    }

    /// The reply-direction tuple.
    pub fn reverse(&self) -> Self {
        Self {
            proto: self.proto,
            src: self.dst,
            dst: self.src,
        }
    }
}

impl fmt::Display for FlowTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proto={} {} -> {}", self.proto.number(), self.src, self.dst)
    }
}

/// Identity of a connection, unique for the table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(NonZeroU64);

impl ConnId {
    pub fn new(id: u64) -> Option<Self> {
        NonZeroU64::new(id).map(Self)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub struct Conn {
    id: ConnId,
    tuple: FlowTuple,
    confirmed: AtomicBool,
    ext: ExtCell,
    allocator: Arc<dyn BlobAllocator>,
}

impl Conn {
    /// Creates an unconfirmed connection with no extensions.
    pub fn new(id: ConnId, tuple: FlowTuple) -> Self {
        Self::with_allocator(id, tuple, Arc::new(SizeClassAllocator::default()))
    }

    pub fn with_allocator(id: ConnId, tuple: FlowTuple, allocator: Arc<dyn BlobAllocator>) -> Self {
        Self {
            id,
            tuple,
            confirmed: AtomicBool::new(false),
            ext: ExtCell::new(),
            allocator,
        }
    }

    #[inline]
    pub fn id(&self) -> ConnId {
        self.id
    }

    #[inline]
    pub fn tuple(&self) -> &FlowTuple {
        &self.tuple
    }

    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed.load(Ordering::Acquire)
    }

    /// Marks the connection confirmed. Returns `false` if it already was.
    pub(crate) fn confirm(&self) -> bool {
        !self.confirmed.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn extension(&self) -> &ExtCell {
        &self.ext
    }

    /// Adds the side slot `kind` and returns its byte offset. Adding an
    /// existing slot returns the existing offset.
    pub fn ext_add(&self, kind: ExtKind) -> Result<usize, ConnError> {
        let guard = epoch::pin();
        let mut writer = self.ext.writer();
        let current = writer.current(&guard);

        if let Some(offset) = current.and_then(|blob| blob.slot_offset(kind.slot())) {
            return Ok(offset);
        }
        if self.is_confirmed() {
            return Err(ConnError::Confirmed(kind));
        }

        let ty = kind.ext_type();
        let offset = align_up(current.map_or(0, |blob| blob.used()), ty.align.max(WORD));
        let slot_offset = u16::try_from(offset)
            .ok()
            .filter(|off| *off != u16::MAX)
            .ok_or(ConnError::ExtTooLarge { kind, offset })?;
        let size = offset + align_up(ty.size, WORD);

        let growth = writer
            .grow(size, self.allocator.as_ref(), &guard, |tail| {
                tail.set_slot(kind.slot(), slot_offset)
            })
            .map_err(|err| match err {
                GrowError::OutOfMemory { size } => ConnError::NoMemory { kind, size },
                GrowError::OutOfRange { offset } => ConnError::ExtTooLarge { kind, offset },
            })?;
        debug!(conn = %self.id, %kind, offset, growth = ?growth.kind, "extension added");
        Ok(offset)
    }

    /// View of side slot `kind`, if present.
    pub fn ext_find<'g>(&'g self, kind: ExtKind, guard: &'g Guard) -> Option<SlotView<'g>> {
        let blob = self.ext.load(guard)?;
        let offset = blob.slot_offset(kind.slot())?;
        blob.view(offset, kind.ext_type().size)
    }

    pub fn has_ext(&self, kind: ExtKind) -> bool {
        let guard = epoch::pin();
        self.ext_find(kind, &guard).is_some()
    }
}

impl FlowObject for Conn {
    type SlotError = ConnError;

    fn identity(&self) -> u64 {
        self.id.get()
    }

    fn is_confirmed(&self) -> bool {
        Conn::is_confirmed(self)
    }

    fn extension(&self) -> &ExtCell {
        &self.ext
    }

    fn side_slot(&self, slot: SlotKind) -> Result<SideSlot, ConnError> {
        let kind = ExtKind::from_slot(slot).ok_or(ConnError::UnknownSlot(slot))?;
        if self.is_confirmed() {
            return Err(ConnError::Confirmed(kind));
        }
        let ty = kind.ext_type();
        trace!(conn = %self.id, %kind, size = ty.size, "describing side slot");
        Ok(SideSlot {
            size: ty.size,
            align: ty.align,
        })
    }
}

impl fmt::Debug for Conn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("id", &self.id)
            .field("tuple", &self.tuple)
            .field("confirmed", &self.is_confirmed())
            .field("ext", &self.ext)
            .finish()
    }
}
