use std::ops::Deref;

use crate::ext::SlotView;

/// The validated payload of a flow extension record.
///
/// Borrowed from the buffer snapshot the lookup saw; valid while the guard
/// used for the lookup stays pinned.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'g> {
    view: SlotView<'g>,
    offset: usize,
}

impl<'g> Payload<'g> {
    pub(crate) fn new(view: SlotView<'g>, offset: usize) -> Self {
        Self { view, offset }
    }

    /// Byte offset of the payload within its buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn view(&self) -> SlotView<'g> {
        self.view
    }
}

impl<'g> Deref for Payload<'g> {
    type Target = SlotView<'g>;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}
