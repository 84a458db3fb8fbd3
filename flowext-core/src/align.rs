//! ## flowext-core::align
//! **Power-of-two offset arithmetic**
//!
//! Every offset inside an extension buffer is a multiple of [`WORD`]; slot
//! offsets are further rounded to the layout's scale factor.

/// Width of one storage word. Buffers are allocated and zeroed in words.
pub const WORD: usize = 8;

/// Rounds `n` up to the next multiple of `alignment`.
///
/// ```
/// use flowext_core::align::align_up;
///
/// assert_eq!(align_up(0, 8), 0);
/// assert_eq!(align_up(1, 8), 8);
/// assert_eq!(align_up(64, 64), 64);
/// assert_eq!(align_up(65, 64), 128);
/// ```
///
/// # Panics
///
/// In debug builds, if `alignment` is not a power of two.
#[inline]
pub const fn align_up(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}

/// Rounds `n` down to the previous multiple of `alignment`.
#[inline]
pub const fn align_down(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    n & !(alignment - 1)
}

#[inline]
pub const fn is_aligned(n: usize, alignment: usize) -> bool {
    align_down(n, alignment) == n
}

/// Like [`align_up`], but returns `None` instead of wrapping.
#[inline]
pub fn checked_align_up(n: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    n.checked_add(alignment - 1).map(|v| v & !(alignment - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_align_up_boundaries() {
        assert_eq!(align_up(0, 64), 0);
        assert_eq!(align_up(1, 64), 64);
        assert_eq!(align_up(63, 64), 64);
        assert_eq!(align_up(64, 64), 64);
        assert_eq!(align_up(24, 8), 24);
    }

    #[test]
    fn test_align_down_and_is_aligned() {
        assert_eq!(align_down(127, 64), 64);
        assert_eq!(align_down(7, 8), 0);
        assert!(is_aligned(128, 64));
        assert!(!is_aligned(130, 64));
    }

    #[test]
    fn test_checked_align_up_overflow() {
        assert_eq!(checked_align_up(usize::MAX, 8), None);
        assert_eq!(checked_align_up(usize::MAX - 7, 8), Some(usize::MAX - 7));
        assert_eq!(checked_align_up(9, 8), Some(16));
    }

    proptest! {
        #[test]
        fn prop_align_up_is_smallest_aligned_bound(n in 0usize..1 << 40, shift in 0u32..13) {
            let alignment = 1usize << shift;
            let up = align_up(n, alignment);
            prop_assert!(up >= n);
            prop_assert!(is_aligned(up, alignment));
            prop_assert!(up - n < alignment);
            prop_assert_eq!(checked_align_up(n, alignment), Some(up));
        }
    }
}
