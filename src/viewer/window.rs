use std::ops::Range;

/// Shifts `window_start` the least amount needed to keep `current` inside a
/// window of `size` thumbnails, then clamps it to the list.
pub(crate) fn adjust_window(current: usize, window_start: usize, len: usize, size: usize) -> usize {
    let size = size.max(1);
    let mut start = window_start;
    if current < start {
        start = current;
    } else if current >= start + size {
        start = current + 1 - size;
    }
    start.min(len.saturating_sub(size))
}

pub(crate) fn visible_range(window_start: usize, len: usize, size: usize) -> Range<usize> {
    let start = window_start.min(len);
    start..(start + size.max(1)).min(len)
}
