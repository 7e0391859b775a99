//! Paging helper for bulk work inside migration bodies.
//!
//! A total count is split into `ceil(total / batch_size)` windows. Every window
//! has `limit == batch_size`, including the last one, so callers that need an
//! exact final page clamp it themselves.

/// One page of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchWindow {
    pub skip: usize,
    pub limit: usize,
}

/// Number of windows needed to cover `total` items.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn batch_count(total: usize, batch_size: usize) -> usize {
    assert!(batch_size > 0, "batch size must be greater than zero");
    total.div_ceil(batch_size)
}

/// Iterator over the windows covering `total` items.
///
/// Use this form inside async step bodies, where awaiting per window is needed.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn batch_windows(total: usize, batch_size: usize) -> BatchWindows {
    BatchWindows {
        index: 0,
        count: batch_count(total, batch_size),
        batch_size,
    }
}

/// Call `f(skip, limit)` once per window, stopping at the first error.
///
/// # Panics
///
/// Panics if `batch_size` is zero.
pub fn for_each_batch<E, F>(total: usize, batch_size: usize, mut f: F) -> Result<(), E>
where
    F: FnMut(usize, usize) -> Result<(), E>,
{
    for window in batch_windows(total, batch_size) {
        f(window.skip, window.limit)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct BatchWindows {
    index: usize,
    count: usize,
    batch_size: usize,
}

impl Iterator for BatchWindows {
    type Item = BatchWindow;

    fn next(&mut self) -> Option<BatchWindow> {
        if self.index >= self.count {
            return None;
        }
        let window = BatchWindow {
            skip: self.index * self.batch_size,
            limit: self.batch_size,
        };
        self.index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for BatchWindows {}
