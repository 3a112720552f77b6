//! Ordered-sequence splice used to rebuild a listing window.

/// Insert `add` as one contiguous block into `base` at `index`.
///
/// Negative indices clamp to the front and indices past the end clamp to
/// the back. An empty `base` yields `add` unchanged.
pub fn splice<T>(mut base: Vec<T>, add: Vec<T>, index: i64) -> Vec<T> {
    if base.is_empty() {
        return add;
    }

    let at = index.clamp(0, base.len() as i64) as usize;
    let tail = base.split_off(at);
    base.reserve(add.len() + tail.len());
    base.extend(add);
    base.extend(tail);
    base
}
