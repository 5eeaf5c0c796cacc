//! Equality gates that hand back the previous `Arc` when nothing changed.
//!
//! Readers detect changes by pointer identity, so every derived value in the
//! state tree goes through one of these before it is stored.

use std::sync::Arc;

/// Return `previous` when it equals `next`, otherwise wrap `next` in a new `Arc`.
pub fn reuse_if_equal<T: PartialEq>(previous: Option<&Arc<T>>, next: T) -> Arc<T> {
    match previous {
        Some(prev) if **prev == next => Arc::clone(prev),
        _ => Arc::new(next),
    }
}

/// True when both sides are absent or both point at the same allocation.
pub fn same_arc<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

/// True when both slices hold the same allocations in the same order.
pub fn same_elements<T>(a: &[Arc<T>], b: &[Arc<T>]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| Arc::ptr_eq(x, y))
}
