//! `RwLock` access that survives a panic in another holder. A poisoned guard
//! is taken over and logged, never propagated.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

fn take_over<G>(
    poisoned: PoisonError<G>,
    source: &'static str,
    op: &'static str,
    mode: &'static str,
) -> G {
    warn!(
        target = "youyou::cache::lock",
        source,
        op,
        mode,
        "Lock was poisoned; continuing with the inner state"
    );
    poisoned.into_inner()
}

pub(crate) fn rw_read<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| take_over(poisoned, source, op, "read"))
}

pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    source: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| take_over(poisoned, source, op, "write"))
}
