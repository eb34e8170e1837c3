//! Round window validation.
//!
//! An expiry must land strictly beyond one full transaction lifetime past the
//! current round. Anything closer risks the network moving past the window
//! before the status change is observed.

use crate::error::WindowTooShort;
use crate::types::Round;

/// Check that `requested_last_valid` is acceptably far past `current`.
///
/// Succeeds iff `requested_last_valid > current + max_txn_life`. The sum
/// saturates, so a window against a saturated horizon always fails.
///
/// # Errors
///
/// Returns [`WindowTooShort`] when `requested_last_valid <= current + max_txn_life`.
pub const fn validate_window(
    current: Round,
    requested_last_valid: Round,
    max_txn_life: u64,
) -> Result<(), WindowTooShort> {
    let horizon = current.saturating_add(max_txn_life);
    if requested_last_valid.get() <= horizon.get() {
        return Err(WindowTooShort {
            requested: requested_last_valid,
            current,
            max_txn_life,
        });
    }
    Ok(())
}
