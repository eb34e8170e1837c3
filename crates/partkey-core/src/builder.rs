//! Status transaction construction.

use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{Address, KeyRegistration, ParticipationCredential, Round, StatusTransaction};

/// Build an unsigned status-change transaction.
///
/// With a credential this is a go-online transaction embedding the
/// credential's verifiers; without one it is a go-offline transaction that
/// revokes participation. The transaction is valid over
/// `[first_valid, first_valid + valid_rounds]`. A `fee` of zero is passed
/// through untouched; the signer resolves it to the suggested fee.
///
/// # Errors
///
/// Returns `ZeroValidity` if `valid_rounds` is zero.
pub fn build_status_transaction(
    address: &Address,
    credential: Option<&ParticipationCredential>,
    first_valid: Round,
    valid_rounds: u64,
    fee: u64,
) -> LifecycleResult<StatusTransaction> {
    if valid_rounds == 0 {
        return Err(LifecycleError::ZeroValidity);
    }

    Ok(StatusTransaction {
        address: address.clone(),
        first_valid,
        last_valid: first_valid.saturating_add(valid_rounds),
        fee,
        registration: credential.map(KeyRegistration::from),
    })
}
