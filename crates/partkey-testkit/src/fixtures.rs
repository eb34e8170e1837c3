//! Test fixtures for common partkey types.

use partkey_core::{Address, ParticipationCredential, ProtocolRegistry, Round};

/// Consensus version reported by [`ScriptedLedger`](crate::ScriptedLedger).
pub const TEST_CONSENSUS_VERSION: &str = "test-v1";

// ─────────────────────────────────────────────────────────────────────────────
// Account Fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// Create a test address.
#[must_use]
pub fn address(name: &str) -> Address {
    Address::new(name)
}

/// Create a credential for `address` over `[first, last]`.
#[must_use]
pub fn credential(address: &str, first: u64, last: u64) -> ParticipationCredential {
    ParticipationCredential {
        address: Address::new(address),
        first_valid: Round(first),
        last_valid: Round(last),
        vote_verifier: [0xAA; 32],
        selection_verifier: [0xBB; 32],
        key_dilution: 32,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Protocol Fixtures
// ─────────────────────────────────────────────────────────────────────────────

/// Registry knowing only the test consensus version.
#[must_use]
pub fn protocols(max_txn_life: u64) -> ProtocolRegistry {
    ProtocolRegistry::new().with(TEST_CONSENSUS_VERSION, max_txn_life)
}
