//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases for better type safety:
//!
//! - [`UserId`]: account identifier, issued by the hosted auth provider
//! - [`GenerationId`]: stored artifact identifier
//! - [`PaymentId`]: recorded payment identifier
//! - [`TransactionId`]: ledger audit entry identifier

use uuid::Uuid;

pub type UserId = Uuid;
pub type GenerationId = Uuid;
pub type PaymentId = Uuid;
pub type TransactionId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}
