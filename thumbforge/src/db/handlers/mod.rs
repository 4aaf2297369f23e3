//! Repository implementations for database access.
//!
//! Each repository wraps a `&mut PgConnection`, provides strongly-typed
//! operations for one entity, and returns records from
//! [`crate::db::models`]. Create repositories from a transaction whenever
//! an operation spans more than one statement:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let debited = Profiles::new(&mut tx).try_debit(user_id, count).await?;
//! Credits::new(&mut tx).create_transaction(&audit).await?;
//! tx.commit().await?;
//! ```

pub mod credits;
pub mod generations;
pub mod payments;
pub mod profiles;

pub use credits::Credits;
pub use generations::Generations;
pub use payments::Payments;
pub use profiles::Profiles;
