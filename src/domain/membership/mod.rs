//! Membership domain module
//!
//! The user-to-organisation role mapping and the store contract that owns
//! it. Lifecycle rules (who may create, change, or remove a membership)
//! live in `infrastructure::membership::MembershipService`.

mod entity;
mod repository;

pub use entity::{Membership, MembershipId};
pub use repository::MembershipRepository;
