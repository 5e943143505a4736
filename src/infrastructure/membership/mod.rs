//! Membership infrastructure implementations

mod in_memory;
mod postgres;
mod service;

pub use in_memory::InMemoryMembershipRepository;
pub use postgres::{PgMembershipRepository, PostgresConfig};
pub use service::{AddMemberRequest, MembershipService};
