//! Authorization infrastructure

mod engine;
mod guard;

pub use engine::{AccessEngine, AccessGrant};
pub use guard::ResourceGuard;
