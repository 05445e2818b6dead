//! Read-only query checking for caller-supplied SQL.

pub mod guard;
pub mod tokens;

pub use guard::ReadOnlyQuery;
