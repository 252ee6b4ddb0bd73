use super::schema;

// Basic entity mappings on database tables - close mirrors of schema.rs.
pub mod pair_state;
pub use self::pair_state::{NewPairStateRow, PairStateRow};
pub mod server_binding;
pub use self::server_binding::{NewServerBindingRow, ServerBindingRow};
