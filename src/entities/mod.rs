pub mod prelude;

pub mod column_metadata;
pub mod grid_column_state;
pub mod role;
pub mod stored_procedure_registry;
pub mod user;
pub mod user_role;
