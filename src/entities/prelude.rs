pub use super::column_metadata::Entity as ColumnMetadata;
pub use super::grid_column_state::Entity as GridColumnState;
pub use super::role::Entity as Role;
pub use super::stored_procedure_registry::Entity as StoredProcedureRegistry;
pub use super::user::Entity as User;
pub use super::user_role::Entity as UserRole;
