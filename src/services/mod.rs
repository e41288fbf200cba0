pub mod dynamic_grid;
pub mod menu;
pub mod registry;
pub mod role;
pub mod user;

pub use dynamic_grid::*;
pub use menu::*;
pub use role::*;
pub use user::*;
