pub mod columns;
pub mod drilldown;
pub mod naming;
pub mod strategy;
pub mod types;

pub use columns::{merge_column_definitions, ColumnDefinition, DropdownConfig, LinkConfig};
pub use drilldown::{build_child_filter, render_breadcrumb, BreadcrumbLevel, DrillError, DrillMode, DrillTrail};
pub use strategy::{LoadingStrategy, StrategyThresholds};
