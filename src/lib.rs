pub mod api;
pub mod auth;
pub mod codegen;
pub mod config;
pub mod entities;
pub mod error;
pub mod grid;
pub mod services;
