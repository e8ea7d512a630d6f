//! Model server: HTTP surface over the prediction registry

pub mod api;
pub mod config;
