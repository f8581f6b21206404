pub mod batch;
pub mod config;
pub mod delegates;
pub mod exchange;
pub mod humanize;
pub mod model;
pub mod observability;
pub mod polling;
pub mod registry;
pub mod semantics;
