pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod geneset;
pub mod output;
pub mod providers;
pub mod registry;
pub mod serverfiles;
pub mod store;
pub mod taxonomy;
