pub mod api;
pub mod app;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod error;
pub mod highlight;
pub mod model;
pub mod store;
pub mod ui;
pub mod view;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use error::{Error, ErrorKind, Result};
