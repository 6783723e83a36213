//! eml2pdf gateway: an HTTP front for the `eml2pdf` command-line converter.

pub mod config;
pub mod convert;
pub mod error;
pub mod http;
pub mod server;
