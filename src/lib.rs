#![allow(clippy::uninlined_format_args)]

pub mod address;
pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod dialect;
pub mod error;
pub mod format;
pub mod html;
pub mod instance;
pub mod normalize;
pub mod post;
pub mod template;
pub mod transport;
pub mod wrap;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
pub use error::{Error, Result};
