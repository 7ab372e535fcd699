#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod tui;
