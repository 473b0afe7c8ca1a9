//! scriptrunner bridge library target.
//!
//! Exposes the front-end's modules for integration tests. The binary entry
//! point is in `main.rs`.

pub mod app;
pub mod cli;
pub mod helpers;
pub mod messages;
pub mod session;
pub mod update;
pub mod util;
pub mod view_ui;
