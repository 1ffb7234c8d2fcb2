//! Core runtime for skiff single-page applications.
//!
//! Modules declare routes, delegated events, dependencies and a template.
//! The runtime merges their routes into one table, matches navigation
//! fragments against it, lazily loads each module's template and
//! dependencies on first activation, and offers a topic bus for decoupled
//! notifications. Everything runs on one thread; asynchronous work is driven
//! by [`app::App::run_until_idle`].

pub mod app;
pub mod bus;
pub mod command;
pub mod context;
pub mod deps;
pub mod document;
pub mod error;
pub mod fragment;
pub mod loader;
pub mod logging;
pub mod module;
mod processor;
pub mod registry;
pub mod render;
pub mod route;
pub mod router;
pub mod state;
pub mod store;
pub mod task;

pub use app::{App, AppBuilder};
pub use context::Context;
pub use error::SkiffError;
pub use module::{DomEvent, HandlerInput, Module};
