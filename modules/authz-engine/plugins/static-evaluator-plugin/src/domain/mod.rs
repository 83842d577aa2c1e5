//! Domain layer for the static remote evaluator plugin.

mod client;
pub mod service;

pub use service::Service;
