#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Static Remote Evaluator Plugin
//!
//! Answers remote evaluation requests from a fixed grant table. Meant for
//! development setups and for exercising the engine's remote path without
//! a real policy decision service.
//!
//! ## Modes
//!
//! - `grants` (default): allowed when a held credential matches a grant
//!   listing the requested privilege
//! - `allow_all` / `deny_all`: constant answers
//! - `unavailable`: every answer carries an error body, to exercise the
//!   breaker and fallback paths
//!
//! ## Configuration
//!
//! ```yaml
//! mode: grants
//! grants:
//!   - credential: { type: space-admin }
//!     privileges: [read, update]
//! ```

pub mod config;
pub mod domain;
pub mod module;

pub use module::StaticEvaluatorPlugin;
