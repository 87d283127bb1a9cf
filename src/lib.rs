//! gemchat is a terminal chat client for Google's Gemini API that spreads
//! traffic over a pool of API keys.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the credential pool, the session controller that rotates
//!   keys on rate limits, configuration, and the model API seam.
//! - [`api`] defines the Gemini wire payloads and error classification.
//! - [`cli`] parses arguments, wires the controller together, and runs the
//!   interactive chat loop and one-shot commands.
//! - [`utils`] holds URL helpers and the transcript log.
//!
//! The binary (`src/main.rs`) routes straight through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod utils;
