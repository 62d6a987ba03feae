//! Build, watch, deploy and run orchestration for Kerboscript projects.
//!
//! A project is described by `ksc.toml`: named volumes, each with a source
//! root, an output root and a target inside the archive (the game's script
//! directory). The external `ksc-engine` compiles and runs scripts; this
//! crate decides what to compile, where artifacts go and when to rebuild.

pub mod config;
pub mod deploy;
pub mod discover;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod run;
pub mod volume;
pub mod watch;

pub use error::{Error, Result};
