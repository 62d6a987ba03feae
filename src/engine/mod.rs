//! Contract with the external Kerboscript engine.
//!
//! The orchestrator never parses Kerboscript or interprets bytecode. It
//! hands sources to an [`Engine`] and gets opaque [`Artifact`]s back, and
//! it runs artifacts in a [`Session`] that is polled until idle.

mod process;

use std::fmt;
use std::path::PathBuf;

pub use process::ProcessEngine;

use crate::error::Result;

/// Compiled program bytes. Empty means the compiler produced no code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Artifact(Vec<u8>);

impl Artifact {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single script's compile failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub source_file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompileError {
    pub fn new(source_file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source_file: source_file.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.column) {
            (Some(line), Some(column)) => {
                write!(f, "{}:{}:{}: {}", self.source_file, line, column, self.message)
            }
            _ => write!(f, "{}: {}", self.source_file, self.message),
        }
    }
}

impl std::error::Error for CompileError {}

/// A volume made visible to a running program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mount {
    pub index: u32,
    pub name: String,
    pub root: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepState {
    Busy,
    Idle,
}

/// Compiler and virtual machine of the scripting language.
pub trait Engine: Send + Sync {
    /// Compile one source file. `logical_path` names it in diagnostics.
    fn compile(&self, logical_path: &str, source: &str) -> std::result::Result<Artifact, CompileError>;

    /// Start a fresh execution context with the given volumes mounted.
    fn boot(&self, mounts: &[Mount]) -> Result<Box<dyn Session>>;
}

/// One execution context.
pub trait Session {
    fn load(&mut self, artifact: &Artifact) -> Result<()>;
    fn step(&mut self) -> Result<StepState>;
    /// Text printed by the program so far.
    fn output(&self) -> &[String];
}

/// Boot, load and poll until the program goes idle.
pub fn execute(engine: &dyn Engine, mounts: &[Mount], artifact: &Artifact) -> Result<Vec<String>> {
    let mut session = engine.boot(mounts)?;
    session.load(artifact)?;
    while session.step()? == StepState::Busy {}
    Ok(session.output().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    struct EchoSession {
        pending: Vec<String>,
        output: Vec<String>,
    }

    impl Engine for Echo {
        fn compile(&self, path: &str, source: &str) -> std::result::Result<Artifact, CompileError> {
            if source.contains("FAIL") {
                return Err(CompileError::new(path, "unexpected token").at(1, 1));
            }
            Ok(Artifact::new(source.as_bytes().to_vec()))
        }

        fn boot(&self, mounts: &[Mount]) -> Result<Box<dyn Session>> {
            Ok(Box::new(EchoSession {
                pending: mounts.iter().map(|m| m.name.clone()).collect(),
                output: Vec::new(),
            }))
        }
    }

    impl Session for EchoSession {
        fn load(&mut self, artifact: &Artifact) -> Result<()> {
            let text = String::from_utf8_lossy(artifact.bytes()).to_string();
            self.pending.extend(text.lines().map(str::to_string));
            self.pending.reverse();
            Ok(())
        }

        fn step(&mut self) -> Result<StepState> {
            match self.pending.pop() {
                Some(line) => {
                    self.output.push(line);
                    Ok(StepState::Busy)
                }
                None => Ok(StepState::Idle),
            }
        }

        fn output(&self) -> &[String] {
            &self.output
        }
    }

    #[test]
    fn test_execute_polls_until_idle() {
        let mounts = [Mount {
            index: 0,
            name: "Archive".to_string(),
            root: PathBuf::from("/archive"),
        }];
        let artifact = Echo.compile("a.ks", "one\ntwo").unwrap();
        let output = execute(&Echo, &mounts, &artifact).unwrap();
        assert_eq!(output, ["Archive", "one", "two"]);
    }

    #[test]
    fn test_compile_error_display() {
        let err = Echo.compile("boot/boot.ks", "FAIL").unwrap_err();
        assert_eq!(err.to_string(), "boot/boot.ks:1:1: unexpected token");
        assert_eq!(
            CompileError::new("x.ks", "oops").to_string(),
            "x.ks: oops"
        );
    }
}
