//! Composite script steps: parsing and execution.

use std::fmt;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{Error, Result};

/// Program name that makes a step re-enter this tool in process.
pub const PROGRAM_NAME: &str = "ksc";
/// Separator between steps.
pub const SEQUENCE: &str = "&&";

/// One `program args...` step of a composite script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub program: String,
    pub args: Vec<String>,
}

impl Step {
    pub fn is_self_invocation(&self) -> bool {
        self.program == PROGRAM_NAME
    }

    /// `program` followed by the arguments, as a command line.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Split script content into steps. Empty steps are dropped.
pub fn parse_steps(content: &str) -> Vec<Step> {
    content
        .split(SEQUENCE)
        .filter_map(|part| {
            let mut tokens = tokenize(part.trim()).into_iter();
            let program = tokens.next()?;
            Some(Step {
                program,
                args: tokens.collect(),
            })
        })
        .collect()
}

/// Whitespace-separated tokens; double quotes group.
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut started = false;

    for c in s.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                started = true;
            }
            c if c.is_whitespace() && !quoted => {
                if started {
                    tokens.push(std::mem::take(&mut current));
                    started = false;
                }
            }
            c => {
                current.push(c);
                started = true;
            }
        }
    }
    if started {
        tokens.push(current);
    }
    tokens
}

/// Executes steps of a composite script.
pub trait StepRunner {
    /// Run this tool in process with `argv` (`argv[0]` is the program name).
    fn dispatch(&mut self, argv: &[String]) -> i32;

    /// Run an external program to completion and return its exit code.
    fn spawn(&mut self, program: &str, args: &[String], cwd: &Path) -> Result<i32> {
        spawn_streaming(program, args, cwd)
    }
}

/// Spawn a process, logging its stdout line by line.
pub fn spawn_streaming(program: &str, args: &[String], cwd: &Path) -> Result<i32> {
    let resolved = which::which(program).unwrap_or_else(|_| PathBuf::from(program));
    let mut child = Command::new(&resolved)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| Error::ExternalProcess {
            program: program.to_string(),
            source,
        })?;

    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => tracing::info!(target: "ksc::script", "{}", line),
                Err(e) => {
                    tracing::warn!("cannot read output of '{}': {}", program, e);
                    break;
                }
            }
        }
    }

    let status = child.wait().map_err(|source| Error::ExternalProcess {
        program: program.to_string(),
        source,
    })?;
    Ok(status.code().unwrap_or(1))
}

/// Run steps in order, stopping at the first non-zero exit.
pub fn run_steps(steps: &[Step], runner: &mut dyn StepRunner, cwd: &Path) -> Result<()> {
    for step in steps {
        tracing::info!("> {}", step);
        let code = if step.is_self_invocation() {
            runner.dispatch(&step.argv())
        } else {
            runner.spawn(&step.program, &step.args, cwd)?
        };
        if code != 0 {
            return Err(Error::StepFailed {
                step: step.to_string(),
                code,
            });
        }
    }
    Ok(())
}
