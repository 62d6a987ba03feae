use std::io::{BufRead, BufReader, Lines, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use super::{Artifact, CompileError, Engine, Mount, Session, StepState};
use crate::error::{Error, Result};

/// Name of the engine executable.
pub const ENGINE_BINARY: &str = "ksc-engine";
/// Environment override for the engine location.
pub const ENGINE_ENV: &str = "KSC_ENGINE";

/// Engine backed by the `ksc-engine` executable.
#[derive(Clone, Debug)]
pub struct ProcessEngine {
    program: PathBuf,
}

impl ProcessEngine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the engine: `KSC_ENGINE`, next to this executable, then `PATH`.
    pub fn locate() -> Result<Self> {
        if let Ok(p) = std::env::var(ENGINE_ENV) {
            let path = PathBuf::from(p);
            if path.is_file() {
                return Ok(Self::new(path));
            }
            tracing::warn!("{} points at '{}', which is not a file", ENGINE_ENV, path.display());
        }

        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let path = dir.join(format!("{}{}", ENGINE_BINARY, std::env::consts::EXE_SUFFIX));
                if path.is_file() {
                    return Ok(Self::new(path));
                }
            }
        }

        which::which(ENGINE_BINARY)
            .map(Self::new)
            .map_err(|e| Error::Engine(format!("cannot find '{}': {}", ENGINE_BINARY, e)))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Engine for ProcessEngine {
    fn compile(&self, logical_path: &str, source: &str) -> std::result::Result<Artifact, CompileError> {
        let mut child = Command::new(&self.program)
            .arg("compile")
            .arg(logical_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                CompileError::new(logical_path, format!("cannot run '{}': {}", self.program.display(), e))
            })?;

        // stdin is fed from a second thread while stdout drains here
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| {
            scope.spawn(move || {
                if let Some(mut stdin) = stdin {
                    let _ = stdin.write_all(source.as_bytes());
                }
            });
            child.wait_with_output()
        })
        .map_err(|e| CompileError::new(logical_path, format!("engine failed: {}", e)))?;

        if output.status.success() {
            return Ok(Artifact::new(output.stdout));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(parse_compile_error(logical_path, stderr.trim()))
    }

    fn boot(&self, mounts: &[Mount]) -> Result<Box<dyn Session>> {
        Ok(Box::new(ProcessSession {
            program: self.program.clone(),
            mounts: mounts.to_vec(),
            child: None,
            lines: None,
            output: Vec::new(),
        }))
    }
}

/// Split a leading `line:column:` off an engine message.
fn parse_compile_error(logical_path: &str, stderr: &str) -> CompileError {
    let mut parts = stderr.splitn(3, ':');
    if let (Some(line), Some(column), Some(message)) = (parts.next(), parts.next(), parts.next()) {
        if let (Ok(line), Ok(column)) = (line.trim().parse(), column.trim().parse()) {
            return CompileError::new(logical_path, message.trim()).at(line, column);
        }
    }
    let message = if stderr.is_empty() {
        "compilation failed"
    } else {
        stderr
    };
    CompileError::new(logical_path, message)
}

struct ProcessSession {
    program: PathBuf,
    mounts: Vec<Mount>,
    child: Option<Child>,
    lines: Option<Lines<BufReader<ChildStdout>>>,
    output: Vec<String>,
}

impl Session for ProcessSession {
    fn load(&mut self, artifact: &Artifact) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("run");
        for m in &self.mounts {
            cmd.arg("--mount")
                .arg(format!("{}:{}={}", m.index, m.name, m.root.display()));
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Engine(format!("cannot run '{}': {}", self.program.display(), e)))?;

        // the program may print before it has read all of its input
        if let Some(mut stdin) = child.stdin.take() {
            let bytes = artifact.bytes().to_vec();
            std::thread::spawn(move || {
                if let Err(e) = stdin.write_all(&bytes) {
                    tracing::warn!("cannot load program: {}", e);
                }
            });
        }
        self.lines = child.stdout.take().map(|out| BufReader::new(out).lines());
        self.child = Some(child);
        Ok(())
    }

    fn step(&mut self) -> Result<StepState> {
        if let Some(lines) = self.lines.as_mut() {
            match lines.next() {
                Some(Ok(line)) => {
                    self.output.push(line);
                    return Ok(StepState::Busy);
                }
                Some(Err(e)) => return Err(Error::Engine(format!("cannot read output: {}", e))),
                None => self.lines = None,
            }
        }
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|e| Error::Engine(format!("engine did not finish: {}", e)))?;
            if !status.success() {
                return Err(Error::Engine(format!(
                    "program exited with code {}",
                    status.code().unwrap_or(-1)
                )));
            }
        }
        Ok(StepState::Idle)
    }

    fn output(&self) -> &[String] {
        &self.output
    }
}
