#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use ksc::config::Project;
use ksc::engine::{Artifact, CompileError, Engine, Mount, Session, StepState};
use ksc::volume::ARTIFACT_MAGIC;

/// Source marker that makes the fake compiler fail.
pub const FAIL: &str = "FAIL";

/// Compiles by prefixing the source with the artifact magic; runs by
/// echoing `print` statements.
#[derive(Default)]
pub struct FakeEngine {
    pub compiled: AtomicUsize,
    pub booted: AtomicUsize,
}

impl FakeEngine {
    pub fn compiled(&self) -> usize {
        self.compiled.load(Ordering::SeqCst)
    }

    pub fn booted(&self) -> usize {
        self.booted.load(Ordering::SeqCst)
    }
}

impl Engine for FakeEngine {
    fn compile(&self, path: &str, source: &str) -> Result<Artifact, CompileError> {
        self.compiled.fetch_add(1, Ordering::SeqCst);
        if let Some(line) = source.lines().position(|l| l.contains(FAIL)) {
            return Err(CompileError::new(path, "unexpected FAIL").at(line as u32 + 1, 1));
        }
        if source.trim().is_empty() {
            return Ok(Artifact::default());
        }
        let mut bytes = ARTIFACT_MAGIC.to_vec();
        bytes.extend_from_slice(source.as_bytes());
        Ok(Artifact::new(bytes))
    }

    fn boot(&self, _mounts: &[Mount]) -> ksc::Result<Box<dyn Session>> {
        self.booted.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession::default()))
    }
}

#[derive(Default)]
struct FakeSession {
    pending: Vec<String>,
    output: Vec<String>,
}

impl Session for FakeSession {
    fn load(&mut self, artifact: &Artifact) -> ksc::Result<()> {
        let text = String::from_utf8_lossy(&artifact.bytes()[ARTIFACT_MAGIC.len()..]).to_string();
        self.pending = text
            .lines()
            .filter_map(|l| l.trim().strip_prefix("print "))
            .map(|l| l.trim_end_matches('.').trim_matches('"').to_string())
            .rev()
            .collect();
        Ok(())
    }

    fn step(&mut self) -> ksc::Result<StepState> {
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

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Two-volume project: `boot` (1) deployed to `boot`, `main` (2) to the root.
pub fn project(root: &Path, archive: &Path) -> Project {
    let toml = format!(
        r#"name = "rover"
archive = "{}"

[[volumes]]
index = 1
name = "boot"
input = "./boot"
output = "./dist/boot"
deploy = "boot"

[[volumes]]
index = 2
name = "main"
input = "./src"
output = "./dist/src"
deploy = "."

[scripts]
compile = "ksc compile"
ship = "ksc compile && ksc deploy"
"#,
        archive.display().to_string().replace('\\', "/")
    );
    write(root, "ksc.toml", &toml);
    Project::load(&root.join("ksc.toml")).unwrap()
}
