use clap::Args;
use ksc::config::Project;
use ksc::run::{self, RunTarget, StepRunner};

use super::{current_dir, engine};

#[derive(Args)]
pub struct RunArgs {
    /// Script file, or the name of a script in ksc.toml
    pub script: String,
}

/// Runs `ksc ...` steps through the in-process dispatcher.
struct CliStepRunner;

impl StepRunner for CliStepRunner {
    fn dispatch(&mut self, argv: &[String]) -> i32 {
        super::dispatch(argv)
    }
}

pub fn cmd_run(args: RunArgs) -> ksc::Result<()> {
    let cwd = current_dir()?;
    match RunTarget::classify(&args.script, &cwd) {
        RunTarget::File(file) => {
            let project = match Project::find(&cwd) {
                Some(path) => Some(Project::load(&path)?),
                None => None,
            };
            let engine = engine()?;
            for line in run::run_file(&engine, project.as_ref(), &file)? {
                println!("{}", line);
            }
            Ok(())
        }
        RunTarget::Named(name) => {
            let project = Project::locate(&cwd)?;
            run::run_named(&project, &name, &mut CliStepRunner)
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ksc::run::{parse_steps, run_steps};

    #[test]
    fn test_self_invocation_failure_stops_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let steps = parse_steps("ksc frobnicate && ksc-missing-program");
        let err = run_steps(&steps, &mut CliStepRunner, dir.path()).unwrap_err();
        match err {
            ksc::Error::StepFailed { step, code } => {
                assert_eq!(step, "ksc frobnicate");
                assert_eq!(code, 1);
            }
            other => panic!("expected StepFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_self_invocation_success_continues() {
        let dir = tempfile::tempdir().unwrap();
        let steps = parse_steps("ksc --version && ksc --help");
        run_steps(&steps, &mut CliStepRunner, dir.path()).unwrap();
    }
}
