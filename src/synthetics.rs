use std::path::PathBuf;
use std::process::Command;

use tracing::info;

use crate::error::Gcmt3dError;
use crate::fetch::{WorkerEnv, find_in_path};
use crate::layout::WorkspacePaths;

pub const PROCESSOR_ENV: &str = "GCMT3D_PROCESSOR";
pub const DEFAULT_PROCESSOR: &str = "gcmt3d-processor";

#[derive(Debug, Clone)]
pub struct SyntheticsStep {
    program: PathBuf,
    env: WorkerEnv,
}

impl SyntheticsStep {
    pub fn new(program: impl Into<PathBuf>, env: WorkerEnv) -> Self {
        Self {
            program: program.into(),
            env,
        }
    }

    pub fn from_env(env: WorkerEnv) -> Result<Self, Gcmt3dError> {
        if let Some(program) = std::env::var_os(PROCESSOR_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self::new(program, env));
        }
        find_in_path(DEFAULT_PROCESSOR)
            .map(|program| Self::new(program, env))
            .ok_or_else(|| Gcmt3dError::MissingTool(DEFAULT_PROCESSOR.to_string()))
    }

    pub fn command(&self, workspace: &WorkspacePaths) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(workspace.process_config().as_std_path())
            .arg(workspace.simu_synt.as_std_path())
            .arg(workspace.synt.as_std_path());
        self.env.apply(&mut cmd);
        cmd
    }

    pub fn run(&self, workspace: &WorkspacePaths) -> Result<(), Gcmt3dError> {
        let config = workspace.process_config();
        if !config.as_std_path().is_file() {
            return Err(Gcmt3dError::ArtifactNotFound(config));
        }
        let output = self
            .command(workspace)
            .output()
            .map_err(|err| Gcmt3dError::ProcessStep(format!("{}: {err}", self.program.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Gcmt3dError::ProcessStep(if stderr.is_empty() {
                format!("{} exited with {}", self.program.display(), output.status)
            } else {
                stderr
            }));
        }
        info!(root = %workspace.root, "processed synthetics");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn command_passes_config_and_both_synthetics_dirs() {
        let workspace = WorkspacePaths::from_root(Utf8Path::new("/db/C201")).unwrap();
        let step = SyntheticsStep::new("processor", WorkerEnv::single_threaded());
        let cmd = step.command(&workspace);
        let args: Vec<_> = cmd
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "/db/C201/meta/process.yml",
                "/db/C201/simu/synt",
                "/db/C201/synt"
            ]
        );
    }

    #[test]
    fn run_requires_processing_config() {
        let temp = tempfile::tempdir().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(temp.path().join("EV")).unwrap();
        let workspace = WorkspacePaths::from_root(&root).unwrap();
        let err = SyntheticsStep::new("processor", WorkerEnv::default())
            .run(&workspace)
            .unwrap_err();
        assert!(matches!(err, Gcmt3dError::ArtifactNotFound(_)));
    }
}
