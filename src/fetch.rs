use std::fs;
use std::path::PathBuf;
use std::process::Command;

use camino::Utf8PathBuf;
use serde::Serialize;

use crate::domain::EventName;
use crate::error::Gcmt3dError;
use crate::layout::WorkspacePaths;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerEnv {
    pub numeric_threads: usize,
}

impl Default for WorkerEnv {
    fn default() -> Self {
        Self::single_threaded()
    }
}

impl WorkerEnv {
    pub const THREAD_VARS: [&'static str; 4] = [
        "OMP_NUM_THREADS",
        "MKL_NUM_THREADS",
        "OPENBLAS_NUM_THREADS",
        "NUMEXPR_NUM_THREADS",
    ];

    pub fn single_threaded() -> Self {
        Self { numeric_threads: 1 }
    }

    pub fn vars(&self) -> impl Iterator<Item = (&'static str, String)> + '_ {
        Self::THREAD_VARS
            .into_iter()
            .map(|var| (var, self.numeric_threads.to_string()))
    }

    pub fn apply(&self, cmd: &mut Command) {
        cmd.envs(self.vars());
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchTask {
    pub event: EventName,
    pub solution: Utf8PathBuf,
    pub workspace: WorkspacePaths,
    pub log_dir: Utf8PathBuf,
}

impl FetchTask {
    pub fn name(&self) -> String {
        format!("{}-Download", self.event)
    }
}

pub trait Fetcher: Send + Sync {
    fn fetch(&self, task: &FetchTask) -> Result<(), Gcmt3dError>;
}

#[derive(Debug, Clone)]
pub struct CommandFetcher {
    program: PathBuf,
    args: Vec<String>,
    env: WorkerEnv,
}

impl CommandFetcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, env: WorkerEnv) -> Self {
        Self {
            program: program.into(),
            args,
            env,
        }
    }

    pub fn locate(program: &str, args: Vec<String>, env: WorkerEnv) -> Result<Self, Gcmt3dError> {
        let path = PathBuf::from(program);
        let resolved = if path.components().count() > 1 {
            path.exists().then_some(path)
        } else {
            find_in_path(program)
        };
        resolved
            .map(|program| Self::new(program, args, env))
            .ok_or_else(|| Gcmt3dError::MissingTool(program.to_string()))
    }

    pub fn command(&self, task: &FetchTask) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(task.workspace.root.as_std_path())
            .current_dir(task.log_dir.as_std_path());
        self.env.apply(&mut cmd);
        cmd
    }
}

impl Fetcher for CommandFetcher {
    fn fetch(&self, task: &FetchTask) -> Result<(), Gcmt3dError> {
        let fetch_err = |message: String| Gcmt3dError::Fetch {
            event: task.event.to_string(),
            message,
        };
        fs::create_dir_all(task.log_dir.as_std_path())
            .map_err(|err| fetch_err(format!("create log dir {}: {err}", task.log_dir)))?;

        let output = self
            .command(task)
            .output()
            .map_err(|err| fetch_err(format!("{}: {err}", self.program.display())))?;

        let mut log = output.stdout.clone();
        log.extend_from_slice(&output.stderr);
        fs::write(task.log_dir.join("fetch.log").as_std_path(), &log)
            .map_err(|err| fetch_err(format!("write fetch log: {err}")))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("{} exited with {}", self.program.display(), output.status)
        } else {
            stderr
        };
        Err(fetch_err(message))
    }
}

pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}
