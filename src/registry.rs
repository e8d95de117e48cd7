use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::ConfigLoader;
use crate::domain::EventName;
use crate::error::Gcmt3dError;
use crate::fs_util;
use crate::layout::WorkspacePaths;
use crate::solution::{CmtSolutionReader, SolutionReader, SourceSolution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingEvent {
    pub event: EventName,
    pub solution: Utf8PathBuf,
}

pub type PendingIter<'a> = Box<dyn Iterator<Item = Result<PendingEvent, Gcmt3dError>> + 'a>;

pub trait EventRegistry {
    fn pending(&self) -> Result<PendingIter<'_>, Gcmt3dError>;
}

#[derive(Debug, Clone)]
pub struct DirectoryRegistry<R: SolutionReader = CmtSolutionReader> {
    eventdir: Utf8PathBuf,
    database: Utf8PathBuf,
    reader: R,
}

impl DirectoryRegistry<CmtSolutionReader> {
    pub fn new(eventdir: impl Into<Utf8PathBuf>, database: impl Into<Utf8PathBuf>) -> Self {
        Self::with_reader(eventdir, database, CmtSolutionReader)
    }

    pub fn from_input(input: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let params = ConfigLoader::resolve(input)?;
        let eventdir = params
            .eventdir
            .ok_or_else(|| Gcmt3dError::MissingConfigKey {
                path: input.to_owned(),
                key: "eventdir".to_string(),
            })?;
        Ok(Self::new(eventdir, params.database))
    }
}

impl<R: SolutionReader> DirectoryRegistry<R> {
    pub fn with_reader(
        eventdir: impl Into<Utf8PathBuf>,
        database: impl Into<Utf8PathBuf>,
        reader: R,
    ) -> Self {
        Self {
            eventdir: eventdir.into(),
            database: database.into(),
            reader,
        }
    }

    pub fn database(&self) -> &Utf8Path {
        &self.database
    }

    pub fn is_downloaded(&self, event: &EventName) -> bool {
        is_downloaded(&WorkspacePaths::resolve(&self.database, event))
    }

    fn check(&self, solution: Utf8PathBuf) -> Option<Result<PendingEvent, Gcmt3dError>> {
        match self.reader.read(&solution) {
            Ok(parsed) => {
                let event = parsed.event_name().clone();
                (!self.is_downloaded(&event)).then_some(Ok(PendingEvent { event, solution }))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

impl<R: SolutionReader> EventRegistry for DirectoryRegistry<R> {
    fn pending(&self) -> Result<PendingIter<'_>, Gcmt3dError> {
        let files = solution_files(&self.eventdir)?;
        Ok(Box::new(files.into_iter().filter_map(|file| self.check(file))))
    }
}

/// Completion is observed from the data the fetch task left behind.
pub fn is_downloaded(workspace: &WorkspacePaths) -> bool {
    fs_util::dir_has_entries(&workspace.waveform_dir())
}

fn solution_files(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, Gcmt3dError> {
    let entries = std::fs::read_dir(dir.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(format!("read event dir {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|path| Gcmt3dError::Filesystem(format!("non-utf8 path {}", path.display())))?;
        let hidden = path.file_name().is_some_and(|name| name.starts_with('.'));
        if !hidden && path.as_std_path().is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
