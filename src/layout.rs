use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

use crate::domain::EventName;
use crate::error::Gcmt3dError;
use crate::fs_util;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspacePaths {
    pub root: Utf8PathBuf,
    pub modl: Utf8PathBuf,
    pub meta: Utf8PathBuf,
    pub data: Utf8PathBuf,
    pub simu: Utf8PathBuf,
    pub simu_synt: Utf8PathBuf,
    pub simu_frec: Utf8PathBuf,
    pub synt: Utf8PathBuf,
    pub frec: Utf8PathBuf,
    pub cost: Utf8PathBuf,
    pub grad: Utf8PathBuf,
    pub hess: Utf8PathBuf,
    pub desc: Utf8PathBuf,
    pub opt: Utf8PathBuf,
}

impl WorkspacePaths {
    pub fn resolve(database: &Utf8Path, event: &EventName) -> Self {
        let root = database.join(event.as_str());
        let simu = root.join("simu");
        Self {
            modl: root.join("modl"),
            meta: root.join("meta"),
            data: root.join("data"),
            simu_synt: simu.join("synt"),
            simu_frec: simu.join("frec"),
            simu,
            synt: root.join("synt"),
            frec: root.join("frec"),
            cost: root.join("cost"),
            grad: root.join("grad"),
            hess: root.join("hess"),
            desc: root.join("desc"),
            opt: root.join("opt"),
            root,
        }
    }

    pub fn from_root(root: &Utf8Path) -> Result<Self, Gcmt3dError> {
        let database = root
            .parent()
            .ok_or_else(|| Gcmt3dError::Filesystem(format!("workspace has no parent: {root}")))?;
        let event: EventName = root
            .file_name()
            .ok_or_else(|| Gcmt3dError::Filesystem(format!("workspace has no name: {root}")))?
            .parse()?;
        Ok(Self::resolve(database, &event))
    }

    pub fn dirs(&self) -> [&Utf8Path; 14] {
        [
            self.root.as_path(),
            self.modl.as_path(),
            self.meta.as_path(),
            self.data.as_path(),
            self.simu.as_path(),
            self.simu_synt.as_path(),
            self.simu_frec.as_path(),
            self.synt.as_path(),
            self.frec.as_path(),
            self.cost.as_path(),
            self.grad.as_path(),
            self.hess.as_path(),
            self.desc.as_path(),
            self.opt.as_path(),
        ]
    }

    pub fn create_all(&self) -> Result<(), Gcmt3dError> {
        for dir in self.dirs() {
            fs_util::create_dir(dir)?;
        }
        debug!(root = %self.root, "workspace directories ready");
        Ok(())
    }

    pub fn exists(&self) -> bool {
        self.dirs().iter().all(|dir| dir.as_std_path().is_dir())
    }

    pub fn teardown(&self) -> Result<(), Gcmt3dError> {
        if self.root.as_std_path().exists() {
            fs::remove_dir_all(self.root.as_std_path())
                .map_err(|err| Gcmt3dError::Filesystem(format!("remove {}: {err}", self.root)))?;
        }
        Ok(())
    }

    pub fn input_config(&self) -> Utf8PathBuf {
        self.meta.join("input.yml")
    }

    pub fn process_config(&self) -> Utf8PathBuf {
        self.meta.join("process.yml")
    }

    pub fn init_solution(&self) -> Utf8PathBuf {
        self.meta.join("init_model.cmt")
    }

    pub fn labelled_solution(&self, event: &EventName, suffix: &str) -> Utf8PathBuf {
        self.meta.join(format!("{event}{suffix}"))
    }

    pub fn station_dir(&self) -> Utf8PathBuf {
        self.meta.join("stations")
    }

    pub fn station_xml(&self) -> Utf8PathBuf {
        self.meta.join("stations.xml")
    }

    pub fn station_listing(&self) -> Utf8PathBuf {
        self.meta.join("STATIONS.txt")
    }

    pub fn waveform_dir(&self) -> Utf8PathBuf {
        self.data.join("waveforms")
    }
}

pub fn layout(
    database: &Utf8Path,
    event: &EventName,
    create_if_missing: bool,
) -> Result<WorkspacePaths, Gcmt3dError> {
    let paths = WorkspacePaths::resolve(&fs_util::absolute(database)?, event);
    if create_if_missing {
        paths.create_all()?;
    }
    Ok(paths)
}
