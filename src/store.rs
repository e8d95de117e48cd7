use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::debug;

use crate::domain::IterationKey;
use crate::error::Gcmt3dError;
use crate::fs_util;
use crate::layout::WorkspacePaths;
use crate::npy::Array;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Gradient,
    Cost,
    Descent,
    Hessian,
}

impl ArtifactKind {
    fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Model => "m",
            ArtifactKind::Gradient => "g",
            ArtifactKind::Cost => "c",
            ArtifactKind::Descent => "dm",
            ArtifactKind::Hessian => "h",
        }
    }
}

/// Every (kind, iteration, step) artifact is written at most once.
#[derive(Debug, Clone)]
pub struct IterationStore {
    paths: WorkspacePaths,
}

impl IterationStore {
    pub fn new(paths: WorkspacePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn artifact_path(&self, kind: ArtifactKind, key: IterationKey) -> Utf8PathBuf {
        let dir = match kind {
            ArtifactKind::Model => &self.paths.modl,
            ArtifactKind::Gradient => &self.paths.grad,
            ArtifactKind::Cost => &self.paths.cost,
            ArtifactKind::Descent => &self.paths.desc,
            ArtifactKind::Hessian => &self.paths.hess,
        };
        dir.join(format!("{}_{}.npy", kind.prefix(), key.file_stem()))
    }

    pub fn names_path(&self) -> Utf8PathBuf {
        self.paths.meta.join("model_names.json")
    }

    pub fn scaling_path(&self) -> Utf8PathBuf {
        self.paths.meta.join("scaling.npy")
    }

    pub fn has(&self, kind: ArtifactKind, key: IterationKey) -> bool {
        self.artifact_path(kind, key).as_std_path().exists()
    }

    pub fn write_names(&self, names: &[String]) -> Result<(), Gcmt3dError> {
        let content = serde_json::to_vec_pretty(names)
            .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
        fs_util::write_new_atomic(&self.names_path(), &content)
    }

    pub fn read_names(&self) -> Result<Vec<String>, Gcmt3dError> {
        let path = self.names_path();
        let content = fs_util::read_bytes(&path)?;
        serde_json::from_slice(&content).map_err(|err| Gcmt3dError::ArtifactFormat {
            path,
            message: err.to_string(),
        })
    }

    pub fn write_scaling(&self, scaling: &[f64]) -> Result<(), Gcmt3dError> {
        self.check_len(scaling.len())?;
        let path = self.scaling_path();
        fs_util::write_new_atomic(&path, &Array::vector(scaling.to_vec()).encode())
    }

    pub fn read_scaling(&self) -> Result<Vec<f64>, Gcmt3dError> {
        self.read_vector_at(self.scaling_path())
    }

    pub fn write_model(&self, model: &[f64], key: IterationKey) -> Result<(), Gcmt3dError> {
        self.write_vector(ArtifactKind::Model, model, key)
    }

    pub fn read_model(&self, key: IterationKey) -> Result<Vec<f64>, Gcmt3dError> {
        self.read_vector_at(self.artifact_path(ArtifactKind::Model, key))
    }

    pub fn write_gradient(&self, gradient: &[f64], key: IterationKey) -> Result<(), Gcmt3dError> {
        self.write_vector(ArtifactKind::Gradient, gradient, key)
    }

    pub fn read_gradient(&self, key: IterationKey) -> Result<Vec<f64>, Gcmt3dError> {
        self.read_vector_at(self.artifact_path(ArtifactKind::Gradient, key))
    }

    pub fn write_descent(&self, descent: &[f64], key: IterationKey) -> Result<(), Gcmt3dError> {
        self.write_vector(ArtifactKind::Descent, descent, key)
    }

    pub fn read_descent(&self, key: IterationKey) -> Result<Vec<f64>, Gcmt3dError> {
        self.read_vector_at(self.artifact_path(ArtifactKind::Descent, key))
    }

    pub fn write_cost(&self, cost: f64, key: IterationKey) -> Result<(), Gcmt3dError> {
        let path = self.artifact_path(ArtifactKind::Cost, key);
        fs_util::write_new_atomic(&path, &Array::scalar(cost).encode())?;
        debug!(%path, "wrote cost");
        Ok(())
    }

    pub fn read_cost(&self, key: IterationKey) -> Result<f64, Gcmt3dError> {
        let path = self.artifact_path(ArtifactKind::Cost, key);
        let array = Array::decode(&fs_util::read_bytes(&path)?, &path)?;
        match (array.shape.as_slice(), array.data.as_slice()) {
            ([] | [1], [value]) => Ok(*value),
            _ => Err(Gcmt3dError::ArtifactFormat {
                path,
                message: "expected a scalar".to_string(),
            }),
        }
    }

    /// Writes a square matrix given in row-major order.
    pub fn write_hessian(&self, hessian: &[f64], key: IterationKey) -> Result<(), Gcmt3dError> {
        let dim = (hessian.len() as f64).sqrt().round() as usize;
        if dim * dim != hessian.len() {
            return Err(Gcmt3dError::LengthMismatch {
                expected: dim * dim,
                actual: hessian.len(),
            });
        }
        self.check_len(dim)?;
        let path = self.artifact_path(ArtifactKind::Hessian, key);
        let array = Array {
            shape: vec![dim, dim],
            data: hessian.to_vec(),
        };
        fs_util::write_new_atomic(&path, &array.encode())?;
        debug!(%path, "wrote hessian");
        Ok(())
    }

    pub fn read_hessian(&self, key: IterationKey) -> Result<(usize, Vec<f64>), Gcmt3dError> {
        let path = self.artifact_path(ArtifactKind::Hessian, key);
        let array = Array::decode(&fs_util::read_bytes(&path)?, &path)?;
        match array.shape.as_slice() {
            [rows, cols] if rows == cols => Ok((*rows, array.data)),
            _ => Err(Gcmt3dError::ArtifactFormat {
                path,
                message: "expected a square matrix".to_string(),
            }),
        }
    }

    pub fn latest_model(&self) -> Result<Option<IterationKey>, Gcmt3dError> {
        if !self.paths.modl.as_std_path().is_dir() {
            return Ok(None);
        }
        let latest = fs_util::list_files_with_ext(&self.paths.modl, "npy")?
            .iter()
            .filter_map(|path| parse_key(path.file_stem()?, ArtifactKind::Model.prefix()))
            .max();
        Ok(latest)
    }

    fn write_vector(
        &self,
        kind: ArtifactKind,
        values: &[f64],
        key: IterationKey,
    ) -> Result<(), Gcmt3dError> {
        self.check_len(values.len())?;
        let path = self.artifact_path(kind, key);
        fs_util::write_new_atomic(&path, &Array::vector(values.to_vec()).encode())?;
        debug!(%path, len = values.len(), "wrote artifact");
        Ok(())
    }

    fn read_vector_at(&self, path: Utf8PathBuf) -> Result<Vec<f64>, Gcmt3dError> {
        let array = Array::decode(&fs_util::read_bytes(&path)?, &path)?;
        if array.shape.len() != 1 {
            return Err(Gcmt3dError::ArtifactFormat {
                path,
                message: format!("expected a vector, got shape {:?}", array.shape),
            });
        }
        Ok(array.data)
    }

    fn check_len(&self, actual: usize) -> Result<(), Gcmt3dError> {
        match self.read_names() {
            Ok(names) if names.len() != actual => Err(Gcmt3dError::LengthMismatch {
                expected: names.len(),
                actual,
            }),
            Ok(_) | Err(Gcmt3dError::ArtifactNotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn parse_key(stem: &str, prefix: &str) -> Option<IterationKey> {
    let rest = stem.strip_prefix(prefix)?.strip_prefix("_it")?;
    let (iteration, step) = rest.split_once("_ls")?;
    Some(IterationKey::new(iteration.parse().ok()?, step.parse().ok()?))
}
