use std::fs;
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::error::Gcmt3dError;

pub fn create_dir(path: &Utf8Path) -> Result<(), Gcmt3dError> {
    fs::create_dir_all(path.as_std_path()).map_err(|err| Gcmt3dError::Layout {
        path: path.to_owned(),
        message: err.to_string(),
    })
}

fn parent_of(path: &Utf8Path) -> Result<&Utf8Path, Gcmt3dError> {
    path.parent()
        .ok_or_else(|| Gcmt3dError::Filesystem(format!("invalid destination path {path}")))
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), Gcmt3dError> {
    let parent = parent_of(path)?;
    create_dir(parent)?;
    let mut temp = Builder::new()
        .prefix(".gcmt3d-write")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(format!("persist {path}: {}", err.error)))?;
    Ok(())
}

/// Like [`write_bytes_atomic`] but refuses to replace an existing file.
pub fn write_new_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), Gcmt3dError> {
    let parent = parent_of(path)?;
    create_dir(parent)?;
    if path.as_std_path().exists() {
        return Err(Gcmt3dError::ArtifactExists(path.to_owned()));
    }
    let mut temp = Builder::new()
        .prefix(".gcmt3d-write")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
    temp.persist_noclobber(path.as_std_path())
        .map_err(|err| match err.error.kind() {
            io::ErrorKind::AlreadyExists => Gcmt3dError::ArtifactExists(path.to_owned()),
            _ => Gcmt3dError::Filesystem(format!("persist {path}: {}", err.error)),
        })?;
    Ok(())
}

pub fn read_bytes(path: &Utf8Path) -> Result<Vec<u8>, Gcmt3dError> {
    fs::read(path.as_std_path()).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Gcmt3dError::ArtifactNotFound(path.to_owned()),
        _ => Gcmt3dError::Filesystem(format!("read {path}: {err}")),
    })
}

pub fn list_files_with_ext(dir: &Utf8Path, ext: &str) -> Result<Vec<Utf8PathBuf>, Gcmt3dError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(format!("read dir {dir}: {err}")))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Gcmt3dError::Filesystem(err.to_string()))?;
        let path = Utf8PathBuf::from_path_buf(entry.path())
            .map_err(|path| Gcmt3dError::Filesystem(format!("non-utf8 path {}", path.display())))?;
        let matches = path
            .extension()
            .map(|value| value.eq_ignore_ascii_case(ext))
            .unwrap_or(false);
        if matches && path.as_std_path().is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf, Gcmt3dError> {
    let absolute = std::path::absolute(path.as_std_path())
        .map_err(|err| Gcmt3dError::Filesystem(format!("resolve {path}: {err}")))?;
    Utf8PathBuf::from_path_buf(absolute)
        .map_err(|path| Gcmt3dError::Filesystem(format!("non-utf8 path {}", path.display())))
}

pub fn dir_has_entries(dir: &Utf8Path) -> bool {
    fs::read_dir(dir.as_std_path())
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn scratch() -> (tempfile::TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        (temp, root)
    }

    #[test]
    fn write_new_refuses_overwrite() {
        let (_temp, root) = scratch();
        let path = root.join("nested").join("a.bin");
        write_new_atomic(&path, b"one").unwrap();
        let err = write_new_atomic(&path, b"two").unwrap_err();
        assert_matches!(err, Gcmt3dError::ArtifactExists(_));
        assert_eq!(read_bytes(&path).unwrap(), b"one");
    }

    #[test]
    fn write_atomic_replaces() {
        let (_temp, root) = scratch();
        let path = root.join("a.yml");
        write_bytes_atomic(&path, b"one").unwrap();
        write_bytes_atomic(&path, b"two").unwrap();
        assert_eq!(read_bytes(&path).unwrap(), b"two");
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_temp, root) = scratch();
        let err = read_bytes(&root.join("missing.npy")).unwrap_err();
        assert_matches!(err, Gcmt3dError::ArtifactNotFound(_));
    }

    #[test]
    fn lists_only_matching_extension_sorted() {
        let (_temp, root) = scratch();
        fs::write(root.join("b.xml"), "").unwrap();
        fs::write(root.join("a.XML"), "").unwrap();
        fs::write(root.join("c.txt"), "").unwrap();
        let files = list_files_with_ext(&root, "xml").unwrap();
        let names: Vec<_> = files.iter().map(|p| p.file_name().unwrap()).collect();
        assert_eq!(names, vec!["a.XML", "b.xml"]);
    }
}
