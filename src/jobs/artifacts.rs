//! # Artefactos de Jobs
//! src/jobs/artifacts.rs
//!
//! Copia los artefactos de una submission (programa principal y bundle
//! opcional) al directorio de jobs. El runner siempre recibe la copia, de modo
//! que el archivo original puede cambiar sin afectar al job.

use crate::error::{DispatchError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

/// Extensiones aceptadas para programas y bundles
pub const ALLOWED_EXTENSIONS: &[&str] = &["py", "zip"];

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Crea el directorio de jobs si no existe
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Valida y copia un artefacto. Retorna la ruta de la copia.
    pub fn stage(&self, source: &Path) -> Result<PathBuf> {
        let invalid = |reason: &str| DispatchError::InvalidArtifact {
            path: source.display().to_string(),
            reason: reason.to_string(),
        };

        if !source.is_file() {
            return Err(invalid("file not found"));
        }

        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .ok_or_else(|| invalid("missing extension"))?;

        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(invalid("extension not allowed"));
        }

        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| invalid("invalid file name"))?;

        let (target, mut staged) = self.claim_target(file_name)?;
        let copied = File::open(source).and_then(|mut original| io::copy(&mut original, &mut staged));
        if let Err(e) = copied {
            let _ = fs::remove_file(&target);
            return Err(e.into());
        }

        tracing::info!(source = %source.display(), staged = %target.display(), "Artifact staged");
        Ok(target)
    }

    /// Crea el primer nombre libre entre `pi.py`, `pi_1.py`, `pi_2.py`, ...
    ///
    /// `create_new` reserva el nombre de forma atómica: dos submissions
    /// concurrentes nunca reciben el mismo archivo.
    fn claim_target(&self, file_name: &str) -> Result<(PathBuf, File)> {
        let (stem, ext) = match file_name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{}", ext)),
            None => (file_name, String::new()),
        };

        let mut suffix = 0u64;
        loop {
            let candidate = if suffix == 0 {
                self.dir.join(file_name)
            } else {
                self.dir.join(format!("{}_{}{}", stem, suffix, ext))
            };

            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(file) => return Ok((candidate, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_stage_copies_file() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let store = ArtifactStore::new(dst.path().join("job_files")).unwrap();

        let program = write(src.path(), "pi.py", "print(3.14)");
        let staged = store.stage(&program).unwrap();

        assert_eq!(staged, dst.path().join("job_files").join("pi.py"));
        assert_eq!(fs::read_to_string(staged).unwrap(), "print(3.14)");
    }

    #[test]
    fn test_stage_avoids_collisions() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let store = ArtifactStore::new(dst.path()).unwrap();

        let program = write(src.path(), "pi.py", "v1");
        let first = store.stage(&program).unwrap();
        let second = store.stage(&program).unwrap();
        let third = store.stage(&program).unwrap();

        assert_eq!(first.file_name().unwrap(), "pi.py");
        assert_eq!(second.file_name().unwrap(), "pi_1.py");
        assert_eq!(third.file_name().unwrap(), "pi_2.py");
    }

    #[test]
    fn test_stage_accepts_zip_bundle() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let store = ArtifactStore::new(dst.path()).unwrap();

        let bundle = write(src.path(), "deps.ZIP", "PK");
        assert!(store.stage(&bundle).is_ok());
    }

    #[test]
    fn test_stage_rejects_missing_file() {
        let dst = TempDir::new().unwrap();
        let store = ArtifactStore::new(dst.path()).unwrap();

        let err = store.stage(Path::new("/nonexistent/pi.py")).unwrap_err();
        assert!(err.is_admission());
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_stage_rejects_other_extensions() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let store = ArtifactStore::new(dst.path()).unwrap();

        let script = write(src.path(), "run.sh", "echo hi");
        let err = store.stage(&script).unwrap_err();
        assert!(err.to_string().contains("extension not allowed"));

        let bare = write(src.path(), "Makefile", "all:");
        let err = store.stage(&bare).unwrap_err();
        assert!(err.to_string().contains("missing extension"));
    }

    #[test]
    fn test_concurrent_stage_same_name_gets_distinct_copies() {
        const THREADS: usize = 8;

        for _ in 0..20 {
            let src = TempDir::new().unwrap();
            let dst = TempDir::new().unwrap();
            let store = ArtifactStore::new(dst.path()).unwrap();
            let barrier = Arc::new(Barrier::new(THREADS));

            let stagers: Vec<_> = (0..THREADS)
                .map(|i| {
                    let dir = src.path().join(format!("d{}", i));
                    fs::create_dir(&dir).unwrap();
                    let program = write(&dir, "pi.py", &format!("program {}", i));

                    let store = store.clone();
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        (i, store.stage(&program).unwrap())
                    })
                })
                .collect();

            let mut staged: Vec<(usize, PathBuf)> =
                stagers.into_iter().map(|h| h.join().unwrap()).collect();

            // Cada copia conserva el contenido de su propia submission
            for (i, path) in &staged {
                assert_eq!(fs::read_to_string(path).unwrap(), format!("program {}", i));
            }

            staged.sort_by(|a, b| a.1.cmp(&b.1));
            staged.dedup_by(|a, b| a.1 == b.1);
            assert_eq!(staged.len(), THREADS);
        }
    }
}
