//! # Persistencia de Jobs
//! src/jobs/storage.rs
//!
//! Store durable de `JobRecord` indexado por `job_id`. Los registros viven en
//! memoria y cada escritura vuelca el mapa completo a un archivo JSON
//! (archivo temporal + rename, atómico en Unix).
//!
//! Cada operación toma el lock solo durante su propia duración: ningún caller
//! lo retiene mientras espera en una cola.
//!
//! El costo de un upsert crece con la cantidad de registros: se reescribe el
//! archivo entero con el lock global tomado. No hay compactación ni expiración.

use crate::error::Result;
use crate::jobs::types::JobRecord;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Cantidad de registros que devuelve el listado por defecto
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Store para persistir registros de jobs
#[derive(Clone)]
pub struct JobStore {
    /// Ruta al archivo de persistencia
    path: PathBuf,

    /// Cache en memoria de los registros
    records: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl JobStore {
    /// Abre el store y carga los registros existentes
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let records = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            HashMap::new()
        };

        tracing::info!(path = %path.display(), records = records.len(), "Job store opened");

        Ok(Self {
            path,
            records: Arc::new(Mutex::new(records)),
        })
    }

    /// Carga registros desde el archivo
    fn load_from_file(path: &Path) -> Result<HashMap<String, JobRecord>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        match serde_json::from_reader(reader) {
            Ok(records) => Ok(records),
            Err(e) => {
                // Si el archivo está corrupto, empezar limpio
                tracing::warn!(path = %path.display(), error = %e, "Corrupted job store, starting empty");
                Ok(HashMap::new())
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Vuelca todos los registros al archivo
    fn save_to_file(&self, records: &HashMap<String, JobRecord>) -> Result<()> {
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        let temp_path = PathBuf::from(temp_path);

        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer_pretty(&mut writer, records)?;
        writer.flush()?;

        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }

    /// Inserta o reemplaza el registro con el mismo `job_id`.
    ///
    /// El volcado a disco ocurre con el lock tomado para que dos upserts
    /// concurrentes no se pisen el archivo temporal. Si el volcado falla el
    /// mapa vuelve a su estado anterior: nunca se lee algo que no está en disco.
    pub fn upsert(&self, record: &JobRecord) -> Result<()> {
        let mut records = self.lock();
        let job_id = record.job_id().to_string();
        let previous = records.insert(job_id.clone(), record.clone());

        if let Err(e) = self.save_to_file(&records) {
            match previous {
                Some(previous) => records.insert(job_id, previous),
                None => records.remove(&job_id),
            };
            return Err(e);
        }

        Ok(())
    }

    /// Obtiene un registro por ID. `None` no es un error.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().get(job_id).cloned()
    }

    /// Hasta `limit` registros ordenados por `start_time` descendente
    pub fn list_recent(&self, limit: usize) -> Vec<JobRecord> {
        let mut recent: Vec<JobRecord> = self.lock().values().cloned().collect();

        recent.sort_by(|a, b| {
            b.start_time()
                .cmp(&a.start_time())
                .then_with(|| a.job_id().cmp(b.job_id()))
        });
        recent.truncate(limit);

        recent
    }

    /// Obtiene el número de registros almacenados
    pub fn count(&self) -> usize {
        self.lock().len()
    }
}
