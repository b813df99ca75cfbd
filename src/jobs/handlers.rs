//! # Handlers HTTP para Jobs
//! src/jobs/handlers.rs
//!
//! Endpoints de la API:
//! - `/submit` admite un job
//! - `/jobs` lista los más recientes
//! - `/job/<id>` consulta un job
//!
//! Los parámetros se aceptan tanto en la query string como en un body
//! urlencoded, con GET o POST.

use crate::error::DispatchError;
use crate::http::{Request, Response, StatusCode};
use crate::jobs::artifacts::ArtifactStore;
use crate::jobs::manager::JobManager;
use crate::jobs::types::SubmitParams;
use std::path::Path;

/// Prefijo de la ruta de consulta individual
pub const JOB_PATH_PREFIX: &str = "/job/";

/// Handler para `/submit`
///
/// # Parámetros
/// - `py`: ruta del programa principal (requerido, `.py` o `.zip`)
/// - `py-files`: ruta de un bundle de dependencias (opcional)
/// - `name`: nombre del job (default: ruta del programa copiado)
/// - `executor-cores`, `num-executors`: recursos (default: 1 y 2)
///
/// # Ejemplo de response
/// ```json
/// {"job_id": "5f0c...", "name": "pi computer", "status": "running"}
/// ```
pub fn submit_handler(req: &Request, manager: &JobManager, artifacts: &ArtifactStore) -> Response {
    if manager.is_shutting_down() {
        return error_response(manager, &DispatchError::QueueClosed);
    }

    let params = match build_params(req, artifacts) {
        Ok(params) => params,
        Err(e) => return error_response(manager, &e),
    };

    match manager.submit(params) {
        Ok(response) => Response::json(&response),
        Err(e) => error_response(manager, &e),
    }
}

/// Valida y copia los artefactos; arma los parámetros del job
fn build_params(req: &Request, artifacts: &ArtifactStore) -> Result<SubmitParams, DispatchError> {
    let program = non_empty(req.param("py")).ok_or(DispatchError::MissingArtifact("py"))?;
    let program = artifacts.stage(Path::new(program))?;

    let mut params = SubmitParams::new(program.display().to_string())
        .with_name(req.param("name").unwrap_or_default().trim())
        .with_executor_cores(req.param("executor-cores").unwrap_or_default())
        .with_num_executors(req.param("num-executors").unwrap_or_default());

    if let Some(bundle) = non_empty(req.param("py-files")) {
        let bundle = artifacts.stage(Path::new(bundle))?;
        params = params.with_bundle(bundle.display().to_string());
    }

    Ok(params)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Traduce un error de admisión o del pipeline a su status HTTP
fn error_response(manager: &JobManager, err: &DispatchError) -> Response {
    let status = match err {
        e if e.is_admission() => {
            manager.metrics().record_rejected();
            tracing::warn!(error = %e, "Submission rejected");
            StatusCode::BadRequest
        }
        DispatchError::QueueClosed => StatusCode::ServiceUnavailable,
        e => {
            tracing::error!(error = %e, "Submission failed");
            StatusCode::InternalServerError
        }
    };

    Response::error(status, &err.to_string())
}

/// Handler para `/jobs`: arreglo JSON de registros, más recientes primero
pub fn list_handler(_req: &Request, manager: &JobManager) -> Response {
    Response::json(&manager.list_recent())
}

/// Handler para `/job/<id>`
///
/// Un ID desconocido no es un error: responde `{}` con 200.
pub fn job_handler(req: &Request, manager: &JobManager) -> Response {
    let job_id = req
        .path()
        .strip_prefix(JOB_PATH_PREFIX)
        .unwrap_or_default()
        .trim_matches('/');

    match manager.get(job_id) {
        Some(record) => Response::json(&record),
        None => Response::json(&serde_json::json!({})),
    }
}
