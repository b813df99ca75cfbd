//! # Sistema de Routing
//! src/router/mod.rs
//!
//! ```text
//! Request → Router → Handler → Response
//! ```
//!
//! Las rutas exactas se revisan antes que las de prefijo. Sin coincidencia
//! se responde 404 Not Found.

use crate::http::{Request, Response, StatusCode};

/// Un handler recibe un Request y retorna una Response.
///
/// Son closures para poder capturar el estado compartido del servicio.
pub type Handler = Box<dyn Fn(&Request) -> Response + Send + Sync>;

#[derive(Default)]
pub struct Router {
    exact: Vec<(String, Handler)>,
    prefixed: Vec<(String, Handler)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra una ruta exacta
    ///
    /// ```
    /// use job_dispatch::router::Router;
    /// use job_dispatch::http::{Request, Response};
    ///
    /// let mut router = Router::new();
    /// router.register("/jobs", |_req: &Request| Response::json(&Vec::<String>::new()));
    /// ```
    pub fn register<F>(&mut self, path: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.exact.push((path.to_string(), Box::new(handler)));
    }

    /// Registra una ruta por prefijo (ej: `/job/` para `/job/<id>`)
    pub fn register_prefix<F>(&mut self, prefix: &str, handler: F)
    where
        F: Fn(&Request) -> Response + Send + Sync + 'static,
    {
        self.prefixed.push((prefix.to_string(), Box::new(handler)));
    }

    /// Ejecuta el handler que corresponde al path del request
    pub fn route(&self, request: &Request) -> Response {
        let path = request.path();

        let handler = self
            .exact
            .iter()
            .find(|(route, _)| route == path)
            .or_else(|| {
                self.prefixed
                    .iter()
                    .find(|(prefix, _)| path.starts_with(prefix.as_str()))
            })
            .map(|(_, handler)| handler);

        let mut response = match handler {
            Some(handler) => handler(request),
            None => Response::error(StatusCode::NotFound, &format!("Route not found: {}", path)),
        };

        add_common_headers(&mut response);
        response
    }
}

/// Headers comunes a todas las respuestas
fn add_common_headers(response: &mut Response) {
    response.add_header("Server", concat!("job-dispatch/", env!("CARGO_PKG_VERSION")));
    response.add_header("Connection", "close");
}
