//! # Señales de Apagado
//! src/shutdown.rs
//!
//! Escucha SIGINT y SIGTERM en un thread dedicado con un runtime tokio mínimo.
//! La primera señal ejecuta un callback que inicia el apagado ordenado; una
//! segunda señal termina el proceso sin esperar el período de gracia. El resto
//! del servicio no usa async: el callback solo levanta banderas.

use crate::error::Result;
use std::thread::{self, JoinHandle};
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Código de salida cuando una segunda señal interrumpe el apagado
const FORCED_EXIT_CODE: i32 = 130;

/// Instala los handlers de SIGTERM y SIGINT.
///
/// Los handlers quedan registrados antes de retornar; `on_signal` corre en el
/// thread `signal-listener` una sola vez. El thread sigue escuchando hasta
/// que llegue una segunda señal.
pub fn install_shutdown_handler<F>(on_signal: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    install(on_signal, || {
        tracing::warn!("Second signal received, exiting without draining");
        std::process::exit(FORCED_EXIT_CODE);
    })
}

fn install<F, G>(on_signal: F, on_second: G) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
    G: FnOnce() + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (mut sigterm, mut sigint) = {
        let _guard = runtime.enter();
        (
            signal(SignalKind::terminate())?,
            signal(SignalKind::interrupt())?,
        )
    };

    let handle = thread::Builder::new()
        .name("signal-listener".to_string())
        .spawn(move || {
            runtime.block_on(async {
                let name = next_signal(&mut sigterm, &mut sigint).await;
                tracing::info!(signal = name, "Received signal, initiating graceful shutdown");
                on_signal();

                let name = next_signal(&mut sigterm, &mut sigint).await;
                tracing::info!(signal = name, "Received signal during shutdown");
                on_second();
            });
        })?;

    Ok(handle)
}

async fn next_signal(sigterm: &mut Signal, sigint: &mut Signal) -> &'static str {
    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;
    use std::sync::mpsc;
    use std::time::Duration;

    fn send_signal(name: &str) {
        let status = Command::new("kill")
            .arg(format!("-{}", name))
            .arg(std::process::id().to_string())
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_first_signal_drains_second_forces() {
        let (tx, rx) = mpsc::channel();
        let second_tx = tx.clone();

        let handle = install(
            move || {
                let _ = tx.send("drain");
            },
            move || {
                let _ = second_tx.send("force");
            },
        )
        .unwrap();

        send_signal("TERM");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "drain");

        // El listener sigue vivo después de la primera señal
        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());

        send_signal("INT");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "force");
        handle.join().unwrap();
    }
}
