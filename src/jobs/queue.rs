//! # Cola FIFO Acotada
//! src/jobs/queue.rs
//!
//! Cola thread-safe con capacidad fija. La usan tanto la cola de jobs
//! (API → workers) como la cola de completados (workers → monitor).
//!
//! - `enqueue` bloquea mientras la cola está llena (backpressure)
//! - `dequeue` bloquea mientras la cola está vacía
//! - `close` despierta a todos: los productores fallan, los consumidores
//!   drenan lo pendiente y luego reciben `None`

use crate::error::{DispatchError, Result};
use crate::jobs::types::{JobSpec, ProcessHandle};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cola de jobs pendientes
pub type JobQueue = BoundedQueue<JobSpec>;

/// Cola de procesos en vuelo
pub type CompletionQueue = BoundedQueue<ProcessHandle>;

/// Resultado de un `dequeue_timeout`
#[derive(Debug)]
pub enum Dequeued<T> {
    Item(T),
    Timeout,
    Closed,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Cola FIFO acotada con bloqueo en ambos extremos
pub struct BoundedQueue<T> {
    state: Arc<Mutex<QueueState<T>>>,

    /// Se notifica cuando entra un item o se cierra la cola
    not_empty: Arc<Condvar>,

    /// Se notifica cuando sale un item o se cierra la cola
    not_full: Arc<Condvar>,

    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Crea una cola con capacidad máxima (mínimo 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
            })),
            not_empty: Arc::new(Condvar::new()),
            not_full: Arc::new(Condvar::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        // Un panic con el lock tomado no deja la cola en estado inválido
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Encola un item, bloqueando mientras la cola esté llena.
    ///
    /// Falla con `QueueClosed` si la cola se cerró (antes o durante la espera).
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut state = self.lock();

        while state.items.len() >= self.capacity && !state.closed {
            state = self
                .not_full
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        if state.closed {
            return Err(DispatchError::QueueClosed);
        }

        state.items.push_back(item);
        self.not_empty.notify_one();

        Ok(())
    }

    /// Desencola el item más antiguo, bloqueando hasta que haya uno.
    ///
    /// Retorna `None` solo cuando la cola está cerrada y vacía.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }

            if state.closed {
                return None;
            }

            state = self
                .not_empty
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    /// Como `dequeue` pero esperando como máximo `timeout`
    pub fn dequeue_timeout(&self, timeout: Duration) -> Dequeued<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Dequeued::Item(item);
            }

            if state.closed {
                return Dequeued::Closed;
            }

            let now = Instant::now();
            if now >= deadline {
                return Dequeued::Timeout;
            }

            state = self
                .not_empty
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    /// Intenta desencolar sin bloquear
    pub fn try_dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        let item = state.items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Cierra la cola y despierta a todos los threads en espera
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            not_empty: Arc::clone(&self.not_empty),
            not_full: Arc::clone(&self.not_full),
            capacity: self.capacity,
        }
    }
}
