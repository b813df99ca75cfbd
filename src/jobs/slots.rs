//! # Slots de Ejecución
//! src/jobs/slots.rs
//!
//! Semáforo contador que limita cuántos procesos externos corren a la vez.
//! Un worker toma un slot antes de sacar un job de la cola; el monitor lo
//! devuelve cuando el job llega a estado terminal.
//!
//! Un slot tomado no implica un proceso vivo: el worker lo reserva mientras
//! espera en la cola. `running()` cuenta solo los procesos lanzados.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};

struct SlotState {
    available: usize,

    /// Slots con un proceso lanzado y todavía no finalizado
    running: usize,
    closed: bool,
}

#[derive(Clone)]
pub struct RunSlots {
    state: Arc<Mutex<SlotState>>,
    released: Arc<Condvar>,
    total: usize,
}

impl RunSlots {
    pub fn new(total: usize) -> Self {
        let total = total.max(1);
        Self {
            state: Arc::new(Mutex::new(SlotState {
                available: total,
                running: 0,
                closed: false,
            })),
            released: Arc::new(Condvar::new()),
            total,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Espera un slot libre. Retorna `false` si se cerró mientras esperaba.
    pub fn acquire(&self) -> bool {
        let mut state = self.lock();

        while state.available == 0 && !state.closed {
            state = self
                .released
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }

        if state.closed {
            return false;
        }

        state.available -= 1;
        true
    }

    /// Devuelve un slot que nunca llegó a tener un proceso
    pub fn release(&self) {
        let mut state = self.lock();
        self.give_back(&mut state);
    }

    /// El proceso del slot ya fue lanzado
    pub fn mark_running(&self) {
        let mut state = self.lock();
        if state.running < self.total {
            state.running += 1;
        }
    }

    /// El proceso del slot terminó: deja de contar y libera el slot
    pub fn finish(&self) {
        let mut state = self.lock();
        state.running = state.running.saturating_sub(1);
        self.give_back(&mut state);
    }

    fn give_back(&self, state: &mut SlotState) {
        if state.available < self.total {
            state.available += 1;
        }
        self.released.notify_one();
    }

    /// Despierta a los workers bloqueados para que puedan salir
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        self.released.notify_all();
    }

    pub fn running(&self) -> usize {
        self.lock().running
    }

    pub fn total(&self) -> usize {
        self.total
    }
}
