//! services/task_control.rs
//! Canal de control por tarea (pausa / stop). El Store sigue siendo la fuente de
//! verdad; el canal despierta al runner en cuanto cambia algo, sin esperar al poll.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::models::task_model::{ControlAction, TaskRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlSignal {
    pub paused: bool,
    pub stop_requested: bool,
}

impl From<&TaskRecord> for ControlSignal {
    fn from(t: &TaskRecord) -> Self {
        ControlSignal {
            paused: t.paused,
            stop_requested: t.stop_requested,
        }
    }
}

impl ControlSignal {
    fn apply(&mut self, action: ControlAction) {
        match action {
            ControlAction::Pause => self.paused = true,
            ControlAction::Resume => self.paused = false,
            ControlAction::Stop => self.stop_requested = true,
        }
    }
}

/// Registro de canales vivos, uno por task_id con runner activo.
#[derive(Debug, Default)]
pub struct ControlRegistry {
    channels: Mutex<HashMap<String, watch::Sender<ControlSignal>>>,
}

impl ControlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abre (o reutiliza) el canal de la tarea con el estado inicial leído del Store.
    pub async fn register(&self, task_id: &str, initial: ControlSignal) -> ControlHandle {
        let mut channels = self.channels.lock().await;
        let sender = channels
            .entry(task_id.to_string())
            .or_insert_with(|| watch::channel(initial).0);
        sender.send_replace(initial);
        ControlHandle {
            rx: sender.subscribe(),
        }
    }

    /// Publica la acción si hay un runner escuchando. Devuelve false si no lo hay.
    pub async fn publish(&self, task_id: &str, action: ControlAction) -> bool {
        let channels = self.channels.lock().await;
        match channels.get(task_id) {
            Some(sender) => {
                sender.send_modify(|sig| sig.apply(action));
                true
            }
            None => false,
        }
    }

    pub async fn unregister(&self, task_id: &str) {
        self.channels.lock().await.remove(task_id);
    }

    #[cfg(test)]
    pub async fn is_registered(&self, task_id: &str) -> bool {
        self.channels.lock().await.contains_key(task_id)
    }
}

/// Lado del runner
#[derive(Debug, Clone)]
pub struct ControlHandle {
    rx: watch::Receiver<ControlSignal>,
}

impl ControlHandle {
    pub fn current(&self) -> ControlSignal {
        *self.rx.borrow()
    }

    /// Espera el próximo cambio. Si el registro cerró el canal, no vuelve nunca.
    pub async fn changed(&mut self) {
        if self.rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Duerme `dur` salvo que llegue un stop. Devuelve true si se interrumpió.
    pub async fn sleep_unless_stopped(&mut self, dur: Duration) -> bool {
        let sleep = tokio::time::sleep(dur);
        tokio::pin!(sleep);
        loop {
            if self.current().stop_requested {
                return true;
            }
            tokio::select! {
                _ = &mut sleep => return false,
                _ = self.changed() => {}
            }
        }
    }

    /// Espera un cambio o que venza `poll`, lo que ocurra primero.
    pub async fn wait_change_or(&mut self, poll: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = self.changed() => {}
        }
    }
}
