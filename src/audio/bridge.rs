use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc::{UnboundedSender, WeakUnboundedSender};
use tracing::debug;

use super::session::SessionMessage;

/// Identifica cada stream iniciado dentro de una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u64);

/// Cómo terminó un stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Finished,
    Failed(String),
}

/// Traduce los avisos de fin de stream del pipeline de audio en mensajes
/// para el actor de la sesión.
///
/// Solo guarda una referencia débil al canal: una vez que la sesión cierra,
/// los avisos que lleguen tarde se descartan sin efecto.
#[derive(Clone)]
pub struct CompletionBridge {
    tx: WeakUnboundedSender<SessionMessage>,
}

impl CompletionBridge {
    pub fn new(tx: &UnboundedSender<SessionMessage>) -> Self {
        Self { tx: tx.downgrade() }
    }

    pub fn callback(&self, stream: StreamId) -> CompletionCallback {
        CompletionCallback {
            stream,
            tx: self.tx.clone(),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Callback de un único stream. Es síncrono y seguro desde cualquier hilo.
#[derive(Clone)]
pub struct CompletionCallback {
    stream: StreamId,
    tx: WeakUnboundedSender<SessionMessage>,
    fired: Arc<AtomicBool>,
}

impl CompletionCallback {
    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Avisa a la sesión que el stream terminó. Solo el primer aviso cuenta.
    ///
    /// Devuelve `false` si el aviso se descartó (repetido o sesión cerrada).
    pub fn fire(&self, end: StreamEnd) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            debug!("🔁 Aviso repetido para stream {:?}, ignorado", self.stream);
            return false;
        }

        let Some(tx) = self.tx.upgrade() else {
            debug!("👻 Stream {:?} terminó después de cerrar la sesión", self.stream);
            return false;
        };

        let delivered = tx
            .send(SessionMessage::StreamEnded {
                stream: self.stream,
                end,
            })
            .is_ok();
        if !delivered {
            debug!("👻 Sesión cerrada, aviso del stream {:?} descartado", self.stream);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn fires_once_per_stream() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = CompletionBridge::new(&tx);
        let callback = bridge.callback(StreamId(7));

        let clone = callback.clone();
        let from_thread = std::thread::spawn(move || clone.fire(StreamEnd::Finished))
            .join()
            .unwrap();
        assert!(from_thread);
        assert!(!callback.fire(StreamEnd::Failed("late".to_string())));

        match rx.recv().await {
            Some(SessionMessage::StreamEnded { stream, end }) => {
                assert_eq!(stream, StreamId(7));
                assert_eq!(end, StreamEnd::Finished);
            }
            _ => panic!("se esperaba StreamEnded"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn late_signal_after_session_closed_is_discarded() {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = CompletionBridge::new(&tx).callback(StreamId(1));

        drop(rx);
        assert!(!callback.fire(StreamEnd::Finished));

        let other = CompletionBridge::new(&tx).callback(StreamId(2));
        drop(tx);
        assert!(!other.fire(StreamEnd::Finished));
    }
}
