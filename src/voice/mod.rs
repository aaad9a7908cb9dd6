//! Frontera con el transporte de voz.
//!
//! El motor de reproducción produce frames opus y los entrega por un canal
//! acotado; el driver concreto (ver [`discord`]) los consume y los envía por
//! la conexión real. El motor nunca conoce los detalles del transporte.

pub mod discord;

use async_trait::async_trait;
use bytes::Bytes;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::JoinError;

/// Frames de ~20 ms; ocho frames dan margen sin acumular latencia.
pub const FRAME_CHANNEL_CAPACITY: usize = 8;

/// Establece conexiones de voz por guild.
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceConnection, JoinError>;
}

/// Extremo del motor: frames salientes y estado de speaking.
///
/// Propiedad exclusiva del reproductor de su guild; solo sus métodos bajo
/// candado la reemplazan o liberan.
pub struct VoiceConnection {
    channel_id: ChannelId,
    frames: flume::Sender<Bytes>,
    speaking: watch::Sender<bool>,
    closer: CancellationToken,
}

/// Extremo del driver: consume lo que el motor produce.
pub struct VoiceReceiver {
    pub frames: flume::Receiver<Bytes>,
    pub speaking: watch::Receiver<bool>,
    pub closed: CancellationToken,
}

impl VoiceConnection {
    /// Crea el par conexión/receptor para un canal de voz.
    pub fn new(channel_id: ChannelId) -> (Self, VoiceReceiver) {
        let (frame_tx, frame_rx) = flume::bounded(FRAME_CHANNEL_CAPACITY);
        let (speaking_tx, speaking_rx) = watch::channel(false);
        let closer = CancellationToken::new();

        let connection = Self {
            channel_id,
            frames: frame_tx,
            speaking: speaking_tx,
            closer: closer.clone(),
        };
        let receiver = VoiceReceiver {
            frames: frame_rx,
            speaking: speaking_rx,
            closed: closer,
        };
        (connection, receiver)
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    /// Entrega un frame codificado al driver. Aplica la contrapresión del
    /// canal acotado; falla si el driver soltó su extremo.
    pub async fn send_frame(&self, frame: Bytes) -> Result<(), flume::SendError<Bytes>> {
        self.frames.send_async(frame).await
    }

    pub fn set_speaking(&self, active: bool) {
        let _ = self.speaking.send(active);
    }

    /// Pide al driver que libere la conexión. Idempotente.
    pub fn disconnect(&self) {
        self.closer.cancel();
    }

    #[allow(dead_code)]
    pub fn is_closed(&self) -> bool {
        self.closer.is_cancelled()
    }
}

impl Drop for VoiceConnection {
    fn drop(&mut self) {
        // Un reproductor desalojado nunca debe dejar al driver esperando.
        self.closer.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disconnect_signals_the_driver_side() {
        let (connection, receiver) = VoiceConnection::new(ChannelId::new(5));
        assert!(!receiver.closed.is_cancelled());

        connection.disconnect();
        assert!(receiver.closed.is_cancelled());
        assert!(connection.is_closed());
    }

    #[tokio::test]
    async fn test_send_frame_fails_once_receiver_is_gone() {
        let (connection, receiver) = VoiceConnection::new(ChannelId::new(5));
        drop(receiver);
        assert!(connection.send_frame(Bytes::from_static(b"x")).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_closes_the_connection() {
        let (connection, receiver) = VoiceConnection::new(ChannelId::new(5));
        drop(connection);
        assert!(receiver.closed.is_cancelled());
    }

    #[tokio::test]
    async fn test_speaking_toggle_reaches_receiver() {
        let (connection, receiver) = VoiceConnection::new(ChannelId::new(5));
        connection.set_speaking(true);
        assert!(*receiver.speaking.borrow());
        connection.set_speaking(false);
        assert!(!*receiver.speaking.borrow());
    }
}
