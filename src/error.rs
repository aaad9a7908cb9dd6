use std::time::Duration;

use thiserror::Error;

/// Fallo al establecer la conexión de voz, independiente del gateway concreto.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct JoinError(pub String);

/// Errores de la superficie de control del reproductor.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no se pudo conectar al canal de voz: {0}")]
    TransportJoin(#[from] JoinError),

    #[error("la cola está llena (máximo {0} pistas)")]
    QueueFull(usize),
}

/// Errores terminales de una invocación del pipeline de frames.
///
/// La cancelación no es un error: el pipeline la reporta como
/// [`StreamOutcome::Canceled`](crate::audio::StreamOutcome).
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no hay conexión de voz activa")]
    NoConnection,

    #[error("no se pudo lanzar el decodificador: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("no se pudo crear el codificador opus: {0}")]
    EncoderInit(#[source] audiopus::Error),

    #[error("error leyendo PCM del decodificador: {0}")]
    PcmRead(#[source] std::io::Error),

    #[error("error codificando frame opus: {0}")]
    Encode(#[source] audiopus::Error),

    #[error("el transporte de voz cerró el canal de frames")]
    TransportClosed,
}

/// Errores del resolutor de pistas (yt-dlp).
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no se pudo ejecutar el resolutor: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("el resolutor superó el tiempo límite de {0:?}")]
    Timeout(Duration),

    #[error("el resolutor falló: {0}")]
    Failed(String),

    #[error("respuesta del resolutor inválida: {0}")]
    Parse(#[source] serde_json::Error),
}
