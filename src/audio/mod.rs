//! # Audio Module
//!
//! Per-guild playback engine for Nova Music Bot.
//!
//! The engine is split in three parts:
//!
//! - [`registry`]: lock-protected guild → player map with
//!   create-on-demand and removal-on-idle semantics.
//! - [`player`]: one [`player::GuildPlayer`] per guild: FIFO queue,
//!   play/pause/skip/loop/stop state machine and the background playback
//!   task that drives the pipeline.
//! - [`pipeline`]: turns one track into a stream of opus frames: ffmpeg
//!   decode subprocess → 20 ms PCM frames → opus encode → voice transport.
//!
//! ## Audio format
//!
//! - **Sample Rate**: 48kHz (Discord standard)
//! - **Bit Depth**: 16-bit signed little-endian
//! - **Channels**: Stereo (2 channels)
//! - **Encoding**: Opus at 128kbps (configurable)

pub mod pipeline;
pub mod player;
pub mod registry;

use std::time::Duration;

use async_trait::async_trait;

use crate::sources::Track;

pub use pipeline::{FfmpegStreamer, StreamOutcome, TrackStreamer};
pub use player::{GuildPlayer, PlayerStatus};
pub use registry::{PlayerDeps, PlayerRegistry};

pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: usize = 2;
/// Muestras por canal en un frame de 20 ms a 48 kHz.
pub const FRAME_SAMPLES: usize = 960;
/// Muestras i16 intercaladas por frame.
pub const FRAME_PCM_LEN: usize = FRAME_SAMPLES * CHANNELS;
/// Bytes s16le por frame.
pub const FRAME_BYTES: usize = FRAME_PCM_LEN * 2;
/// Cota superior segura para un frame opus codificado.
pub const OPUS_FRAME_CAPACITY: usize = 4096;

/// Margen tras unirse a un canal para que el transporte se estabilice.
pub const JOIN_SETTLE: Duration = Duration::from_millis(350);

/// Frontera de notificaciones hacia la plataforma de chat.
///
/// Fire-and-forget desde el punto de vista del motor: un anuncio fallido se
/// registra y la reproducción continúa.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Anuncia la pista que empieza a sonar en su canal de origen.
    async fn now_playing(&self, track: &Track, looping: bool);
}
