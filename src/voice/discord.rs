use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serenity::model::id::{ChannelId, GuildId};
use songbird::input::{AudioStream, Input, LiveInput};
use songbird::{Call, Songbird};
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::audio::{CHANNELS, FRAME_SAMPLES, SAMPLE_RATE};
use crate::error::JoinError;
use crate::voice::{VoiceConnection, VoiceGateway, VoiceReceiver};

/// Gateway de producción sobre songbird: une el bot al canal de voz y
/// puentea los frames opus del motor hacia el driver.
///
/// El driver de songbird consume entradas DCA con passthrough de opus, así
/// que los frames ya codificados viajan hasta la conexión sin recodificarse.
/// El driver gestiona por sí mismo el estado de speaking mientras reproduce.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<VoiceConnection, JoinError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| JoinError(e.to_string()))?;

        let (connection, receiver) = VoiceConnection::new(channel_id);
        tokio::spawn(drive_call(self.manager.clone(), guild_id, call, receiver));
        Ok(connection)
    }
}

/// Alimenta al driver con los frames del motor y desmonta la llamada cuando
/// el reproductor libera la conexión.
async fn drive_call(
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    receiver: VoiceReceiver,
) {
    let stream = OpusFrameSource::new(receiver.frames);
    let mut hint = Hint::new();
    hint.with_extension("dca");

    let input = Input::Live(
        LiveInput::Raw(AudioStream {
            input: Box::new(stream) as Box<dyn MediaSource>,
            hint: Some(hint),
        }),
        None,
    );

    let handle = {
        let mut call = call.lock().await;
        call.play_only_input(input)
    };

    // El driver de songbird gestiona el flag de speaking por sí mismo;
    // aquí solo se deja rastro de las transiciones del motor.
    let mut speaking = receiver.speaking.clone();
    tokio::spawn(async move {
        while speaking.changed().await.is_ok() {
            debug!("🎙️ speaking={}", *speaking.borrow());
        }
    });

    receiver.closed.cancelled().await;

    let _ = handle.stop();
    if let Err(e) = manager.remove(guild_id).await {
        debug!("La llamada de guild {guild_id} ya estaba liberada: {e}");
    } else {
        debug!("📴 Llamada de voz liberada en guild {guild_id}");
    }
}

/// Expone el canal de frames opus como un stream DCA1 legible por el
/// probe de songbird: cabecera JSON y frames con prefijo de longitud i16.
struct OpusFrameSource {
    frames: flume::Receiver<Bytes>,
    buffer: Vec<u8>,
    pos: usize,
}

impl OpusFrameSource {
    fn new(frames: flume::Receiver<Bytes>) -> Self {
        Self {
            frames,
            buffer: dca1_header(),
            pos: 0,
        }
    }
}

fn dca1_header() -> Vec<u8> {
    let metadata = serde_json::json!({
        "dca": {
            "version": 1,
            "tool": {
                "name": "nova-music",
                "version": env!("CARGO_PKG_VERSION"),
                "url": "",
                "author": "",
            },
        },
        "opus": {
            "mode": "music",
            "sample_rate": SAMPLE_RATE,
            "frame_size": FRAME_SAMPLES,
            "abr": null,
            "vbr": true,
            "channels": CHANNELS,
        },
        "info": null,
        "origin": null,
        "extra": null,
    });
    let body = serde_json::to_vec(&metadata).unwrap_or_default();
    if body.is_empty() {
        warn!("No se pudo serializar la cabecera DCA");
    }

    let mut header = Vec::with_capacity(8 + body.len());
    header.extend_from_slice(b"DCA1");
    header.extend_from_slice(&(body.len() as i32).to_le_bytes());
    header.extend_from_slice(&body);
    header
}

impl Read for OpusFrameSource {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos == self.buffer.len() {
            // El driver lee en su propio hilo: el recv bloqueante marca el
            // ritmo hasta que el canal se cierra (fin de la conexión).
            match self.frames.recv() {
                Ok(frame) => {
                    self.buffer.clear();
                    self.pos = 0;
                    self.buffer
                        .extend_from_slice(&(frame.len() as i16).to_le_bytes());
                    self.buffer.extend_from_slice(&frame);
                }
                Err(_) => return Ok(0),
            }
        }

        let available = self.buffer.len() - self.pos;
        let count = available.min(out.len());
        out[..count].copy_from_slice(&self.buffer[self.pos..self.pos + count]);
        self.pos += count;
        Ok(count)
    }
}

impl Seek for OpusFrameSource {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "un stream de voz en directo no admite seek",
        ))
    }
}

impl MediaSource for OpusFrameSource {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dca1_header_is_well_formed() {
        let header = dca1_header();
        assert_eq!(&header[..4], b"DCA1");

        let json_len = i32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
        assert_eq!(header.len(), 8 + json_len);

        let metadata: serde_json::Value = serde_json::from_slice(&header[8..]).unwrap();
        assert_eq!(metadata["dca"]["version"], 1);
        assert_eq!(metadata["opus"]["sample_rate"], 48_000);
        assert_eq!(metadata["opus"]["channels"], 2);
    }

    #[test]
    fn test_frame_source_emits_header_then_length_prefixed_frames() {
        let (tx, rx) = flume::bounded(4);
        tx.send(Bytes::from_static(&[0xAA, 0xBB, 0xCC])).unwrap();
        drop(tx);

        let mut source = OpusFrameSource::new(rx);
        let mut all = Vec::new();
        source.read_to_end(&mut all).unwrap();

        let json_len = i32::from_le_bytes(all[4..8].try_into().unwrap()) as usize;
        let frames = &all[8 + json_len..];
        assert_eq!(&frames[..2], &3i16.to_le_bytes());
        assert_eq!(&frames[2..], &[0xAA, 0xBB, 0xCC]);
    }
}
