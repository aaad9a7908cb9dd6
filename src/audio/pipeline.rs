use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use audiopus::coder::Encoder;
use audiopus::{Application, Bitrate, Channels, SampleRate};
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::audio::{FRAME_BYTES, FRAME_PCM_LEN, OPUS_FRAME_CAPACITY, SAMPLE_RATE};
use crate::config::Config;
use crate::error::PipelineError;
use crate::sources::Track;
use crate::voice::VoiceConnection;

/// Resultado terminal de una invocación del pipeline.
///
/// La cancelación (skip/stop) es un desenlace esperado, no un error; los
/// fallos reales viajan como [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// La fuente se agotó con normalidad.
    Completed,
    /// Se observó la cancelación externa.
    Canceled,
}

/// Convierte una pista en frames para el transporte.
///
/// Es la costura que el reproductor usa para no depender del decodificador
/// concreto; en producción la implementa [`FfmpegStreamer`].
#[async_trait]
pub trait TrackStreamer: Send + Sync {
    async fn stream(
        &self,
        conn: Arc<VoiceConnection>,
        track: &Track,
        cancel: CancellationToken,
        pause: watch::Receiver<bool>,
    ) -> Result<StreamOutcome, PipelineError>;
}

/// Pipeline de producción: ffmpeg → PCM s16le → opus → transporte.
pub struct FfmpegStreamer {
    config: Arc<Config>,
}

impl FfmpegStreamer {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TrackStreamer for FfmpegStreamer {
    async fn stream(
        &self,
        conn: Arc<VoiceConnection>,
        track: &Track,
        cancel: CancellationToken,
        pause: watch::Receiver<bool>,
    ) -> Result<StreamOutcome, PipelineError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(build_ffmpeg_args(track))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(PipelineError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::Spawn(io::Error::other("stdout no disponible")))?;

        // El stderr de ffmpeg solo interesa para diagnóstico.
        if let Some(stderr) = child.stderr.take() {
            let title = track.title.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    trace!("ffmpeg [{title}]: {line}");
                }
            });
        }

        let mut encoder = Encoder::new(SampleRate::Hz48000, Channels::Stereo, Application::Audio)
            .map_err(PipelineError::EncoderInit)?;
        encoder
            .set_bitrate(Bitrate::BitsPerSecond(self.config.opus_bitrate as i32))
            .map_err(PipelineError::EncoderInit)?;

        conn.set_speaking(true);
        let mut reader = BufReader::new(stdout);
        let result = pump_frames(&mut reader, &mut encoder, &conn, &cancel, pause).await;
        conn.set_speaking(false);

        // Terminar y cosechar el subproceso siempre, también al cancelar.
        let _ = child.start_kill();
        let _ = child.wait().await;

        debug!("🎛️ Pipeline terminado para {}: {result:?}", track.label());
        result
    }
}

/// Bucle central: lee un frame de 20 ms, lo codifica y lo entrega.
///
/// La cancelación se comprueba antes de cada lectura, durante la espera de
/// pausa y durante la entrega, de modo que nunca tarda más de un frame o un
/// intervalo de pausa en observarse.
async fn pump_frames<R>(
    reader: &mut R,
    encoder: &mut Encoder,
    conn: &VoiceConnection,
    cancel: &CancellationToken,
    mut pause: watch::Receiver<bool>,
) -> Result<StreamOutcome, PipelineError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut byte_buf = [0u8; FRAME_BYTES];
    let mut pcm_buf = [0i16; FRAME_PCM_LEN];
    let mut opus_buf = [0u8; OPUS_FRAME_CAPACITY];

    loop {
        if cancel.is_cancelled() {
            return Ok(StreamOutcome::Canceled);
        }

        // En pausa no se consume entrada; se espera a que el estado cambie
        // sin dejar de observar la cancelación.
        while *pause.borrow() {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(StreamOutcome::Canceled),
                changed = pause.changed() => {
                    if changed.is_err() {
                        return Ok(StreamOutcome::Canceled);
                    }
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Ok(StreamOutcome::Canceled),
            read = reader.read_exact(&mut byte_buf) => match read {
                Ok(_) => {}
                // Un último frame parcial es el final normal del stream.
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(StreamOutcome::Completed);
                }
                Err(e) => return Err(PipelineError::PcmRead(e)),
            }
        }

        for (sample, bytes) in pcm_buf.iter_mut().zip(byte_buf.chunks_exact(2)) {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }

        let encoded = encoder
            .encode(&pcm_buf, &mut opus_buf)
            .map_err(PipelineError::Encode)?;
        let frame = Bytes::copy_from_slice(&opus_buf[..encoded]);

        // Un canal saliente lleno nunca debe bloquear más allá de la
        // comprobación de cancelación.
        tokio::select! {
            _ = cancel.cancelled() => return Ok(StreamOutcome::Canceled),
            sent = conn.send_frame(frame) => {
                if sent.is_err() {
                    return Err(PipelineError::TransportClosed);
                }
            }
        }
    }
}

/// Argumentos de ffmpeg para decodificar el stream de una pista a PCM crudo.
fn build_ffmpeg_args(track: &Track) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-reconnect".into(),
        "1".into(),
        "-reconnect_streamed".into(),
        "1".into(),
        "-reconnect_delay_max".into(),
        "5".into(),
    ];

    if let Some(lines) = header_lines(&track.http_headers) {
        args.push("-headers".into());
        args.push(lines);
    }

    args.extend([
        "-i".into(),
        track.stream_url.clone(),
        "-vn".into(),
        "-f".into(),
        "s16le".into(),
        "-ac".into(),
        crate::audio::CHANNELS.to_string(),
        "-ar".into(),
        SAMPLE_RATE.to_string(),
        "pipe:1".into(),
    ]);

    args
}

/// Serializa cabeceras en orden determinista para que las invocaciones sean
/// reproducibles.
fn header_lines(headers: &HashMap<String, String>) -> Option<String> {
    if headers.is_empty() {
        return None;
    }
    let mut pairs: Vec<String> = headers
        .iter()
        .map(|(name, value)| format!("{name}: {value}"))
        .collect();
    pairs.sort();
    Some(format!("{}\r\n", pairs.join("\r\n")))
}
