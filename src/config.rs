use std::time::Duration;

use anyhow::Result;

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Audio
    pub opus_bitrate: u32,
    pub max_queue_size: usize,

    // Binarios externos
    pub ffmpeg_path: String,
    pub ytdlp_path: String,

    // Tiempos
    pub resolve_timeout: Duration,
    pub idle_disconnect: Duration,

    // Presencia
    pub status: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),

            opus_bitrate: std::env::var("OPUS_BITRATE")
                .unwrap_or_else(|_| "128000".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,

            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),

            resolve_timeout: Duration::from_secs(
                std::env::var("RESOLVE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "45".to_string())
                    .parse()?,
            ),
            idle_disconnect: Duration::from_secs(
                std::env::var("IDLE_DISCONNECT_SECS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()?,
            ),

            status: std::env::var("BOT_STATUS").ok().filter(|s| !s.trim().is_empty()),
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks sobre los valores cargados.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN no puede estar vacío");
        }

        if self.opus_bitrate > 510_000 {
            anyhow::bail!(
                "El bitrate opus no puede superar 510kbps, recibido: {}",
                self.opus_bitrate
            );
        }

        if self.opus_bitrate < 8_000 {
            anyhow::bail!(
                "El bitrate opus es demasiado bajo, mínimo 8kbps, recibido: {}",
                self.opus_bitrate
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor que 0");
        }

        if self.resolve_timeout.is_zero() || self.idle_disconnect.is_zero() {
            anyhow::bail!("Los tiempos de espera deben ser mayores que cero");
        }

        Ok(())
    }

    /// Resumen apto para logs (sin el token).
    pub fn summary(&self) -> String {
        format!(
            "Config: {}kbps opus, cola máx {}, resolutor {:?}, desconexión {:?}, guild dev {}",
            self.opus_bitrate / 1000,
            self.max_queue_size,
            self.resolve_timeout,
            self.idle_disconnect,
            self.guild_id
                .map_or("global".to_string(), |id| id.to_string()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            opus_bitrate: 128_000,
            max_queue_size: 500,
            ffmpeg_path: "ffmpeg".to_string(),
            ytdlp_path: "yt-dlp".to_string(),
            resolve_timeout: Duration::from_secs(45),
            idle_disconnect: Duration::from_secs(90),
            status: None,
        }
    }
}
