pub mod resolver;

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serenity::model::id::{ChannelId, UserId};

pub use resolver::Resolver;

/// Plataforma de origen de una pista.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSource {
    YouTube,
    SoundCloud,
    Unknown,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::YouTube => "YouTube",
            TrackSource::SoundCloud => "SoundCloud",
            TrackSource::Unknown => "Desconocida",
        }
    }
}

/// Metadatos de una pista encolada para reproducción.
///
/// Inmutable una vez construida; cada instancia pertenece en exclusiva al
/// slot de cola (o al slot `current`) que la contiene.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub author: String,
    pub web_url: String,
    pub stream_url: String,
    pub thumbnail: String,
    /// Cero ⇒ duración indeterminada (directo).
    pub duration: Duration,
    pub source: TrackSource,
    pub requested_by: UserId,
    /// Canal de texto donde se pidió la pista; destino de los anuncios.
    pub channel_id: ChannelId,
    /// Cabeceras HTTP necesarias para descargar el stream.
    pub http_headers: HashMap<String, String>,
    pub queued_at: DateTime<Utc>,
}

impl Track {
    pub fn is_live(&self) -> bool {
        self.duration.is_zero()
    }

    /// Identificador compacto legible para logs.
    pub fn label(&self) -> String {
        format!("{} — {}", self.title.trim(), self.source.as_str())
    }

    /// Duración en formato mm:ss o hh:mm:ss, o "en vivo" si es un directo.
    pub fn human_duration(&self) -> String {
        if self.is_live() {
            return "🔴 En vivo".to_string();
        }
        let seconds = self.duration.as_secs();
        let hours = seconds / 3600;
        let minutes = (seconds % 3600) / 60;
        let secs = seconds % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, secs)
        } else {
            format!("{:02}:{:02}", minutes, secs)
        }
    }
}

#[cfg(test)]
pub(crate) fn test_track(title: &str) -> Track {
    Track {
        id: title.to_string(),
        title: title.to_string(),
        author: "autor".to_string(),
        web_url: format!("https://example.com/{title}"),
        stream_url: format!("https://cdn.example.com/{title}"),
        thumbnail: String::new(),
        duration: Duration::from_secs(30),
        source: TrackSource::YouTube,
        requested_by: UserId::new(1),
        channel_id: ChannelId::new(1),
        http_headers: HashMap::new(),
        queued_at: Utc::now(),
    }
}
