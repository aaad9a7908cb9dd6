use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serenity::model::id::{ChannelId, UserId};
use tokio::process::Command;
use tracing::debug;

use crate::error::ResolveError;
use crate::sources::{Track, TrackSource};

/// Resuelve una consulta o URL en metadatos de pista usando yt-dlp.
pub struct Resolver {
    executable: String,
    timeout: Duration,
}

impl Resolver {
    pub fn new(executable: impl Into<String>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
        }
    }

    /// Ejecuta yt-dlp sobre la consulta y mapea su JSON a un [`Track`].
    ///
    /// El subproceso queda acotado por el timeout configurado; si lo supera,
    /// se mata y se devuelve [`ResolveError::Timeout`].
    pub async fn resolve(
        &self,
        query: &str,
        requested_by: UserId,
        channel_id: ChannelId,
    ) -> Result<Track, ResolveError> {
        let prepared = prepare_query(query);
        debug!("🔎 Resolviendo: {prepared}");

        let mut command = Command::new(&self.executable);
        command
            .arg("--no-playlist")
            .arg("--ignore-errors")
            .arg("--dump-json")
            .arg("--no-warnings")
            .arg("-f")
            .arg("bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio/best")
            .arg("--audio-quality")
            .arg("0")
            .arg(&prepared)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| ResolveError::Timeout(self.timeout))?
            .map_err(ResolveError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolveError::Failed(stderr.trim().to_string()));
        }

        let item: YtdlpItem =
            serde_json::from_slice(&output.stdout).map_err(ResolveError::Parse)?;

        let track = map_item(item, requested_by, channel_id);
        debug!("✅ Resuelto: {} [{}]", track.label(), track.id);
        Ok(track)
    }
}

#[derive(Debug, Default, Deserialize)]
struct YtdlpItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    uploader: String,
    #[serde(default)]
    webpage_url: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    thumbnail: String,
    #[serde(default)]
    extractor_key: String,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

fn map_item(item: YtdlpItem, requested_by: UserId, channel_id: ChannelId) -> Track {
    let duration = item
        .duration
        .filter(|seconds| *seconds > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::ZERO);

    let extractor = item.extractor_key.to_lowercase();
    let source = if extractor.contains("youtube") {
        TrackSource::YouTube
    } else if extractor.contains("soundcloud") {
        TrackSource::SoundCloud
    } else {
        TrackSource::Unknown
    };

    let web_url = if item.webpage_url.trim().is_empty() {
        item.url.clone()
    } else {
        item.webpage_url
    };

    Track {
        id: item.id,
        title: item.title,
        author: item.uploader,
        web_url,
        stream_url: item.url,
        thumbnail: item.thumbnail,
        duration,
        source,
        requested_by,
        channel_id,
        http_headers: item.http_headers,
        queued_at: Utc::now(),
    }
}

/// Prepara la consulta: las URL pasan tal cual, el prefijo `sc ` busca en
/// SoundCloud y el resto busca en YouTube.
fn prepare_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() || looks_like_url(trimmed) {
        return trimmed.to_string();
    }
    if let Some(rest) = trimmed
        .to_lowercase()
        .strip_prefix("sc ")
        .map(|_| trimmed[3..].trim())
    {
        return format!("scsearch:{rest}");
    }
    format!("ytsearch:{trimmed}")
}

fn looks_like_url(value: &str) -> bool {
    if !value.contains("://") {
        return false;
    }
    match url::Url::parse(value) {
        Ok(parsed) => !parsed.scheme().is_empty() && parsed.host_str().is_some(),
        Err(_) => false,
    }
}
