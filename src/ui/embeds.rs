use serenity::all::Timestamp;
use serenity::builder::CreateEmbed;

use crate::audio::PlayerStatus;
use crate::sources::Track;

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const QUEUED_BLURPLE: Colour = Colour::new(0x5865F2);
    pub const PLAYING_TEAL: Colour = Colour::new(0x1ABC9C);
    pub const PAUSED_ORANGE: Colour = Colour::new(0xFFA500);
}

/// Embed de confirmación al encolar una pista.
pub fn queued(track: &Track, position: usize) -> CreateEmbed {
    let title = if position == 1 {
        format!("A continuación • {}", track.title)
    } else {
        format!("En cola • {}", track.title)
    };

    // El embed queda fechado en el momento del encolado.
    let queued_at = Timestamp::from_unix_timestamp(track.queued_at.timestamp())
        .unwrap_or_else(|_| Timestamp::now());

    let mut embed = CreateEmbed::default()
        .title(title)
        .url(&track.web_url)
        .color(colors::QUEUED_BLURPLE)
        .timestamp(queued_at)
        .field("⏱️ Duración", track.human_duration(), true)
        .field("🔗 Fuente", track.source.as_str(), true)
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by), true)
        .field("📍 Posición", format!("#{position}"), true);

    if !track.thumbnail.is_empty() {
        embed = embed.thumbnail(&track.thumbnail);
    }

    embed
}

/// Embed de "sonando ahora", con el título según el estado de bucle.
pub fn now_playing(track: &Track, looping: bool) -> CreateEmbed {
    let status = if looping { "Repitiendo" } else { "Sonando ahora" };

    let mut embed = CreateEmbed::default()
        .title(format!("{status} • {}", track.title))
        .url(&track.web_url)
        .color(colors::PLAYING_TEAL)
        .timestamp(Timestamp::now())
        .field("⏱️ Duración", track.human_duration(), true)
        .field("🔗 Fuente", track.source.as_str(), true);

    if !track.author.is_empty() {
        embed = embed.field("🎤 Autor", &track.author, true);
    }
    if !track.thumbnail.is_empty() {
        embed = embed.thumbnail(&track.thumbnail);
    }

    embed
}

/// Embed de estado para el comando /player.
pub fn player_status(track: &Track, status: &PlayerStatus) -> CreateEmbed {
    let mut embed = now_playing(track, status.looping);

    if status.queue_len > 0 {
        embed = embed.field("🎶 En cola", format!("{} pistas", status.queue_len), true);
    }
    if status.paused {
        embed = embed
            .color(colors::PAUSED_ORANGE)
            .field("Estado", "⏸️ Pausado", true);
    }

    embed
}
