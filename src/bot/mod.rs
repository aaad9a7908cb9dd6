//! Superficie de Discord del bot: registro de comandos, despacho de
//! interacciones y anuncios hacia los canales de texto.
//!
//! Esta capa traduce eventos del gateway en llamadas al motor
//! ([`crate::audio`]); nunca retiene los eventos: cada interacción se
//! atiende con una mutación breve de estado o delega en la tarea de
//! reproducción en segundo plano.

pub mod commands;
pub mod handlers;

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{ActivityData, Context, EventHandler, Interaction, OnlineStatus, Ready};
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::GuildId;
use tracing::{error, info, warn};

use crate::audio::{Notifier, PlayerRegistry};
use crate::config::Config;
use crate::sources::{Resolver, Track};
use crate::ui::{buttons, embeds};

pub struct NovaBot {
    config: Arc<Config>,
    registry: Arc<PlayerRegistry>,
    resolver: Arc<Resolver>,
}

impl NovaBot {
    pub fn new(config: Arc<Config>, registry: Arc<PlayerRegistry>, resolver: Arc<Resolver>) -> Self {
        Self {
            config,
            registry,
            resolver,
        }
    }
}

#[async_trait]
impl EventHandler for NovaBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        let result = match self.config.guild_id {
            Some(guild_id) => {
                info!("🏠 Registrando comandos para la guild de desarrollo {guild_id}");
                commands::register_guild_commands(&ctx, GuildId::new(guild_id)).await
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(&ctx).await
            }
        };
        if let Err(e) = result {
            error!("Error al registrar comandos: {e:?}");
        }

        let activity = self
            .config
            .status
            .clone()
            .unwrap_or_else(|| "/play".to_string());
        ctx.set_presence(
            Some(ActivityData::listening(activity)),
            OnlineStatus::DoNotDisturb,
        );
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command) => {
                if let Err(e) = handlers::handle_command(&ctx, command, self).await {
                    error!("Error manejando comando: {e:?}");
                }
            }
            Interaction::Component(component) => {
                if let Err(e) = handlers::handle_component(&ctx, component, self).await {
                    error!("Error manejando componente: {e:?}");
                }
            }
            _ => {}
        }
    }
}

/// Anunciante de producción: publica el embed de "sonando ahora" con los
/// controles en el canal de origen de la pista.
pub struct ChannelNotifier {
    http: Arc<Http>,
}

impl ChannelNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn now_playing(&self, track: &Track, looping: bool) {
        let message = CreateMessage::new()
            .embed(embeds::now_playing(track, looping))
            .components(vec![buttons::player_controls(looping)]);

        if let Err(e) = track.channel_id.send_message(&self.http, message).await {
            warn!("No se pudo anunciar la pista {}: {e}", track.label());
        }
    }
}
