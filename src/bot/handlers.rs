use anyhow::Result;
use serenity::builder::{
    CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::{CommandInteraction, ComponentInteraction};
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::prelude::Context;
use tracing::info;

use crate::bot::NovaBot;
use crate::ui::buttons::{self, button_ids};
use crate::ui::embeds;

const NOTHING_PLAYING: &str = "Nada está sonando ahora mismo.";

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &NovaBot) -> Result<()> {
    let Some(guild_id) = command.guild_id else {
        return respond_error(ctx, &command, "Este comando solo funciona en un servidor.").await;
    };

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    match command.data.name.as_str() {
        "play" => handle_play(ctx, command, bot, guild_id).await,
        "player" => handle_player(ctx, command, bot, guild_id).await,
        "pause" => handle_pause(ctx, command, bot, guild_id).await,
        "stop" => handle_stop(ctx, command, bot, guild_id).await,
        "skip" => handle_skip(ctx, command, bot, guild_id).await,
        "loop" => handle_loop(ctx, command, bot, guild_id).await,
        _ => respond_error(ctx, &command, "❌ Comando no reconocido").await,
    }
}

async fn handle_play(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if query.is_empty() {
        return respond_error(ctx, &command, "Indica una URL o un término de búsqueda.").await;
    }

    let Some(voice_channel) = user_voice_channel(ctx, guild_id, command.user.id) else {
        return respond_error(
            ctx,
            &command,
            "Debes estar en un canal de voz para usar /play.",
        )
        .await;
    };

    // Conectar y resolver puede tardar: se difiere la respuesta.
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let player = bot.registry.get_or_create(guild_id);

    if let Err(e) = player.ensure_connected(voice_channel).await {
        return edit_with_error(ctx, &command, format!("No pude conectarme al canal de voz: {e}"))
            .await;
    }

    let track = match bot
        .resolver
        .resolve(&query, command.user.id, command.channel_id)
        .await
    {
        Ok(track) => track,
        Err(e) => {
            return edit_with_error(ctx, &command, format!("No pude encontrar la pista: {e}"))
                .await;
        }
    };

    let queued = track.clone();
    match player.enqueue(track) {
        Ok(position) => {
            let content = format!("En cola **{}** — posición #{position}.", queued.title);
            command
                .edit_response(
                    &ctx.http,
                    EditInteractionResponse::new()
                        .content(content)
                        .embed(embeds::queued(&queued, position)),
                )
                .await?;
            Ok(())
        }
        Err(e) => edit_with_error(ctx, &command, e.to_string()).await,
    }
}

async fn handle_player(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let status = bot.registry.get(guild_id).map(|player| player.status());
    let Some(status) = status else {
        return respond_error(ctx, &command, NOTHING_PLAYING).await;
    };
    let Some(track) = status.current.clone() else {
        return respond_error(ctx, &command, NOTHING_PLAYING).await;
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embeds::player_status(&track, &status))
                    .components(vec![buttons::player_controls(status.looping)]),
            ),
        )
        .await?;
    Ok(())
}

async fn handle_pause(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_error(ctx, &command, NOTHING_PLAYING).await;
    };
    if player.status().current.is_none() {
        return respond_error(ctx, &command, NOTHING_PLAYING).await;
    }

    let message = if player.pause() {
        "⏸️ Reproducción pausada."
    } else {
        "▶️ Reproducción reanudada."
    };
    respond_success(ctx, &command, message).await
}

async fn handle_stop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_error(ctx, &command, "No hay nada que detener.").await;
    };

    if player.stop() {
        respond_success(ctx, &command, "⏹️ Reproducción detenida y cola vaciada.").await
    } else {
        respond_error(ctx, &command, "No hay nada que detener.").await
    }
}

async fn handle_skip(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_error(ctx, &command, "No hay pista activa que saltar.").await;
    };

    if player.skip() {
        respond_success(ctx, &command, "⏭️ Pista saltada.").await
    } else {
        respond_error(ctx, &command, "No hay pista activa que saltar.").await
    }
}

async fn handle_loop(
    ctx: &Context,
    command: CommandInteraction,
    bot: &NovaBot,
    guild_id: GuildId,
) -> Result<()> {
    let Some(player) = bot.registry.get(guild_id) else {
        return respond_error(ctx, &command, "No hay nada que repetir.").await;
    };

    let explicit = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "enabled")
        .and_then(|opt| opt.value.as_bool());

    let message = if player.toggle_loop(explicit) {
        "🔁 Repetición activada."
    } else {
        "Repetición desactivada."
    };
    respond_success(ctx, &command, message).await
}

/// Maneja los botones del reproductor
pub async fn handle_component(
    ctx: &Context,
    component: ComponentInteraction,
    bot: &NovaBot,
) -> Result<()> {
    let Some(guild_id) = component.guild_id else {
        return Ok(());
    };

    info!(
        "🔘 Botón {} pulsado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    let Some(player) = bot.registry.get(guild_id) else {
        return component_reply(ctx, &component, NOTHING_PLAYING).await;
    };

    let message = match component.data.custom_id.as_str() {
        button_ids::PAUSE => {
            if player.status().current.is_none() {
                NOTHING_PLAYING
            } else if player.pause() {
                "⏸️ Reproducción pausada."
            } else {
                "▶️ Reproducción reanudada."
            }
        }
        button_ids::STOP => {
            if player.stop() {
                "⏹️ Reproducción detenida y cola vaciada."
            } else {
                "No hay nada que detener."
            }
        }
        button_ids::SKIP => {
            if player.skip() {
                "⏭️ Pista saltada."
            } else {
                "No hay pista activa que saltar."
            }
        }
        button_ids::LOOP => {
            if player.toggle_loop(None) {
                "🔁 Repetición activada."
            } else {
                "Repetición desactivada."
            }
        }
        _ => "❌ Acción no reconocida",
    };

    component_reply(ctx, &component, message).await
}

/// Canal de voz del usuario según la caché del gateway, si está en alguno.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}

async fn edit_with_error(
    ctx: &Context,
    command: &CommandInteraction,
    message: String,
) -> Result<()> {
    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(message))
        .await?;
    Ok(())
}

async fn respond_error(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn respond_success(ctx: &Context, command: &CommandInteraction, message: &str) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(message),
            ),
        )
        .await?;
    Ok(())
}

async fn component_reply(
    ctx: &Context,
    component: &ComponentInteraction,
    message: &str,
) -> Result<()> {
    component
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(message)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
