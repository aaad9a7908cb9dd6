use anyhow::Result;
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::CommandOptionType;
use serenity::model::id::GuildId;
use serenity::prelude::Context;

/// Registra comandos globales
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    for command in all_commands() {
        ctx.http.create_global_command(&command).await?;
    }
    Ok(())
}

/// Registra comandos para una guild específica (desarrollo)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, all_commands()).await?;
    Ok(())
}

fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        player_command(),
        pause_command(),
        stop_command(),
        skip_command(),
        loop_command(),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Reproduce música de YouTube o SoundCloud, o busca")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "query",
                "URL o término de búsqueda (prefijo 'sc' para SoundCloud)",
            )
            .required(true),
        )
}

fn player_command() -> CreateCommand {
    CreateCommand::new("player").description("Muestra el estado actual del reproductor")
}

fn pause_command() -> CreateCommand {
    CreateCommand::new("pause").description("Pausa o reanuda la reproducción")
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Detiene la reproducción y vacía la cola")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Salta la pista actual")
}

fn loop_command() -> CreateCommand {
    CreateCommand::new("loop")
        .description("Cambia la repetición de la cola")
        .add_option(CreateCommandOption::new(
            CommandOptionType::Boolean,
            "enabled",
            "Fija la repetición explícitamente (omite para alternar)",
        ))
}
