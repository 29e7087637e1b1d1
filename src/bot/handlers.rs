use anyhow::Result;
use serenity::{
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{debug, error, info, warn};

use super::{
    music::{CommandResult, Invocation, MusicCommands},
    JukeboxBot,
};
use crate::{
    audio::queue::AutoplayMode,
    ui::{messages::InteractionTarget, send_message, Notice},
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &JukeboxBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    bot.announcer().set_channel(guild_id, command.channel_id);

    let invocation = Invocation {
        guild_id,
        user_name: display_name(&command),
        user_channel: get_user_voice_channel(ctx, guild_id, command.user.id),
    };

    let gateway = bot.gateway(ctx);
    let commands = MusicCommands::new(bot.engine(), bot.catalog(), &gateway);
    let target = InteractionTarget::new(ctx.http.clone(), command.clone());

    let result: CommandResult = match command.data.name.as_str() {
        "play" => {
            // Las búsquedas en el catálogo pueden tardar más que el plazo de respuesta;
            // sin canal de voz el error sale en la respuesta inicial
            if invocation.user_channel.is_some() {
                if let Err(e) = target.defer().await {
                    warn!("No se pudo posponer la respuesta: {}", e);
                }
            }

            let query_type = string_option(&command, "querytype");
            let query = string_option(&command, "query");
            commands.play(&invocation, query_type, query).await
        }
        "stop" => commands.stop(&invocation).await,
        "queue" => commands.queue(&invocation).await,
        "clear" => commands.clear(&invocation).await,
        "skip" => commands.skip(&invocation).await,
        "autoplay" => {
            let mode = string_option(&command, "mode")
                .and_then(|mode| mode.parse::<AutoplayMode>().ok())
                .unwrap_or_default();
            commands.autoplay(&invocation, mode).await
        }
        other => {
            warn!("Comando no reconocido: {}", other);
            return Ok(());
        }
    };

    let notices = match result {
        Ok(notices) => notices,
        Err(e) if e.is_internal() => {
            error!(
                "Error en /{} (guild {}): {:?}",
                command.data.name, guild_id, e
            );
            vec![Notice::error(e.user_message())]
        }
        Err(e) => {
            debug!("/{} rechazado en guild {}: {}", command.data.name, guild_id, e);
            vec![Notice::error(e.user_message())]
        }
    };

    for notice in &notices {
        send_message(&target, notice, bot.retry_policy()).await;
    }

    Ok(())
}

/// Obtiene el valor de una opción de texto del comando
fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

/// Apodo en el servidor, o el nombre global del usuario
fn display_name(command: &CommandInteraction) -> String {
    command
        .member
        .as_ref()
        .map(|member| member.display_name().to_string())
        .unwrap_or_else(|| command.user.display_name().to_string())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
