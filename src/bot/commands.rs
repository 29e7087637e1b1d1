use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};

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

pub fn all_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        stop_command(),
        queue_command(),
        clear_command(),
        skip_command(),
        autoplay_command(),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play")
        .description("Plays a specified track")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "querytype",
                "Whether what you're searching is a track, album or playlist",
            )
            .add_string_choice("Track", "track")
            .add_string_choice("Album", "album")
            .add_string_choice("Playlist", "playlist"),
        )
        .add_option(CreateCommandOption::new(
            CommandOptionType::String,
            "query",
            "Enter a search query",
        ))
}

fn stop_command() -> CreateCommand {
    CreateCommand::new("stop").description("Stop playing the current track")
}

fn queue_command() -> CreateCommand {
    CreateCommand::new("queue").description("View the current queue")
}

fn clear_command() -> CreateCommand {
    CreateCommand::new("clear").description("Clear the current queue")
}

fn skip_command() -> CreateCommand {
    CreateCommand::new("skip").description("Skip the current track")
}

fn autoplay_command() -> CreateCommand {
    CreateCommand::new("autoplay")
        .description("Toggles autoplay")
        .add_option(
            CreateCommandOption::new(
                CommandOptionType::String,
                "mode",
                "Determines the method to use when autoplaying",
            )
            .required(true)
            .add_string_choice("None", "none")
            .add_string_choice("Random", "random")
            .add_string_choice("Similar", "similar"),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registers_one_command_per_action() {
        let names: Vec<String> = all_commands()
            .iter()
            .map(|command| {
                serde_json::to_value(command).unwrap()["name"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        assert_eq!(names, vec!["play", "stop", "queue", "clear", "skip", "autoplay"]);
    }

    #[test]
    fn test_play_options_are_optional() {
        let play = serde_json::to_value(play_command()).unwrap();
        let options = play["options"].as_array().unwrap();

        assert_eq!(options.len(), 2);
        assert!(options.iter().all(|option| option["required"] != serde_json::Value::Bool(true)));
        assert_eq!(options[0]["choices"].as_array().unwrap().len(), 3);
    }
}
