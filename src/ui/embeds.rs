use serenity::builder::{CreateEmbed, CreateEmbedFooter};

use super::messages::{Notice, NoticeKind};
use crate::{
    audio::queue::{AutoplayMode, QueueSnapshot},
    sources::{Album, Playlist, Track},
};

/// Nombre del adjunto usado como miniatura
pub const THUMBNAIL_NAME: &str = "image.png";

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Subsonic Jukebox";

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::new(0x50C470);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
}

/// Convierte un aviso en embed
pub fn create_embed(notice: &Notice) -> CreateEmbed {
    let color = match notice.kind {
        NoticeKind::Success => colors::SUCCESS_GREEN,
        NoticeKind::Error => colors::ERROR_RED,
    };

    let mut embed = CreateEmbed::default()
        .title(&notice.header)
        .color(color)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER));

    if let Some(body) = &notice.body {
        embed = embed.description(body);
    }

    if notice.thumbnail.is_some() {
        embed = embed.thumbnail(format!("attachment://{THUMBNAIL_NAME}"));
    }

    embed
}

fn track_line(track: &Track) -> String {
    format!(
        "**{}** - *{}*\n{} ({})",
        track.title,
        track.artist,
        track.album,
        track.duration_printable()
    )
}

pub fn now_playing(track: &Track, cover: Option<Vec<u8>>) -> Notice {
    Notice::success("Now Playing:")
        .with_body(track_line(track))
        .with_thumbnail(cover)
}

pub fn playback_ended() -> Notice {
    Notice::success("Playback ended")
}

pub fn disconnected() -> Notice {
    Notice::success("Disconnected from voice channel")
}

pub fn starting_queue_playback() -> Notice {
    Notice::success("Started queue playback")
}

pub fn stopping_queue_playback() -> Notice {
    Notice::success("Stopped queue playback")
}

pub fn added_track(user: &str, track: &Track, cover: Option<Vec<u8>>) -> Notice {
    Notice::success(format!("{user} added track to queue"))
        .with_body(track_line(track))
        .with_thumbnail(cover)
}

pub fn added_album(user: &str, album: &Album, cover: Option<Vec<u8>>) -> Notice {
    Notice::success(format!("{user} added album to queue"))
        .with_body(format!(
            "**{}** - *{}*\n{} songs ({} seconds)",
            album.name, album.artist, album.song_count, album.duration
        ))
        .with_thumbnail(cover)
}

pub fn added_playlist(user: &str, playlist: &Playlist, cover: Option<Vec<u8>>) -> Notice {
    Notice::success(format!("{user} added playlist to queue"))
        .with_body(format!(
            "**{}**\n{} songs ({} seconds)",
            playlist.name, playlist.song_count, playlist.duration
        ))
        .with_thumbnail(cover)
}

pub fn queue_cleared(user: &str) -> Notice {
    Notice::success(format!("{user} cleared the queue"))
}

pub fn skipping() -> Notice {
    Notice::success("Skipped track").ephemeral()
}

pub fn autoplay_changed(user: &str, mode: AutoplayMode) -> Notice {
    if mode.is_enabled() {
        Notice::success(format!("Autoplay enabled by {user}")).with_body(format!("Autoplay mode: **{mode}**"))
    } else {
        Notice::success(format!("Autoplay disabled by {user}"))
    }
}

/// Lista la canción actual y la cola numerada
pub fn queue_listing(snapshot: &QueueSnapshot) -> Notice {
    let mut output = String::new();

    if let Some(track) = &snapshot.current {
        output.push_str(&format!(
            "**Now Playing:**\n{} - *{}*\n{} ({})\n\n",
            track.title,
            track.artist,
            track.album,
            track.duration_printable()
        ));
    }

    for (i, track) in snapshot.tracks.iter().enumerate() {
        output.push_str(&format!("{}. {}\n\n", i + 1, track_line(track)));
    }

    if snapshot.is_empty() {
        output.push_str("Queue is empty!");
    }

    Notice::success("Queue").with_body(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{track, tracks};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_queue_listing_formats_current_and_queue() {
        let snapshot = QueueSnapshot {
            current: Some(track("now")),
            tracks: tracks(&["a", "b"]),
        };

        let body = queue_listing(&snapshot).body.unwrap();

        assert_eq!(
            body,
            "**Now Playing:**\nTitle now - *Artist*\nAlbum (02:00)\n\n\
             1. **Title a** - *Artist*\nAlbum (02:00)\n\n\
             2. **Title b** - *Artist*\nAlbum (02:00)\n\n"
        );
    }

    #[test]
    fn test_empty_queue_listing() {
        let notice = queue_listing(&QueueSnapshot::default());
        assert_eq!(notice.header, "Queue");
        assert_eq!(notice.body.as_deref(), Some("Queue is empty!"));
    }

    #[test]
    fn test_album_notice_uses_derived_song_count() {
        let album = Album::new(
            "al-1".into(),
            "Blue Train".into(),
            "John Coltrane".into(),
            tracks(&["a", "b", "c"]),
            2520,
            String::new(),
        );

        let notice = added_album("ana", &album, None);

        assert_eq!(notice.header, "ana added album to queue");
        assert_eq!(
            notice.body.as_deref(),
            Some("**Blue Train** - *John Coltrane*\n3 songs (2520 seconds)")
        );
    }

    #[test]
    fn test_autoplay_notices() {
        let enabled = autoplay_changed("ana", AutoplayMode::Similar);
        assert_eq!(enabled.header, "Autoplay enabled by ana");
        assert_eq!(enabled.body.as_deref(), Some("Autoplay mode: **Similar**"));

        let disabled = autoplay_changed("ana", AutoplayMode::None);
        assert_eq!(disabled.header, "Autoplay disabled by ana");
        assert_eq!(disabled.body, None);
    }

    #[test]
    fn test_skipping_is_ephemeral() {
        assert!(skipping().ephemeral);
        assert!(!playback_ended().ephemeral);
    }
}
