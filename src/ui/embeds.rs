use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        queue::{QueuePage, QueueSnapshot},
        NowPlayingDisplay, PlaybackEvent,
    },
    sources::Track,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Mokey Music";

/// Canciones por página en `/queue`
pub const QUEUE_PAGE_SIZE: usize = 10;

/// Crea el embed de "sonando ahora"
pub fn create_now_playing_embed(display: &NowPlayingDisplay) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", display.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", &display.author, true);

    if let Some(duration) = display.duration {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    } else {
        embed = embed.field("⏱️ Duración", "🔴 En vivo", true);
    }

    embed = embed
        .field("👤 Solicitado por", format!("<@{}>", display.requested_by), true)
        .field("📜 En cola", display.up_next.to_string(), true);

    if let Some(thumbnail) = &display.thumbnail {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Estado final del display cuando la sesión deja de reproducir
pub fn create_finished_embed(event: &PlaybackEvent) -> CreateEmbed {
    CreateEmbed::default()
        .title("⏹️ Reproducción Finalizada")
        .description(event.message())
        .color(colors::NEUTRAL_GRAY)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar que se agregó una canción.
/// `position` 0 significa que ya está sonando.
pub fn create_track_added_embed(track: &Track, position: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** se ha agregado a la cola de reproducción", track.title()))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.author(), true);

    if let Some(duration) = track.duration() {
        embed = embed.field("⏱️ Duración", format_duration(duration), true);
    }

    embed = embed
        .field(
            "📍 Posición",
            if position == 0 { "▶️ Sonando ahora".to_string() } else { position.to_string() },
            true,
        )
        .field("👤 Solicitado por", format!("<@{}>", track.requested_by()), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new("🎵 Se reproducirá automáticamente si no hay música sonando"))
}

/// Crea un embed para una playlist agregada
pub fn create_playlist_added_embed(added: usize, requested: usize) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(format!("Se agregaron **{}** canciones a la cola", added))
        .color(colors::MUSIC_PURPLE);

    // La cola tiene capacidad máxima
    if added < requested {
        embed = embed.field(
            "⚠️ Cola llena",
            format!("{} canciones no entraron en la cola", requested - added),
            false,
        );
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed para mostrar la cola
pub fn create_queue_embed(snapshot: &QueueSnapshot, page: &QueuePage) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("📜 Cola de Reproducción")
        .color(colors::INFO_BLUE);

    if let Some(current) = &snapshot.now_playing {
        embed = embed.field(
            "🎵 Reproduciendo ahora",
            format!("**{}** - {}", current.title(), current.author()),
            false,
        );
    }

    if page.items.is_empty() {
        embed = embed.description("La cola está vacía");
    } else {
        let mut description = String::new();

        for (i, item) in page.items.iter().enumerate() {
            description.push_str(&queue_line(page.first_position + i, item));
            description.push('\n');
        }

        embed = embed.field("Próximas canciones", description, false);
    }

    let mut info = format!("**Total:** {} canciones", snapshot.items.len());
    let total = snapshot.total_duration();
    if total > Duration::ZERO {
        info.push_str(&format!(" • **Duración:** {}", format_duration(total)));
    }
    embed = embed.field("Información", info, false);

    if page.total_pages > 1 {
        embed = embed.footer(CreateEmbedFooter::new(format!(
            "Página {} de {} • Mokey Music",
            page.current_page, page.total_pages
        )));
    } else {
        embed = embed.footer(CreateEmbedFooter::new(STANDARD_FOOTER));
    }

    embed.timestamp(Timestamp::now())
}

/// Una línea de `/queue`; Discord muestra `<t:..:R>` como "hace 3 minutos".
fn queue_line(position: usize, track: &Track) -> String {
    let duration = track
        .duration()
        .map(|d| format!(" `[{}]`", format_duration(d)))
        .unwrap_or_default();

    format!(
        "**{}**. {} - {}{} • <t:{}:R>",
        position,
        track.title(),
        track.author(),
        duration,
        track.added_at().timestamp()
    )
}

/// Crea un embed de ayuda general
pub fn create_help_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("🎵 Mokey Music - Comandos")
        .color(colors::INFO_BLUE)
        .description("Cada servidor tiene su propia cola y reproducción")
        .field(
            "🎵 Reproducción",
            "• `/play <canción o enlace>` - Reproduce o agrega a la cola\n\
            • `/pause` - Pausa la reproducción\n\
            • `/resume` - Reanuda la reproducción\n\
            • `/skip` - Salta la canción actual\n\
            • `/stop` - Detiene, limpia la cola y desconecta",
            false,
        )
        .field(
            "📜 Cola",
            "• `/queue [página]` - Muestra la cola\n\
            • `/shuffle` - Mezcla la cola\n\
            • `/nowplaying` - Muestra la canción actual",
            false,
        )
        .field(
            "🎵 Fuentes Soportadas",
            "• Búsquedas de texto (YouTube)\n\
            • Videos y playlists de YouTube\n\
            • Canciones y playlists de Spotify\n\
            • URLs directas de audio",
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
        .timestamp(Timestamp::now())
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed para las notificaciones sueltas de una sesión
pub fn create_event_embed(event: &PlaybackEvent) -> CreateEmbed {
    let color = match event {
        PlaybackEvent::Skipped { .. } | PlaybackEvent::TrackFailed { .. } => colors::WARNING_ORANGE,
        PlaybackEvent::NothingPlaying
        | PlaybackEvent::NothingPaused
        | PlaybackEvent::NothingToShuffle
        | PlaybackEvent::NotConnected => colors::ERROR_RED,
        _ => colors::MUSIC_PURPLE,
    };

    CreateEmbed::default().description(event.message()).color(color)
}

/// Formatea una duración en formato legible
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
