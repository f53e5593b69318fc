use anyhow::Result;
use serenity::{
    builder::{
        CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse,
    },
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::PlaybackError,
    bot::MusicBot,
    ui::{
        buttons::{self, button_ids},
        embeds,
    },
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    // Las notificaciones de la sesión van al canal del último comando
    bot.notifier.set_channel(guild_id, command.channel_id);

    match command.data.name.as_str() {
        "play" => handle_play(ctx, &command, bot, guild_id).await?,
        "pause" => run_control(ctx, &command, bot.registry.pause(guild_id)).await?,
        "resume" => run_control(ctx, &command, bot.registry.resume(guild_id)).await?,
        "skip" => run_control(ctx, &command, bot.registry.skip(guild_id)).await?,
        "stop" | "leave" => run_control(ctx, &command, bot.registry.stop(guild_id)).await?,
        "shuffle" => run_control(ctx, &command, bot.registry.shuffle(guild_id)).await?,
        "queue" => handle_queue(ctx, &command, bot, guild_id).await?,
        "nowplaying" => handle_nowplaying(ctx, &command, bot, guild_id).await?,
        "help" => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .embed(embeds::create_help_embed())
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
        _ => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Comando no reconocido")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

/// Maneja los botones del display y de la paginación de la cola
pub async fn handle_component(ctx: &Context, component: ComponentInteraction, bot: &MusicBot) -> Result<()> {
    let guild_id = component
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Componente usado fuera de un servidor"))?;

    info!(
        "🔘 Botón {} presionado por {} en guild {}",
        component.data.custom_id, component.user.name, guild_id
    );

    bot.notifier.set_channel(guild_id, component.channel_id);

    let custom_id = component.data.custom_id.as_str();
    if let Some(page) = buttons::parse_page_id(custom_id) {
        let snapshot = bot.registry.queue_snapshot(guild_id).await;
        let queue_page = snapshot.get_page(page, embeds::QUEUE_PAGE_SIZE);

        let mut message = CreateInteractionResponseMessage::new()
            .embed(embeds::create_queue_embed(&snapshot, &queue_page));
        if queue_page.total_pages > 1 {
            message = message.components(vec![buttons::create_navigation_buttons(
                queue_page.current_page,
                queue_page.total_pages,
            )]);
        }

        component
            .create_response(&ctx.http, CreateInteractionResponse::UpdateMessage(message))
            .await?;
        return Ok(());
    }

    match custom_id {
        button_ids::PAUSE
        | button_ids::RESUME
        | button_ids::SKIP
        | button_ids::STOP
        | button_ids::SHUFFLE => {
            // El resultado llega como notificación de la sesión
            component
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await?;

            match custom_id {
                button_ids::PAUSE => bot.registry.pause(guild_id).await,
                button_ids::RESUME => bot.registry.resume(guild_id).await,
                button_ids::SKIP => bot.registry.skip(guild_id).await,
                button_ids::STOP => bot.registry.stop(guild_id).await,
                _ => bot.registry.shuffle(guild_id).await,
            }
        }
        button_ids::QUEUE => {
            let snapshot = bot.registry.queue_snapshot(guild_id).await;
            let queue_page = snapshot.get_page(1, embeds::QUEUE_PAGE_SIZE);

            let mut message = CreateInteractionResponseMessage::new()
                .embed(embeds::create_queue_embed(&snapshot, &queue_page))
                .ephemeral(true);
            if queue_page.total_pages > 1 {
                message = message.components(vec![buttons::create_navigation_buttons(
                    queue_page.current_page,
                    queue_page.total_pages,
                )]);
            }

            component
                .create_response(&ctx.http, CreateInteractionResponse::Message(message))
                .await?;
        }
        _ => {
            component
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("❌ Acción no reconocida")
                            .ephemeral(true),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let query = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "query")
        .and_then(|opt| opt.value.as_str())
        .ok_or_else(|| anyhow::anyhow!("Query no proporcionado"))?
        .to_string();

    // Defer la respuesta ya que puede tomar tiempo
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    // Verificar que el usuario esté en un canal de voz antes de encolar nada
    let Some(voice_channel_id) = get_user_voice_channel(ctx, guild_id, command.user.id) else {
        let embed = embeds::create_error_embed(
            "Sin canal de voz",
            "Debes estar en un canal de voz para usar este comando",
        );
        command
            .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
            .await?;
        return Ok(());
    };

    let tracks = match bot.sources.expand(&query, command.user.id).await {
        Ok(tracks) if !tracks.is_empty() => tracks,
        Ok(_) => {
            let embed = embeds::create_error_embed(
                "Sin resultados",
                &format!("No se encontraron canciones para: {}", query),
            );
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            return Ok(());
        }
        Err(e) => {
            warn!("⚠️ No se pudo procesar '{}' en guild {}: {:?}", query, guild_id, e);
            let embed = embeds::create_error_embed("No se pudo agregar", &e.to_string());
            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
            return Ok(());
        }
    };

    let requested = tracks.len();
    let first = tracks[0].clone();

    let embed = match bot.registry.play(guild_id, voice_channel_id, tracks).await {
        Ok(0) => embeds::create_error_embed(
            "Cola llena",
            &format!("La cola ya tiene el máximo de {} canciones", bot.config().max_queue_size),
        ),
        Ok(1) if requested == 1 => {
            let position = bot.registry.list_queue(guild_id).await.len();
            embeds::create_track_added_embed(&first, position)
        }
        Ok(added) => embeds::create_playlist_added_embed(added, requested),
        Err(PlaybackError::Connection(reason)) => embeds::create_error_embed(
            "No pude conectarme al canal de voz",
            &format!("{}\nLas canciones quedaron en la cola; usa `/play` de nuevo para reintentar.", reason),
        ),
        Err(e) => embeds::create_error_embed("Error de reproducción", &e.to_string()),
    };

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
        .await?;

    Ok(())
}

/// Comandos de control: el resultado se anuncia como notificación de la sesión.
async fn run_control(
    ctx: &Context,
    command: &CommandInteraction,
    action: impl std::future::Future<Output = ()>,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new().ephemeral(true)),
        )
        .await?;

    action.await;

    command.delete_response(&ctx.http).await?;
    Ok(())
}

async fn handle_queue(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let page = command
        .data
        .options
        .iter()
        .find(|opt| opt.name == "page")
        .and_then(|opt| opt.value.as_i64())
        .map(|page| page.max(1) as usize)
        .unwrap_or(1);

    if !bot.registry.exists(guild_id) {
        let embed = embeds::create_info_embed("Sin sesión", "No hay nada sonando ni en cola en este servidor");
        command
            .create_response(
                &ctx.http,
                CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
            )
            .await?;
        return Ok(());
    }

    let snapshot = bot.registry.queue_snapshot(guild_id).await;
    let queue_page = snapshot.get_page(page, embeds::QUEUE_PAGE_SIZE);

    let mut message = CreateInteractionResponseMessage::new()
        .embed(embeds::create_queue_embed(&snapshot, &queue_page));
    if queue_page.total_pages > 1 {
        message = message.components(vec![buttons::create_navigation_buttons(
            queue_page.current_page,
            queue_page.total_pages,
        )]);
    }

    command
        .create_response(&ctx.http, CreateInteractionResponse::Message(message))
        .await?;

    Ok(())
}

async fn handle_nowplaying(
    ctx: &Context,
    command: &CommandInteraction,
    bot: &MusicBot,
    guild_id: GuildId,
) -> Result<()> {
    let embed = match bot.registry.now_playing(guild_id).await {
        Some(display) => embeds::create_now_playing_embed(&display),
        None => embeds::create_info_embed("Nada sonando", "No hay nada reproduciéndose"),
    };

    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
        )
        .await?;

    Ok(())
}

// Funciones auxiliares

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;

    guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
}
