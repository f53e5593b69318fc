//! Entrega de las notificaciones de las sesiones a Discord.
//!
//! Las sesiones emiten [`PlaybackEvent`]s desde su propio task; aquí se
//! encolan sin bloquear y un único worker los publica en el canal de texto
//! donde se usó el último comando de cada guild.

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    builder::{CreateMessage, EditMessage},
    http::Http,
    model::id::{ChannelId, GuildId, MessageId},
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{
    audio::{EventSink, PlaybackEvent},
    ui::{buttons, embeds},
};

/// Una notificación lista para publicar.
#[derive(Debug)]
struct Notice {
    guild_id: GuildId,
    channel_id: ChannelId,
    event: PlaybackEvent,
}

/// [`EventSink`] que publica las notificaciones en Discord.
pub struct DiscordNotifier {
    tx: mpsc::UnboundedSender<Notice>,
    channels: DashMap<GuildId, ChannelId>,
}

impl DiscordNotifier {
    pub fn new() -> (Self, NotifierWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            tx,
            channels: DashMap::new(),
        };
        let worker = NotifierWorker {
            rx,
            displays: HashMap::new(),
        };
        (notifier, worker)
    }

    /// Canal de texto donde se publican las notificaciones de la guild.
    pub fn set_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub fn channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.channels.get(&guild_id).map(|c| *c)
    }

    /// La guild dejó el servidor o fue expulsada.
    pub fn forget(&self, guild_id: GuildId) {
        self.channels.remove(&guild_id);
    }
}

impl EventSink for DiscordNotifier {
    fn emit(&self, guild_id: GuildId, event: PlaybackEvent) {
        let Some(channel_id) = self.channel(guild_id) else {
            debug!("🔕 Sin canal de texto para guild {}, descartando: {:?}", guild_id, event);
            return;
        };

        let notice = Notice {
            guild_id,
            channel_id,
            event,
        };
        if self.tx.send(notice).is_err() {
            warn!("⚠️ Worker de notificaciones detenido, descartando evento de guild {}", guild_id);
        }
    }
}

/// Publica las notificaciones y mantiene un display de "sonando ahora" por guild.
pub struct NotifierWorker {
    rx: mpsc::UnboundedReceiver<Notice>,
    displays: HashMap<GuildId, (ChannelId, MessageId)>,
}

impl NotifierWorker {
    pub async fn run(mut self, http: Arc<Http>) {
        while let Some(notice) = self.rx.recv().await {
            let guild_id = notice.guild_id;
            if let Err(e) = self.deliver(&http, notice).await {
                warn!("⚠️ No se pudo publicar notificación en guild {}: {:?}", guild_id, e);
            }
        }
        debug!("📭 Worker de notificaciones finalizado");
    }

    async fn deliver(&mut self, http: &Arc<Http>, notice: Notice) -> Result<()> {
        let Notice {
            guild_id,
            channel_id,
            event,
        } = notice;

        match &event {
            PlaybackEvent::NowPlaying(display) => {
                let embed = embeds::create_now_playing_embed(display);

                // Reutilizar el display existente si sigue en el mismo canal
                if let Some((channel, message)) = self.displays.get(&guild_id).copied() {
                    if channel == channel_id {
                        let edit = EditMessage::new()
                            .embed(embed.clone())
                            .components(buttons::create_player_controls());
                        match channel.edit_message(http, message, edit).await {
                            Ok(_) => return Ok(()),
                            Err(e) => debug!("Display de guild {} no editable: {:?}", guild_id, e),
                        }
                    }
                }

                let message = channel_id
                    .send_message(
                        http,
                        CreateMessage::new()
                            .embed(embed)
                            .components(buttons::create_player_controls()),
                    )
                    .await?;
                self.displays.insert(guild_id, (channel_id, message.id));
            }
            event if event.ends_display() => {
                if let Some((channel, message)) = self.displays.remove(&guild_id) {
                    let edit = EditMessage::new()
                        .embed(embeds::create_finished_embed(event))
                        .components(Vec::new());
                    if let Err(e) = channel.edit_message(http, message, edit).await {
                        debug!("Display de guild {} no editable: {:?}", guild_id, e);
                    }
                }

                channel_id
                    .send_message(http, CreateMessage::new().embed(embeds::create_event_embed(event)))
                    .await?;
            }
            event => {
                channel_id
                    .send_message(http, CreateMessage::new().embed(embeds::create_event_embed(event)))
                    .await?;
            }
        }

        Ok(())
    }
}
