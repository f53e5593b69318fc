pub mod classifier;
pub mod resolver;
pub mod spotify;
pub mod ytdlp;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

pub use classifier::{classify, InputKind};
pub use resolver::TrackResolver;
pub use spotify::SpotifyClient;
pub use ytdlp::YtDlpClient;

/// Texto mostrado cuando la fuente no da título o autor.
pub const UNKNOWN: &str = "Unknown";

/// Cómo se obtiene el audio de una entrada de la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `payload` ya es una dirección de stream reproducible.
    ResolvedLocator,
    /// `payload` es texto libre o un enlace que requiere consultar al proveedor.
    DeferredQuery,
}

/// Una entrada de la cola.
///
/// El `kind` no cambia nunca después de crearla; resolver una entrada diferida
/// produce una [`PlayableAddress`] nueva sin modificar el track.
#[derive(Debug, Clone)]
pub struct Track {
    kind: SourceKind,
    title: String,
    author: String,
    thumbnail: Option<String>,
    duration: Option<Duration>,
    payload: String,
    requested_by: UserId,
    added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(kind: SourceKind, title: impl Into<String>, payload: impl Into<String>, requested_by: UserId) -> Self {
        let title = title.into();
        Self {
            kind,
            title: if title.trim().is_empty() { UNKNOWN.to_string() } else { title },
            author: UNKNOWN.to_string(),
            thumbnail: None,
            duration: None,
            payload: payload.into(),
            requested_by,
            added_at: Utc::now(),
        }
    }

    pub fn resolved(title: impl Into<String>, address: impl Into<String>, requested_by: UserId) -> Self {
        Self::new(SourceKind::ResolvedLocator, title, address, requested_by)
    }

    pub fn deferred(title: impl Into<String>, query: impl Into<String>, requested_by: UserId) -> Self {
        Self::new(SourceKind::DeferredQuery, title, query, requested_by)
    }

    // Getters
    pub fn kind(&self) -> SourceKind {
        self.kind
    }
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn author(&self) -> &str {
        &self.author
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn payload(&self) -> &str {
        &self.payload
    }
    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }
    pub fn added_at(&self) -> DateTime<Utc> {
        self.added_at
    }

    /// "Título - Autor", o solo el título si el autor es desconocido.
    pub fn display_name(&self) -> String {
        if self.author == UNKNOWN {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.author)
        }
    }

    // Builders
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        if !author.trim().is_empty() {
            self.author = author;
        }
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Dirección efímera que el pipeline de audio puede abrir directamente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableAddress {
    pub url: String,
    /// Miniatura descubierta durante la resolución, si la hay.
    pub thumbnail: Option<String>,
}

impl PlayableAddress {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            thumbnail: None,
        }
    }
}

/// Resultado de una consulta al proveedor de metadatos.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub title: String,
    pub author: Option<String>,
    pub address: String,
    pub thumbnail: Option<String>,
    pub duration: Option<Duration>,
}

/// Proveedor que convierte una búsqueda o enlace en metadatos más un stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// `Ok(None)` cuando la búsqueda no devuelve resultados.
    async fn lookup(&self, query: &str) -> Result<Option<Lookup>>;

    fn source_name(&self) -> &'static str;
}

/// Expande la entrada clasificada de un usuario en tracks listos para encolar.
pub struct SourceManager {
    ytdlp: Arc<YtDlpClient>,
    spotify: Option<SpotifyClient>,
    max_playlist_size: usize,
}

impl SourceManager {
    pub fn new(ytdlp: Arc<YtDlpClient>, spotify: Option<SpotifyClient>, max_playlist_size: usize) -> Self {
        Self {
            ytdlp,
            spotify,
            max_playlist_size,
        }
    }

    /// Convierte la entrada del usuario en una o más entradas de cola.
    pub async fn expand(&self, input: &str, requested_by: UserId) -> Result<Vec<Track>> {
        let kind = classify(input);
        info!("🔍 Entrada clasificada como {:?}", kind);

        let mut tracks = match kind {
            InputKind::DirectAudio(url) => {
                let title = url.rsplit('/').next().unwrap_or(UNKNOWN).to_string();
                vec![Track::resolved(title, url, requested_by)]
            }
            InputKind::MediaLink(url) => {
                let lookup = self
                    .ytdlp
                    .lookup(&url)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("No se pudo obtener una URL válida para la canción"))?;
                vec![track_from_lookup(lookup, requested_by)]
            }
            InputKind::MediaPlaylist(url) => self.ytdlp.playlist(&url, requested_by).await?,
            InputKind::SpotifyTrack(id) => {
                let spotify = self.spotify()?;
                vec![spotify.track(&id).await?.into_track(requested_by)]
            }
            InputKind::SpotifyPlaylist(id) => {
                let spotify = self.spotify()?;
                spotify
                    .playlist(&id)
                    .await?
                    .into_iter()
                    .map(|item| item.into_track(requested_by))
                    .collect()
            }
            InputKind::Query(text) => match &self.spotify {
                Some(spotify) => {
                    let item = spotify
                        .search(&text)
                        .await?
                        .ok_or_else(|| anyhow::anyhow!("No se encontraron resultados para: {}", text))?;
                    vec![item.into_track(requested_by)]
                }
                None => vec![Track::deferred(text.clone(), text, requested_by)],
            },
        };

        if tracks.len() > self.max_playlist_size {
            warn!(
                "✂️ Playlist recortada de {} a {} canciones",
                tracks.len(),
                self.max_playlist_size
            );
            tracks.truncate(self.max_playlist_size);
        }

        Ok(tracks)
    }

    fn spotify(&self) -> Result<&SpotifyClient> {
        self.spotify
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Spotify no está configurado en este bot"))
    }
}

/// Track ya reproducible a partir de una consulta directa al proveedor.
pub fn track_from_lookup(lookup: Lookup, requested_by: UserId) -> Track {
    let mut track = Track::resolved(lookup.title, lookup.address, requested_by);
    if let Some(author) = lookup.author {
        track = track.with_author(author);
    }
    if let Some(thumbnail) = lookup.thumbnail {
        track = track.with_thumbnail(thumbnail);
    }
    if let Some(duration) = lookup.duration {
        track = track.with_duration(duration);
    }
    track
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_metadata_falls_back_to_unknown() {
        let track = Track::deferred("  ", "some query", UserId::new(1)).with_author("");
        assert_eq!(track.title(), UNKNOWN);
        assert_eq!(track.author(), UNKNOWN);
        assert_eq!(track.display_name(), UNKNOWN);
    }

    #[test]
    fn lookup_becomes_resolved_track() {
        let lookup = Lookup {
            title: "Song".to_string(),
            author: Some("Artist".to_string()),
            address: "https://cdn.example.com/a.webm".to_string(),
            thumbnail: Some("https://img.example.com/a.jpg".to_string()),
            duration: Some(Duration::from_secs(200)),
        };

        let track = track_from_lookup(lookup, UserId::new(7));
        assert_eq!(track.kind(), SourceKind::ResolvedLocator);
        assert_eq!(track.payload(), "https://cdn.example.com/a.webm");
        assert_eq!(track.display_name(), "Song - Artist");
        assert_eq!(track.thumbnail(), Some("https://img.example.com/a.jpg"));
        assert_eq!(track.requested_by(), UserId::new(7));
    }
}
