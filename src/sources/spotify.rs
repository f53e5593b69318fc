use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::Track;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_URL: &str = "https://api.spotify.com/v1";
/// Tope de páginas al recorrer una playlist (100 items por página).
const MAX_PLAYLIST_PAGES: usize = 10;

/// Cliente del catálogo de Spotify.
///
/// Spotify solo aporta metadatos: cada track se convierte en una búsqueda
/// diferida que yt-dlp resuelve cuando le toca sonar.
pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Track del catálogo con lo mínimo para buscarlo después.
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyItem {
    pub name: String,
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Page<SpotifyItem>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyItem>,
}

impl SpotifyItem {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Consulta diferida `"<nombre> <artistas> Audio"`.
    pub fn into_track(self, requested_by: UserId) -> Track {
        let artists = self.artist_names();
        let query = format!("{} {} Audio", self.name, artists);
        let mut track = Track::deferred(self.name, query, requested_by).with_author(artists);
        if let Some(ms) = self.duration_ms {
            track = track.with_duration(Duration::from_millis(ms));
        }
        track
    }
}

impl SpotifyClient {
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            http,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    pub async fn track(&self, id: &str) -> Result<SpotifyItem> {
        self.get(&format!("{}/tracks/{}", API_URL, id))
            .await
            .context("Link de Spotify inválido o no se pudieron obtener los detalles")
    }

    pub async fn playlist(&self, id: &str) -> Result<Vec<SpotifyItem>> {
        let mut url = Some(format!("{}/playlists/{}/tracks?limit=100", API_URL, id));
        let mut items = Vec::new();

        for _ in 0..MAX_PLAYLIST_PAGES {
            let Some(current) = url.take() else { break };
            let page: Page<PlaylistItem> = self
                .get(&current)
                .await
                .context("No se pudo obtener la playlist de Spotify")?;
            items.extend(page.items.into_iter().filter_map(|item| item.track));
            url = page.next;
        }

        info!("📃 Playlist de Spotify con {} canciones", items.len());
        Ok(items)
    }

    /// Mejor coincidencia del catálogo para un texto libre.
    pub async fn search(&self, query: &str) -> Result<Option<SpotifyItem>> {
        let url = format!(
            "{}/search?q={}&type=track&limit=1",
            API_URL,
            urlencoding::encode(query)
        );
        let response: SearchResponse = self.get(&url).await?;
        Ok(response.tracks.items.into_iter().next())
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.access_token().await?;
        debug!("🌐 Spotify GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let credentials = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()
            .context("Spotify rechazó las credenciales")?
            .json()
            .await?;

        // Margen de un minuto para no usar un token a punto de expirar
        let lifetime = Duration::from_secs(response.expires_in.saturating_sub(60));
        let value = response.access_token.clone();
        *guard = Some(AccessToken {
            value: response.access_token,
            expires_at: Instant::now() + lifetime,
        });

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;

    #[test]
    fn item_becomes_deferred_search() {
        let item: SpotifyItem = serde_json::from_str(
            r#"{"name": "Under Pressure", "artists": [{"name": "Queen"}, {"name": "David Bowie"}], "duration_ms": 248000}"#,
        )
        .unwrap();

        let track = item.into_track(UserId::new(1));
        assert_eq!(track.kind(), SourceKind::DeferredQuery);
        assert_eq!(track.payload(), "Under Pressure Queen, David Bowie Audio");
        assert_eq!(track.display_name(), "Under Pressure - Queen, David Bowie");
        assert_eq!(track.duration(), Some(Duration::from_secs(248)));
    }

    #[test]
    fn playlist_page_skips_removed_tracks() {
        let page: Page<PlaylistItem> = serde_json::from_str(
            r#"{"items": [{"track": {"name": "A", "artists": []}}, {"track": null}], "next": null}"#,
        )
        .unwrap();

        let items: Vec<_> = page.items.into_iter().filter_map(|i| i.track).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "A");
        assert!(page.next.is_none());
    }
}
