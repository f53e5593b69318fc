use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Lookup, MetadataProvider, Track};

/// Tiempo máximo de una búsqueda o extracción de un solo video.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(25);
/// Las playlists largas tardan más en listarse.
const PLAYLIST_TIMEOUT: Duration = Duration::from_secs(60);

/// Cliente de yt-dlp: búsqueda, metadatos y URL de stream en una sola llamada.
pub struct YtDlpClient {
    binary: String,
    cookies: Option<String>,
}

impl YtDlpClient {
    pub fn new() -> Self {
        Self {
            binary: "yt-dlp".to_string(),
            cookies: find_cookies_file(),
        }
    }

    /// Extrae las entradas de una playlist sin resolver sus streams.
    ///
    /// Cada entrada queda como consulta diferida sobre su URL de página; el
    /// stream se pide cuando le toca sonar.
    pub async fn playlist(&self, url: &str, requested_by: UserId) -> Result<Vec<Track>> {
        let stdout = self
            .run(
                &["--flat-playlist", "-J", "--no-warnings", "--socket-timeout", "30", url],
                PLAYLIST_TIMEOUT,
            )
            .await?;
        let tracks = parse_playlist(&stdout, requested_by)?;
        info!("🎵 Playlist extraída con {} tracks", tracks.len());
        Ok(tracks)
    }

    /// Ejecuta yt-dlp y devuelve su stdout. Si no termina dentro de `limit`
    /// el proceso se mata al soltar el futuro (`kill_on_drop`).
    async fn run(&self, args: &[&str], limit: Duration) -> Result<Vec<u8>> {
        let mut cmd = tokio::process::Command::new(&self.binary);
        if let Some(cookies) = &self.cookies {
            cmd.args(["--cookies", cookies]);
        }
        cmd.args(args);
        cmd.kill_on_drop(true);

        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| anyhow::anyhow!("yt-dlp no respondió en {}", humantime::format_duration(limit)))?
            .context("no se pudo ejecutar yt-dlp")?;
        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp falló: {}", error.trim());
        }

        Ok(output.stdout)
    }
}

impl Default for YtDlpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for YtDlpClient {
    async fn lookup(&self, query: &str) -> Result<Option<Lookup>> {
        let target = if query.starts_with("http://") || query.starts_with("https://") {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        };

        debug!("🔍 yt-dlp lookup: {}", target);
        let stdout = self
            .run(
                &[
                    "-f",
                    "bestaudio/best",
                    "-J",
                    "--no-playlist",
                    "--no-warnings",
                    "--geo-bypass",
                    "--socket-timeout",
                    "30",
                    &target,
                ],
                LOOKUP_TIMEOUT,
            )
            .await?;

        parse_lookup(&stdout)
    }

    fn source_name(&self) -> &'static str {
        "yt-dlp"
    }
}

/// Salida JSON de `yt-dlp -J`, tanto de un video como de una búsqueda o playlist
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    duration: Option<f64>,
    #[serde(default)]
    entries: Vec<Option<VideoInfo>>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl VideoInfo {
    fn author(&self) -> Option<String> {
        self.uploader.clone().or_else(|| self.channel.clone())
    }

    fn best_thumbnail(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnails.last().map(|t| t.url.clone()))
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(Duration::from_secs_f64)
    }
}

fn parse_lookup(stdout: &[u8]) -> Result<Option<Lookup>> {
    let info: VideoInfo = serde_json::from_slice(stdout).context("JSON de yt-dlp inválido")?;

    // Las búsquedas `ytsearch1:` devuelven el resultado dentro de `entries`
    let info = if info.url.is_none() && !info.entries.is_empty() {
        match info.entries.into_iter().flatten().next() {
            Some(first) => first,
            None => return Ok(None),
        }
    } else {
        info
    };

    let Some(address) = info.url.clone().filter(|u| !u.is_empty()) else {
        return Ok(None);
    };

    Ok(Some(Lookup {
        title: info.title.clone().unwrap_or_else(|| super::UNKNOWN.to_string()),
        author: info.author(),
        thumbnail: info.best_thumbnail(),
        duration: info.duration(),
        address,
    }))
}

fn parse_playlist(stdout: &[u8], requested_by: UserId) -> Result<Vec<Track>> {
    let info: VideoInfo = serde_json::from_slice(stdout).context("JSON de playlist inválido")?;

    let mut tracks = Vec::new();
    for entry in info.entries.into_iter().flatten() {
        let Some(url) = entry.webpage_url.clone().or_else(|| entry.url.clone()) else {
            warn!("⚠️ Entrada de playlist sin URL, se omite");
            continue;
        };

        let mut track = Track::deferred(entry.title.clone().unwrap_or_default(), url, requested_by);
        if let Some(author) = entry.author() {
            track = track.with_author(author);
        }
        if let Some(thumbnail) = entry.best_thumbnail() {
            track = track.with_thumbnail(thumbnail);
        }
        if let Some(duration) = entry.duration() {
            track = track.with_duration(duration);
        }
        tracks.push(track);
    }

    Ok(tracks)
}

/// Busca archivo de cookies disponible
fn find_cookies_file() -> Option<String> {
    let cookies_paths = [
        format!("{}/.config/yt-dlp/cookies.txt", std::env::var("HOME").unwrap_or_default()),
        "/app/.config/yt-dlp/cookies.txt".to_string(),
        "./cookies.txt".to_string(),
    ];

    let found = cookies_paths
        .into_iter()
        .find(|path| std::path::Path::new(path).exists());

    match &found {
        Some(path) => info!("🍪 Cookies encontradas en: {}", path),
        None => debug!("🍪 Sin cookies para yt-dlp"),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceKind;

    #[tokio::test]
    async fn hung_process_is_cut_off() {
        // `sleep` hace de yt-dlp colgado
        let client = YtDlpClient {
            binary: "sleep".to_string(),
            cookies: None,
        };

        let started = std::time::Instant::now();
        let result = client.run(&["30"], Duration::from_millis(200)).await;

        let error = result.unwrap_err().to_string();
        assert!(error.contains("no respondió"), "{}", error);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_parse_search_result() {
        let json = br#"{
            "_type": "playlist",
            "entries": [{
                "title": "Never Gonna Give You Up",
                "uploader": "Rick Astley",
                "url": "https://rr1.googlevideo.com/videoplayback?id=1",
                "thumbnail": "https://i.ytimg.com/vi/dQw4w9WgXcQ/hq.jpg",
                "duration": 212.0
            }]
        }"#;

        let lookup = parse_lookup(json).unwrap().unwrap();
        assert_eq!(lookup.title, "Never Gonna Give You Up");
        assert_eq!(lookup.author.as_deref(), Some("Rick Astley"));
        assert_eq!(lookup.address, "https://rr1.googlevideo.com/videoplayback?id=1");
        assert_eq!(lookup.duration, Some(Duration::from_secs(212)));
    }

    #[test]
    fn test_parse_empty_search() {
        assert_eq!(parse_lookup(br#"{"entries": []}"#).unwrap(), None);
        assert_eq!(parse_lookup(br#"{"entries": [null]}"#).unwrap(), None);
        assert!(parse_lookup(b"not json").is_err());
    }

    #[test]
    fn test_parse_flat_playlist() {
        let json = br#"{
            "title": "Mix",
            "entries": [
                {"title": "A", "channel": "Canal", "url": "https://www.youtube.com/watch?v=a",
                 "thumbnails": [{"url": "https://i.ytimg.com/a_small.jpg"}, {"url": "https://i.ytimg.com/a_big.jpg"}]},
                null,
                {"title": "Sin url"},
                {"title": "B", "uploader": "Otro", "url": "https://www.youtube.com/watch?v=b", "duration": 61}
            ]
        }"#;

        let tracks = parse_playlist(json, UserId::new(3)).unwrap();
        assert_eq!(tracks.len(), 2);
        assert!(tracks.iter().all(|t| t.kind() == SourceKind::DeferredQuery));
        assert_eq!(tracks[0].payload(), "https://www.youtube.com/watch?v=a");
        assert_eq!(tracks[0].author(), "Canal");
        assert_eq!(tracks[0].thumbnail(), Some("https://i.ytimg.com/a_big.jpg"));
        assert_eq!(tracks[1].display_name(), "B - Otro");
        assert_eq!(tracks[1].duration(), Some(Duration::from_secs(61)));
    }
}
