use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static SPOTIFY_LINK: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"open\.spotify\.com/(?:intl-[a-z]+/)?(track|playlist)/([A-Za-z0-9]+)").ok()
});

const AUDIO_EXTENSIONS: [&str; 6] = [".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus"];

/// Categoría de la entrada cruda de un usuario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Archivo de audio servido por HTTP, reproducible tal cual.
    DirectAudio(String),
    /// Página de un video (YouTube u otro sitio que yt-dlp entienda).
    MediaLink(String),
    /// Playlist de YouTube.
    MediaPlaylist(String),
    /// ID de un track de Spotify.
    SpotifyTrack(String),
    /// ID de una playlist de Spotify.
    SpotifyPlaylist(String),
    /// Texto libre para buscar.
    Query(String),
}

/// Clasifica la entrada del usuario antes de expandirla en tracks.
pub fn classify(input: &str) -> InputKind {
    let input = input.trim();

    if let Some(caps) = SPOTIFY_LINK.as_ref().and_then(|re| re.captures(input)) {
        let id = caps[2].to_string();
        return match &caps[1] {
            "playlist" => InputKind::SpotifyPlaylist(id),
            _ => InputKind::SpotifyTrack(id),
        };
    }

    let Ok(parsed) = Url::parse(input) else {
        return InputKind::Query(input.to_string());
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return InputKind::Query(input.to_string());
    }

    let path = parsed.path().to_lowercase();
    if AUDIO_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return InputKind::DirectAudio(input.to_string());
    }

    if is_youtube_host(parsed.host_str().unwrap_or_default()) && is_playlist(&parsed) {
        return InputKind::MediaPlaylist(input.to_string());
    }

    InputKind::MediaLink(input.to_string())
}

fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "www.youtube.com" | "youtube.com" | "m.youtube.com" | "music.youtube.com" | "youtu.be"
    )
}

/// `/playlist?list=...` o un enlace con `list=` pero sin video concreto.
fn is_playlist(url: &Url) -> bool {
    if url.path().starts_with("/playlist") {
        return true;
    }
    let mut has_list = false;
    let mut has_video = false;
    for (key, _) in url.query_pairs() {
        match key.as_ref() {
            "list" => has_list = true,
            "v" => has_video = true,
            _ => {}
        }
    }
    has_list && !has_video && url.host_str() != Some("youtu.be")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spotify_links() {
        assert_eq!(
            classify("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            InputKind::SpotifyTrack("4uLU6hMCjMI75M1A2tKUQC".to_string())
        );
        assert_eq!(
            classify("https://open.spotify.com/intl-es/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            InputKind::SpotifyPlaylist("37i9dQZF1DXcBWIGoYBM5M".to_string())
        );
    }

    #[test]
    fn test_youtube_links() {
        let video = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";
        assert_eq!(classify(video), InputKind::MediaLink(video.to_string()));

        let short = "https://youtu.be/dQw4w9WgXcQ";
        assert_eq!(classify(short), InputKind::MediaLink(short.to_string()));

        let playlist = "https://www.youtube.com/playlist?list=PL1234";
        assert_eq!(classify(playlist), InputKind::MediaPlaylist(playlist.to_string()));

        // Un video dentro de una playlist se reproduce como video suelto
        let in_list = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PL1234";
        assert_eq!(classify(in_list), InputKind::MediaLink(in_list.to_string()));
    }

    #[test]
    fn test_direct_audio_and_queries() {
        let mp3 = "https://files.example.com/music/song.MP3";
        assert_eq!(classify(mp3), InputKind::DirectAudio(mp3.to_string()));

        assert_eq!(
            classify("  bohemian rhapsody queen "),
            InputKind::Query("bohemian rhapsody queen".to_string())
        );
        assert_eq!(
            classify("ftp://example.com/song.mp3"),
            InputKind::Query("ftp://example.com/song.mp3".to_string())
        );
    }
}
