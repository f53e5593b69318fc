//! # Cache Module
//!
//! Short-lived caching of resolved stream addresses.
//!
//! Resolving a deferred queue entry means a round trip to the search
//! provider (yt-dlp, Spotify). Streaming URLs handed back by those providers
//! expire after a while, so entries carry a TTL and are purged periodically.
//!
//! ## Configuration
//!
//! ```env
//! CACHE_SIZE=100              # Maximum number of cached resolutions
//! RESOLVE_CACHE_TTL=10m       # Time-to-live per entry
//! ```

pub mod ttl_cache;

use tracing::info;
use ttl_cache::TtlCache;

use crate::sources::PlayableAddress;

/// Cache de resoluciones, indexado por el payload de la entrada diferida.
pub type ResolveCache = TtlCache<String, PlayableAddress>;

impl ResolveCache {
    /// Mantenimiento periódico: elimina entradas expiradas.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
    }
}
