use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use super::{MetadataProvider, PlayableAddress, SourceKind, Track};
use crate::{audio::error::ResolutionError, cache::ResolveCache};

/// Límite de una consulta al proveedor. Corre dentro del actor de la sesión,
/// así que una consulta colgada no puede bloquearla más que esto.
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(40);

/// Materializa entradas de la cola en direcciones reproducibles, bajo demanda.
///
/// Nunca modifica la cola ni el track: quien llama decide qué hacer con el
/// resultado. Las resoluciones exitosas se guardan por payload durante el TTL
/// del cache, así que repetir la misma consulta devuelve una dirección
/// equivalente sin volver a preguntar al proveedor.
#[derive(Clone)]
pub struct TrackResolver {
    provider: Arc<dyn MetadataProvider>,
    cache: ResolveCache,
}

impl TrackResolver {
    pub fn new(provider: Arc<dyn MetadataProvider>, cache: ResolveCache) -> Self {
        Self { provider, cache }
    }

    pub async fn resolve(&self, track: &Track) -> Result<PlayableAddress, ResolutionError> {
        let payload = track.payload().trim();
        if payload.is_empty() {
            return Err(ResolutionError::Malformed("payload vacío".to_string()));
        }

        if track.kind() == SourceKind::ResolvedLocator {
            return Ok(PlayableAddress::new(payload));
        }

        if let Some(cached) = self.cache.get(&payload.to_string()) {
            debug!("⚡ Resolución en cache para: {}", track.title());
            return Ok(cached);
        }

        info!(
            "🔎 Resolviendo '{}' con {}",
            track.title(),
            self.provider.source_name()
        );

        let lookup = tokio::time::timeout(RESOLVE_TIMEOUT, self.provider.lookup(payload))
            .await
            .map_err(|_| {
                warn!("⏱️ {} no respondió resolviendo '{}'", self.provider.source_name(), track.title());
                ResolutionError::Provider(format!(
                    "sin respuesta en {}",
                    humantime::format_duration(RESOLVE_TIMEOUT)
                ))
            })?
            .map_err(|e| {
                warn!("❌ Error del proveedor resolviendo '{}': {:?}", track.title(), e);
                ResolutionError::Provider(e.to_string())
            })?;

        let lookup = lookup.ok_or(ResolutionError::NotFound)?;
        if lookup.address.trim().is_empty() {
            return Err(ResolutionError::NotFound);
        }

        let address = PlayableAddress {
            url: lookup.address,
            thumbnail: lookup.thumbnail.or_else(|| track.thumbnail().map(str::to_string)),
        };
        self.cache.insert(payload.to_string(), address.clone());

        Ok(address)
    }

    #[cfg(test)]
    pub fn cache(&self) -> &ResolveCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::testing::HangingProvider,
        sources::{Lookup, MockMetadataProvider},
    };
    use serenity::model::id::UserId;

    fn resolver(provider: MockMetadataProvider) -> TrackResolver {
        TrackResolver::new(
            Arc::new(provider),
            ResolveCache::new(16, Duration::from_secs(60)),
        )
    }

    fn lookup(address: &str) -> Lookup {
        Lookup {
            title: "Song".to_string(),
            author: Some("Artist".to_string()),
            address: address.to_string(),
            thumbnail: Some("https://img.example.com/t.jpg".to_string()),
            duration: None,
        }
    }

    #[tokio::test]
    async fn resolved_locator_is_a_no_op() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_lookup().never();

        let track = Track::resolved("T1", "https://cdn.example.com/t1.webm", UserId::new(1));
        let address = resolver(provider).resolve(&track).await.unwrap();
        assert_eq!(address, PlayableAddress::new("https://cdn.example.com/t1.webm"));
    }

    #[tokio::test]
    async fn deferred_query_is_resolved_once_and_cached() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_source_name().return_const("mock");
        provider
            .expect_lookup()
            .withf(|query| query == "song artist Audio")
            .times(1)
            .returning(|_| Ok(Some(lookup("https://cdn.example.com/s.webm"))));

        let resolver = resolver(provider);
        let track = Track::deferred("Song - Artist", "song artist Audio", UserId::new(1));

        let first = resolver.resolve(&track).await.unwrap();
        let second = resolver.resolve(&track).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.url, "https://cdn.example.com/s.webm");
        assert_eq!(first.thumbnail.as_deref(), Some("https://img.example.com/t.jpg"));
        // El track no cambia de tipo al resolverse
        assert_eq!(track.kind(), SourceKind::DeferredQuery);
    }

    #[tokio::test]
    async fn provider_failures_map_to_resolution_errors() {
        let mut provider = MockMetadataProvider::new();
        provider.expect_source_name().return_const("mock");
        provider
            .expect_lookup()
            .withf(|query| query == "nada")
            .returning(|_| Ok(None));
        provider
            .expect_lookup()
            .withf(|query| query == "roto")
            .returning(|_| Err(anyhow::anyhow!("yt-dlp exited with 1")));
        provider
            .expect_lookup()
            .withf(|query| query == "vacio")
            .returning(|_| Ok(Some(lookup("  "))));

        let resolver = resolver(provider);
        let user = UserId::new(1);

        assert_eq!(
            resolver.resolve(&Track::deferred("a", "nada", user)).await,
            Err(ResolutionError::NotFound)
        );
        assert!(matches!(
            resolver.resolve(&Track::deferred("b", "roto", user)).await,
            Err(ResolutionError::Provider(_))
        ));
        assert_eq!(
            resolver.resolve(&Track::deferred("c", "vacio", user)).await,
            Err(ResolutionError::NotFound)
        );
        assert!(matches!(
            resolver.resolve(&Track::deferred("d", "   ", user)).await,
            Err(ResolutionError::Malformed(_))
        ));
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn provider_that_never_answers_times_out() {
        let resolver = TrackResolver::new(
            Arc::new(HangingProvider),
            ResolveCache::new(16, Duration::from_secs(60)),
        );

        let result = resolver
            .resolve(&Track::deferred("x", "consulta colgada", UserId::new(1)))
            .await;

        assert!(matches!(result, Err(ResolutionError::Provider(_))));
        assert!(resolver.cache().is_empty());
    }
}
