use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info, warn};

use crate::sources::Track;

/// Cola FIFO de una guild.
///
/// Solo la muta el actor de la sesión, así que ninguna operación necesita
/// sincronización propia; la serialización la da el canal del actor.
#[derive(Debug)]
pub struct SessionQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl SessionQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega tracks al final en el orden recibido; devuelve cuántos entraron.
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let available_space = self.max_size.saturating_sub(self.items.len());
        let mut added = 0;

        for track in tracks {
            if added == available_space {
                warn!("🚫 La cola está llena (máximo {} canciones)", self.max_size);
                break;
            }
            self.items.push_back(track);
            added += 1;
        }

        info!("➕ Agregadas {} canciones a la cola", added);
        added
    }

    /// Saca la cabeza de la cola (FIFO)
    pub fn pop_front(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        if let Some(track) = &next {
            debug!("➡️ Siguiente en cola: {}", track.title());
        }
        next
    }

    /// Limpia la cola; no toca lo que está sonando
    pub fn clear(&mut self) -> usize {
        let cleared = self.items.len();
        self.items.clear();
        if cleared > 0 {
            info!("🗑️ Cola limpiada: {} tracks removidos", cleared);
        }
        cleared
    }

    /// Mezcla la cola
    pub fn shuffle(&mut self) {
        if self.items.len() <= 1 {
            return;
        }
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada");
    }

    /// Copia de la cola para mostrar; nunca expone la cola viva.
    pub fn peek_all(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Entrada de la cola tal como se lista a los usuarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub title: String,
    pub author: String,
}

impl From<&Track> for QueueEntry {
    fn from(track: &Track) -> Self {
        Self {
            title: track.title().to_string(),
            author: track.author().to_string(),
        }
    }
}

/// Foto de la cola más lo que suena, para renderizar.
#[derive(Debug, Clone, Default)]
pub struct QueueSnapshot {
    pub now_playing: Option<Track>,
    pub items: Vec<Track>,
}

impl QueueSnapshot {
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.items.iter().map(QueueEntry::from).collect()
    }

    pub fn total_duration(&self) -> Duration {
        self.items
            .iter()
            .chain(self.now_playing.iter())
            .filter_map(|track| track.duration())
            .sum()
    }

    /// Obtiene una página específica de la cola
    pub fn get_page(&self, page: usize, items_per_page: usize) -> QueuePage {
        let items_per_page = items_per_page.max(1);
        let total_pages = self.items.len().div_ceil(items_per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * items_per_page;
        let end = (start + items_per_page).min(self.items.len());

        QueuePage {
            items: self.items.get(start..end).map(<[Track]>::to_vec).unwrap_or_default(),
            first_position: start + 1,
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<Track>,
    /// Posición (1-based) del primer item de la página dentro de la cola
    pub first_position: usize,
    pub current_page: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;
    use std::collections::HashSet;

    fn track(title: &str) -> Track {
        Track::resolved(title, format!("https://cdn.example.com/{}.webm", title), UserId::new(1))
    }

    fn titles(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(Track::title).collect()
    }

    #[test]
    fn enqueue_preserves_insertion_order() {
        let mut queue = SessionQueue::new(100);
        assert_eq!(queue.enqueue(vec![track("a"), track("b")]), 2);
        assert_eq!(queue.enqueue(vec![track("c")]), 1);
        assert_eq!(queue.enqueue(Vec::new()), 0);

        assert_eq!(titles(&queue.peek_all()), vec!["a", "b", "c"]);
        assert_eq!(queue.pop_front().map(|t| t.title().to_string()), Some("a".to_string()));
        assert_eq!(titles(&queue.peek_all()), vec!["b", "c"]);
    }

    #[test]
    fn enqueue_respects_capacity() {
        let mut queue = SessionQueue::new(3);
        assert_eq!(queue.enqueue(vec![track("a"), track("b")]), 2);
        assert_eq!(queue.enqueue(vec![track("c"), track("d"), track("e")]), 1);
        assert_eq!(titles(&queue.peek_all()), vec!["a", "b", "c"]);
    }

    #[test]
    fn pop_and_clear_on_empty_queue() {
        let mut queue = SessionQueue::new(10);
        assert!(queue.pop_front().is_none());
        assert_eq!(queue.clear(), 0);

        queue.enqueue(vec![track("a"), track("b")]);
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut queue = SessionQueue::new(100);
        let names: Vec<String> = (0..20).map(|i| format!("t{}", i)).collect();
        queue.enqueue(names.iter().map(|n| track(n)));

        queue.shuffle();

        let after: HashSet<String> = queue.peek_all().iter().map(|t| t.title().to_string()).collect();
        let before: HashSet<String> = names.into_iter().collect();
        assert_eq!(queue.len(), 20);
        assert_eq!(after, before);
    }

    #[test]
    fn shuffle_short_queue_is_a_no_op() {
        let mut queue = SessionQueue::new(10);
        queue.shuffle();
        assert!(queue.is_empty());

        queue.enqueue(vec![track("solo")]);
        queue.shuffle();
        assert_eq!(titles(&queue.peek_all()), vec!["solo"]);
    }

    #[test]
    fn peek_all_is_a_detached_copy() {
        let mut queue = SessionQueue::new(10);
        queue.enqueue(vec![track("a")]);
        let mut snapshot = queue.peek_all();
        snapshot.clear();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn snapshot_pages() {
        let snapshot = QueueSnapshot {
            now_playing: Some(track("now").with_duration(Duration::from_secs(60))),
            items: (1..=25)
                .map(|i| track(&format!("t{}", i)).with_duration(Duration::from_secs(10)))
                .collect(),
        };

        assert_eq!(snapshot.total_duration(), Duration::from_secs(310));

        let page = snapshot.get_page(3, 10);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.first_position, 21);
        assert_eq!(titles(&page.items), vec!["t21", "t22", "t23", "t24", "t25"]);

        // Páginas fuera de rango se ajustan a la última
        assert_eq!(snapshot.get_page(9, 10).current_page, 3);
        assert_eq!(QueueSnapshot::default().get_page(1, 10).items.len(), 0);
        assert_eq!(snapshot.entries()[0], QueueEntry { title: "t1".to_string(), author: "Unknown".to_string() });
    }
}
