use crate::domain::model::{Card, CardId, OwnerId, SchedulingState};
use crate::domain::ports::CardStore;
use crate::utils::error::{ReviewError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Card store persisted as one pretty-printed JSON array.
///
/// Every write rewrites the file through a temporary sibling and a rename.
/// A missing file is an empty store.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // 序列化同一行程內的讀改寫
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds cards, replacing any with the same id. Returns how many were written.
    pub async fn insert_all(&self, new_cards: Vec<Card>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut cards = self.read_all()?;
        let written = new_cards.len();

        for card in new_cards {
            match cards.iter_mut().find(|existing| existing.id == card.id) {
                Some(existing) => *existing = card,
                None => cards.push(card),
            }
        }

        self.write_all(&cards)?;
        tracing::debug!("Saved {} cards to {}", written, self.path.display());
        Ok(written)
    }

    pub async fn all_cards(&self) -> Result<Vec<Card>> {
        let _guard = self.lock.lock().await;
        self.read_all()
    }

    fn read_all(&self) -> Result<Vec<Card>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable(&self.path, e)),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_all(&self, cards: &[Card]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| unavailable(parent, e))?;
            }
        }

        let json = serde_json::to_vec_pretty(cards)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| unavailable(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| unavailable(&self.path, e))?;
        Ok(())
    }
}

fn unavailable(path: &Path, e: std::io::Error) -> ReviewError {
    ReviewError::StoreUnavailable {
        message: format!("{}: {}", path.display(), e),
    }
}

impl CardStore for JsonFileStore {
    async fn get(&self, id: &CardId) -> Result<Option<Card>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all()?.into_iter().find(|card| &card.id == id))
    }

    async fn due_cards(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<Vec<Card>> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|card| card.is_owned_by(owner) && card.is_due(now))
            .collect())
    }

    async fn count_due(&self, owner: &OwnerId, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        Ok(self
            .read_all()?
            .iter()
            .filter(|card| card.is_owned_by(owner) && card.is_due(now))
            .count())
    }

    async fn update_schedule(&self, id: &CardId, schedule: &SchedulingState) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut cards = self.read_all()?;
        let card = cards
            .iter_mut()
            .find(|card| &card.id == id)
            .ok_or_else(|| ReviewError::CardNotFound {
                card_id: id.to_string(),
            })?;
        card.schedule = schedule.clone();
        self.write_all(&cards)
    }
}
