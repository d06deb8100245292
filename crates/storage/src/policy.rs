use std::time::Duration;

use aura_common::{
    COMPARISON_KEY, COMPARISON_MAX, EXPIRY_MS, RECENTLY_VIEWED_KEY, RECENTLY_VIEWED_MAX,
};
use aura_record::Record;

/// O que fazer quando uma chave nova chega com a lista cheia.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OnOverflow {
    /// Descarta o registro mais antigo (FIFO).
    #[default]
    Evict,
    /// Recusa a inserção.
    Reject,
}

/// O que fazer quando a chave já está na lista.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    /// Remove a ocorrência anterior e reinsere na frente.
    #[default]
    Refresh,
    /// Não faz nada e reporta falha.
    Reject,
}

/// Parâmetros de uma lista: chave de storage, limite, expiração e política
/// de overflow/duplicata.
#[derive(Debug, Clone, PartialEq)]
pub struct CachePolicy {
    pub storage_key: String,
    pub max_size: usize,
    pub expiry: Option<Duration>,
    pub on_overflow: OnOverflow,
    pub on_duplicate: OnDuplicate,
}

impl CachePolicy {
    pub fn new(storage_key: impl Into<String>, max_size: usize) -> Self {
        Self {
            storage_key: storage_key.into(),
            max_size: max_size.max(1),
            expiry: None,
            on_overflow: OnOverflow::default(),
            on_duplicate: OnDuplicate::default(),
        }
    }

    /// Vistos recentemente: 20 itens, 30 dias, FIFO, re-visita move para frente.
    pub fn recently_viewed() -> Self {
        Self::new(RECENTLY_VIEWED_KEY, RECENTLY_VIEWED_MAX)
            .with_expiry(Duration::from_millis(EXPIRY_MS))
    }

    /// Comparação: 4 itens, sem expiração, recusa overflow e duplicatas.
    pub fn comparison() -> Self {
        Self::new(COMPARISON_KEY, COMPARISON_MAX)
            .with_overflow(OnOverflow::Reject)
            .with_duplicate(OnDuplicate::Reject)
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn without_expiry(mut self) -> Self {
        self.expiry = None;
        self
    }

    pub fn with_overflow(mut self, on_overflow: OnOverflow) -> Self {
        self.on_overflow = on_overflow;
        self
    }

    pub fn with_duplicate(mut self, on_duplicate: OnDuplicate) -> Self {
        self.on_duplicate = on_duplicate;
        self
    }

    pub fn is_expired(&self, record: &Record, now_ms: u64) -> bool {
        self.expiry
            .map(|window| u128::from(record.age_ms(now_ms)) >= window.as_millis())
            .unwrap_or(false)
    }

    /// Tamanho usado no retry após quota excedida.
    pub fn reduced_size(&self) -> usize {
        (self.max_size / 2).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn presets() {
        let rv = CachePolicy::recently_viewed();
        assert_eq!(rv.storage_key, "techauraz_recently_viewed");
        assert_eq!(rv.max_size, 20);
        assert_eq!(rv.expiry, Some(Duration::from_secs(30 * 24 * 60 * 60)));
        assert_eq!(rv.on_overflow, OnOverflow::Evict);
        assert_eq!(rv.on_duplicate, OnDuplicate::Refresh);

        let cmp = CachePolicy::comparison();
        assert_eq!(cmp.storage_key, "techauraz_comparison_list");
        assert_eq!(cmp.max_size, 4);
        assert_eq!(cmp.expiry, None);
        assert_eq!(cmp.on_overflow, OnOverflow::Reject);
        assert_eq!(cmp.on_duplicate, OnDuplicate::Reject);
    }

    #[test]
    fn zero_max_size_is_clamped() {
        assert_eq!(CachePolicy::new("k", 0).max_size, 1);
        assert_eq!(CachePolicy::new("k", 5).with_max_size(0).max_size, 1);
    }

    #[test]
    fn expiry_boundary() {
        let policy = CachePolicy::new("k", 5).with_expiry(Duration::from_millis(100));
        let record = Record::new("p", Map::new(), 1_000);
        assert!(!policy.is_expired(&record, 1_099));
        assert!(policy.is_expired(&record, 1_100));
        assert!(!policy.without_expiry().is_expired(&record, u64::MAX));
    }

    #[test]
    fn reduced_size_halves() {
        assert_eq!(CachePolicy::recently_viewed().reduced_size(), 10);
        assert_eq!(CachePolicy::new("k", 1).reduced_size(), 1);
        assert_eq!(CachePolicy::new("k", 3).reduced_size(), 1);
    }
}
