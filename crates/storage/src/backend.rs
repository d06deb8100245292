use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use aura_common::StorageError;

use crate::notify::{ChangeEvent, EventBus};

const PROBE_KEY: &str = "__storage_test__";

/// Storage chave/valor síncrono, no molde do `localStorage` do navegador.
pub trait Storage: Send + Sync {
    /// `Ok(None)` se a chave não existe.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// `Ok(())` mesmo se a chave não existia.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Escreve e remove uma chave de teste.
    fn is_available(&self) -> bool {
        self.set_item(PROBE_KEY, PROBE_KEY)
            .and_then(|_| self.remove_item(PROBE_KEY))
            .is_ok()
    }
}

/// Estado compartilhado por todas as abas de uma mesma origem.
#[derive(Debug)]
struct OriginState {
    items: DashMap<String, String>,
    tabs: DashMap<u64, broadcast::Sender<ChangeEvent>>,
    next_tab: AtomicU64,
    quota: Option<usize>,
    disabled: AtomicBool,
}

/// Área de storage de uma origem, compartilhada entre abas.
#[derive(Debug, Clone)]
pub struct MemoryOrigin {
    shared: Arc<OriginState>,
}

impl MemoryOrigin {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Origem com limite total de bytes (chaves + valores).
    pub fn with_quota(bytes: usize) -> Self {
        Self::build(Some(bytes))
    }

    fn build(quota: Option<usize>) -> Self {
        Self {
            shared: Arc::new(OriginState {
                items: DashMap::new(),
                tabs: DashMap::new(),
                next_tab: AtomicU64::new(1),
                quota,
                disabled: AtomicBool::new(false),
            }),
        }
    }

    /// Abre uma "aba": um handle de storage cujas escritas notificam as
    /// outras abas pelo canal remoto do respectivo `EventBus`.
    pub fn attach(&self, bus: &EventBus) -> MemoryStorage {
        let tab_id = self.shared.next_tab.fetch_add(1, Ordering::Relaxed);
        self.shared.tabs.insert(tab_id, bus.remote_sender());
        debug!("aba {tab_id} conectada à origem");
        MemoryStorage {
            shared: self.shared.clone(),
            tab_id,
        }
    }

    /// Simula storage desabilitado (modo privado, política de segurança).
    pub fn set_disabled(&self, disabled: bool) {
        self.shared.disabled.store(disabled, Ordering::SeqCst);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.items.contains_key(key)
    }

    /// Valor cru, sem passar por uma aba.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.shared.items.get(key).map(|v| v.value().clone())
    }

    pub fn used_bytes(&self) -> usize {
        self.shared
            .items
            .iter()
            .map(|e| e.key().len() + e.value().len())
            .sum()
    }

    pub fn tab_count(&self) -> usize {
        self.shared.tabs.len()
    }
}

impl Default for MemoryOrigin {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle de storage de uma aba.
#[derive(Debug)]
pub struct MemoryStorage {
    shared: Arc<OriginState>,
    tab_id: u64,
}

impl MemoryStorage {
    fn check_enabled(&self) -> Result<(), StorageError> {
        if self.shared.disabled.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable);
        }
        Ok(())
    }

    fn check_quota(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let Some(quota) = self.shared.quota else {
            return Ok(());
        };
        let others: usize = self
            .shared
            .items
            .iter()
            .filter(|e| e.key() != key)
            .map(|e| e.key().len() + e.value().len())
            .sum();
        let needed = others + key.len() + value.len();
        if needed > quota {
            return Err(StorageError::QuotaExceeded { needed, quota });
        }
        Ok(())
    }

    /// Entrega o sinal de mudança a todas as abas, menos a que escreveu.
    fn broadcast_change(&self, key: &str) {
        for tab in self.shared.tabs.iter() {
            if *tab.key() != self.tab_id {
                let _ = tab.value().send(ChangeEvent::remote(key));
            }
        }
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check_enabled()?;
        Ok(self.shared.items.get(key).map(|v| v.value().clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        self.check_quota(key, value)?;
        let previous = self
            .shared
            .items
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.broadcast_change(key);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_enabled()?;
        if self.shared.items.remove(key).is_some() {
            self.broadcast_change(key);
        }
        Ok(())
    }
}

impl Drop for MemoryStorage {
    fn drop(&mut self) {
        self.shared.tabs.remove(&self.tab_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ChangeNotifier, ChangeOrigin};

    #[test]
    fn get_set_remove() {
        let origin = MemoryOrigin::new();
        let bus = EventBus::new();
        let storage = origin.attach(&bus);

        assert_eq!(storage.get_item("k").unwrap(), None);
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), Some("v".into()));
        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
        assert!(!origin.contains_key("k"));
    }

    #[test]
    fn remove_missing_is_ok() {
        let origin = MemoryOrigin::new();
        let storage = origin.attach(&EventBus::new());
        assert!(storage.remove_item("nada").is_ok());
    }

    #[test]
    fn disabled_storage_is_unavailable() {
        let origin = MemoryOrigin::new();
        let storage = origin.attach(&EventBus::new());
        assert!(storage.is_available());

        origin.set_disabled(true);
        assert!(!storage.is_available());
        assert!(matches!(
            storage.get_item("k"),
            Err(StorageError::Unavailable)
        ));
        assert!(matches!(
            storage.set_item("k", "v"),
            Err(StorageError::Unavailable)
        ));
    }

    #[test]
    fn probe_leaves_no_key() {
        let origin = MemoryOrigin::new();
        let storage = origin.attach(&EventBus::new());
        assert!(storage.is_available());
        assert!(!origin.contains_key(PROBE_KEY));
    }

    #[test]
    fn quota_counts_other_keys() {
        let origin = MemoryOrigin::with_quota(10);
        let storage = origin.attach(&EventBus::new());
        storage.set_item("a", "1234").unwrap(); // 5 bytes
        // Substituir o próprio valor não conta o antigo
        storage.set_item("a", "123456789").unwrap();
        assert!(matches!(
            storage.set_item("b", "12"),
            Err(StorageError::QuotaExceeded { needed: 13, quota: 10 })
        ));
        assert_eq!(origin.used_bytes(), 10);
    }

    #[tokio::test]
    async fn write_notifies_other_tabs_only() {
        let origin = MemoryOrigin::new();
        let bus_a = EventBus::new();
        let bus_b = EventBus::new();
        let tab_a = origin.attach(&bus_a);
        let _tab_b = origin.attach(&bus_b);

        let mut remote_a = bus_a.on_remote_change();
        let mut remote_b = bus_b.on_remote_change();

        tab_a.set_item("lista", "[]").unwrap();

        let event = remote_b.recv().await.unwrap();
        assert_eq!(event.key, "lista");
        assert_eq!(event.origin, ChangeOrigin::Remote);
        assert!(remote_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn unchanged_value_does_not_notify() {
        let origin = MemoryOrigin::new();
        let bus_a = EventBus::new();
        let bus_b = EventBus::new();
        let tab_a = origin.attach(&bus_a);
        let _tab_b = origin.attach(&bus_b);
        let mut remote_b = bus_b.on_remote_change();

        tab_a.set_item("lista", "[]").unwrap();
        tab_a.set_item("lista", "[]").unwrap();
        tab_a.remove_item("outra").unwrap();

        assert!(remote_b.recv().await.is_ok());
        assert!(remote_b.try_recv().is_err());
    }

    #[test]
    fn dropping_tab_detaches() {
        let origin = MemoryOrigin::new();
        let tab = origin.attach(&EventBus::new());
        assert_eq!(origin.tab_count(), 1);
        drop(tab);
        assert_eq!(origin.tab_count(), 0);
    }
}
