use tokio::sync::broadcast;

use aura_common::EVENT_CHANNEL_CAPACITY;

/// De onde veio a mudança: da própria aba (evento in-page) ou de outra
/// aba/processo (sinal nativo de mudança no storage).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Local,
    Remote,
}

/// Notificação de que a lista persistida sob `key` mudou.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub origin: ChangeOrigin,
}

impl ChangeEvent {
    pub fn local(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            origin: ChangeOrigin::Local,
        }
    }

    pub fn remote(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            origin: ChangeOrigin::Remote,
        }
    }

    pub fn concerns(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Porta de notificação usada pelo cache.
///
/// O cache só emite eventos locais; os remotos são entregues pelo backend
/// de storage (ou por quem simular o sinal entre abas).
pub trait ChangeNotifier: Send + Sync {
    /// Publica uma mudança para os ouvintes da mesma aba. Retorna quantos receberam.
    fn notify_local(&self, key: &str) -> usize;

    fn on_local_change(&self) -> broadcast::Receiver<ChangeEvent>;

    fn on_remote_change(&self) -> broadcast::Receiver<ChangeEvent>;
}

/// Barramento de eventos de uma aba: um canal broadcast para mudanças locais
/// e outro para mudanças vindas de fora.
#[derive(Debug, Clone)]
pub struct EventBus {
    local: broadcast::Sender<ChangeEvent>,
    remote: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            local: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
            remote: broadcast::channel(EVENT_CHANNEL_CAPACITY).0,
        }
    }

    /// Lado emissor do canal remoto, entregue ao backend de storage.
    pub fn remote_sender(&self) -> broadcast::Sender<ChangeEvent> {
        self.remote.clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier for EventBus {
    fn notify_local(&self, key: &str) -> usize {
        // Sem ouvintes não é erro
        self.local.send(ChangeEvent::local(key)).unwrap_or(0)
    }

    fn on_local_change(&self) -> broadcast::Receiver<ChangeEvent> {
        self.local.subscribe()
    }

    fn on_remote_change(&self) -> broadcast::Receiver<ChangeEvent> {
        self.remote.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_event_reaches_subscriber() {
        let bus = EventBus::new();
        let mut rx = bus.on_local_change();
        assert_eq!(bus.notify_local("lista"), 1);
        let event = rx.recv().await.unwrap();
        assert_eq!(event, ChangeEvent::local("lista"));
    }

    #[test]
    fn notify_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.notify_local("lista"), 0);
    }

    #[tokio::test]
    async fn remote_sender_feeds_remote_channel() {
        let bus = EventBus::new();
        let mut local = bus.on_local_change();
        let mut remote = bus.on_remote_change();

        bus.remote_sender().send(ChangeEvent::remote("lista")).unwrap();

        assert_eq!(remote.recv().await.unwrap().origin, ChangeOrigin::Remote);
        assert!(local.try_recv().is_err());
    }

    #[test]
    fn event_concerns_key() {
        let event = ChangeEvent::remote("a");
        assert!(event.concerns("a"));
        assert!(!event.concerns("b"));
    }
}
