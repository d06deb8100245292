use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use aura_common::{COMPARISON_PAGE_PATH, CacheError};
use aura_record::{ProductSnapshot, Record, blob, share};

use crate::backend::Storage;
use crate::clock::{Clock, SystemClock};
use crate::notify::{ChangeEvent, ChangeNotifier};
use crate::policy::{CachePolicy, OnDuplicate, OnOverflow};

/// Lista persistente limitada, sem duplicatas, mais recente primeiro.
///
/// Toda operação relê o storage, aplica a mudança e escreve de volta; nenhum
/// estado da lista fica guardado aqui. Falhas de storage nunca escapam: leituras
/// viram lista vazia e mutações retornam `false`.
#[derive(Clone)]
pub struct ListCache {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn ChangeNotifier>,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl ListCache {
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn ChangeNotifier>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            storage,
            notifier,
            policy,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn storage_key(&self) -> &str {
        &self.policy.storage_key
    }

    // --- Leitura ---

    /// Registros atuais, mais recente primeiro. Vazio se o storage estiver
    /// inacessível ou o blob corrompido.
    pub fn get(&self) -> Vec<Record> {
        match self.load() {
            Ok(records) => records,
            Err(e) => {
                warn!("{}: leitura falhou, usando lista vazia: {e}", self.storage_key());
                Vec::new()
            }
        }
    }

    pub fn is_member(&self, key: &str) -> bool {
        self.get().iter().any(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registros para exibição: sem o produto da página atual, no máximo `limit`.
    pub fn visible(&self, exclude: Option<&str>, limit: usize) -> Vec<Record> {
        self.get()
            .into_iter()
            .filter(|r| exclude != Some(r.key.as_str()))
            .take(limit)
            .collect()
    }

    /// Link de compartilhamento da lista atual.
    pub fn share_url(&self, base: &str) -> String {
        let keys: Vec<String> = self.get().into_iter().map(|r| r.key).collect();
        share::share_url(base, COMPARISON_PAGE_PATH, &keys)
    }

    /// Receivers (local, remoto) do notificador.
    pub fn subscribe(
        &self,
    ) -> (
        broadcast::Receiver<ChangeEvent>,
        broadcast::Receiver<ChangeEvent>,
    ) {
        (
            self.notifier.on_local_change(),
            self.notifier.on_remote_change(),
        )
    }

    // --- Mutações ---

    /// Insere o registro. Retorna se a inserção aconteceu.
    pub fn add(&self, record: Record) -> bool {
        match self.try_add(record) {
            Ok(()) => true,
            Err(e) => {
                self.report("add", &e);
                false
            }
        }
    }

    pub fn add_product(&self, product: ProductSnapshot) -> bool {
        self.add(product.into_record(self.clock.now_ms()))
    }

    pub fn try_add(&self, record: Record) -> Result<(), CacheError> {
        record.validate()?;

        let mut records = self.get();

        if let Some(pos) = records.iter().position(|r| r.key == record.key) {
            match self.policy.on_duplicate {
                OnDuplicate::Reject => return Err(CacheError::Duplicate(record.key)),
                OnDuplicate::Refresh => {
                    records.remove(pos);
                }
            }
        } else if records.len() >= self.policy.max_size
            && self.policy.on_overflow == OnOverflow::Reject
        {
            return Err(CacheError::Full(self.policy.max_size));
        }

        records.insert(0, record);

        if records.len() > self.policy.max_size {
            let evicted = records.split_off(self.policy.max_size);
            for r in &evicted {
                debug!("{}: {} descartado (FIFO)", self.storage_key(), r.key);
            }
        }

        self.persist(&records)?;
        self.notifier.notify_local(self.storage_key());
        Ok(())
    }

    /// Remove a chave. Retorna se havia algo para remover.
    pub fn remove(&self, key: &str) -> bool {
        match self.try_remove(key) {
            Ok(_) => true,
            Err(e) => {
                self.report("remove", &e);
                false
            }
        }
    }

    pub fn try_remove(&self, key: &str) -> Result<Record, CacheError> {
        let mut records = self.get();
        let pos = records
            .iter()
            .position(|r| r.key == key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))?;
        let removed = records.remove(pos);

        self.persist(&records)?;
        self.notifier.notify_local(self.storage_key());
        Ok(removed)
    }

    /// Esvazia a lista apagando a chave de storage. Sempre notifica.
    pub fn clear(&self) {
        if let Err(e) = self.storage.remove_item(self.storage_key()) {
            warn!("{}: falha ao limpar: {e}", self.storage_key());
        }
        self.notifier.notify_local(self.storage_key());
    }

    /// Mescla chaves vindas de um link compartilhado. Chaves novas entram no
    /// fim como placeholders; o resultado é truncado ao limite. Retorna
    /// quantas chaves novas ficaram na lista.
    pub fn merge_keys<S: AsRef<str>>(&self, keys: &[S]) -> usize {
        let mut records = self.get();
        let before: HashSet<String> = records.iter().map(|r| r.key.clone()).collect();
        let now = self.clock.now_ms();

        for key in keys.iter().map(|k| AsRef::<str>::as_ref(k).trim()) {
            if key.is_empty() || records.iter().any(|r| r.key == key) {
                continue;
            }
            records.push(ProductSnapshot::placeholder(key).into_record(now));
        }
        records.truncate(self.policy.max_size);

        let inserted = records.iter().filter(|r| !before.contains(&r.key)).count();
        if inserted == 0 {
            return 0;
        }

        match self.persist(&records) {
            Ok(_) => {
                self.notifier.notify_local(self.storage_key());
                inserted
            }
            Err(e) => {
                self.report("merge", &e);
                0
            }
        }
    }

    // --- Internos ---

    /// Lê, descarta expirados e excedentes, e regrava se algo foi descartado.
    fn load(&self) -> Result<Vec<Record>, CacheError> {
        let Some(data) = self.storage.get_item(self.storage_key())? else {
            return Ok(Vec::new());
        };
        let stored = blob::decode(&data)?;
        let total = stored.len();
        let now = self.clock.now_ms();

        let mut records: Vec<Record> = stored
            .into_iter()
            .filter(|r| !self.policy.is_expired(r, now))
            .collect();
        if records.len() < total {
            debug!(
                "{}: {} registro(s) expirado(s) removido(s)",
                self.storage_key(),
                total - records.len()
            );
        }
        records.truncate(self.policy.max_size);

        if records.len() != total
            && let Err(e) = self.persist(&records)
        {
            warn!("{}: falha ao regravar lista filtrada: {e}", self.storage_key());
        }

        Ok(records)
    }

    /// Escreve a lista. Lista vazia apaga a chave. Em quota excedida tenta
    /// mais uma vez só com os registros mais novos. Retorna quantos foram gravados.
    fn persist(&self, records: &[Record]) -> Result<usize, CacheError> {
        let key = self.storage_key();
        if records.is_empty() {
            self.storage.remove_item(key)?;
            return Ok(0);
        }

        let data = blob::encode(records)?;
        match self.storage.set_item(key, &data) {
            Ok(()) => Ok(records.len()),
            Err(e) if e.is_quota() => {
                let keep = self.policy.reduced_size().min(records.len());
                warn!("{key}: {e}; tentando com {keep} registro(s)");
                let data = blob::encode(&records[..keep])?;
                self.storage.set_item(key, &data)?;
                Ok(keep)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn report(&self, op: &str, err: &CacheError) {
        match err {
            CacheError::Storage(_) | CacheError::Codec(_) => {
                warn!("{}: {op} descartado: {err}", self.storage_key());
            }
            _ => debug!("{}: {op} sem efeito: {err}", self.storage_key()),
        }
    }
}
