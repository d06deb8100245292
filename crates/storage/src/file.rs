use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tempfile::NamedTempFile;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use aura_common::StorageError;

use crate::backend::Storage;
use crate::notify::{ChangeEvent, EventBus};

const EXTENSION: &str = "json";

/// Caracteres mantidos no nome do arquivo; o resto vira `%XX`. O ponto também
/// é codificado, então nenhum nome começa com `.` nem contém `..`.
const FILE_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Storage em disco: um arquivo `<chave>.json` por chave dentro de um diretório.
///
/// Vários processos podem abrir o mesmo diretório; `watch` faz o papel do
/// sinal de mudança entre abas.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    quota: Option<usize>,
    /// Último conteúdo conhecido por chave (None = ausente). Escritas deste
    /// handle atualizam o mapa sob o mesmo lock usado pelo watcher, para que
    /// não sejam reportadas de volta.
    seen: Arc<Mutex<Seen>>,
}

type Seen = HashMap<String, Option<String>>;

fn lock(seen: &Mutex<Seen>) -> MutexGuard<'_, Seen> {
    seen.lock().unwrap_or_else(|e| e.into_inner())
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            quota: None,
            seen: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Limite total de bytes somando todos os arquivos do diretório.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{EXTENSION}", encode_key(key)))
    }

    fn check_quota(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let Some(quota) = self.quota else {
            return Ok(());
        };
        let target = self.path_for(key);
        let mut others = 0usize;
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path != target && is_data_file(&path) {
                others += std::fs::metadata(&path).map(|m| m.len() as usize).unwrap_or(0);
            }
        }
        let needed = others + value.len();
        if needed > quota {
            return Err(StorageError::QuotaExceeded { needed, quota });
        }
        Ok(())
    }

    /// Inicia o polling do diretório. Mudanças feitas por outros processos
    /// viram `ChangeEvent::remote` no barramento; as deste handle são ignoradas.
    pub fn watch(&self, bus: &EventBus, period: Duration) -> JoinHandle<()> {
        // Estado atual é a linha de base: só mudanças posteriores notificam
        match snapshot(&self.dir) {
            Ok(current) => {
                let mut seen = lock(&self.seen);
                for (key, content) in current {
                    seen.insert(key, Some(content));
                }
            }
            Err(e) => warn!("falha ao ler {:?}: {e}", self.dir),
        }

        let dir = self.dir.clone();
        let seen = self.seen.clone();
        let tx = bus.remote_sender();

        info!("observando {dir:?} a cada {period:?}");

        tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tick.tick().await;

                let scan_dir = dir.clone();
                let scan_seen = seen.clone();
                let changed = tokio::task::spawn_blocking(move || {
                    let mut seen = lock(&scan_seen);
                    snapshot(&scan_dir).map(|current| diff(&mut seen, &current))
                })
                .await;

                let changed = match changed {
                    Ok(Ok(changed)) => changed,
                    Ok(Err(e)) => {
                        warn!("falha ao ler {dir:?}: {e}");
                        continue;
                    }
                    Err(e) => {
                        warn!("scan abortado: {e}");
                        continue;
                    }
                };

                for key in changed {
                    debug!("mudança externa em {key}");
                    let _ = tx.send(ChangeEvent::remote(key));
                }
            }
        })
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_quota(key, value)?;

        let target = self.path_for(key);

        // Temporário com nome único: escritores concorrentes nunca disputam o mesmo arquivo
        let mut seen = lock(&self.seen);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(value.as_bytes())?;
        tmp.persist(&target).map_err(|e| e.error)?;
        seen.insert(key.to_string(), Some(value.to_string()));
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut seen = lock(&self.seen);
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        seen.insert(key.to_string(), None);
        Ok(())
    }
}

/// Chave → nome de arquivo, reversível por `decode_key`.
fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, FILE_NAME).to_string()
}

fn decode_key(stem: &str) -> Option<String> {
    percent_decode_str(stem)
        .decode_utf8()
        .ok()
        .map(|key| key.into_owned())
}

fn is_data_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
}

/// Conteúdo atual de todos os arquivos de dados, por chave.
fn snapshot(dir: &Path) -> std::io::Result<HashMap<String, String>> {
    let mut current = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_data_file(&path) {
            continue;
        }
        let Some(key) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(decode_key)
        else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                current.insert(key, content);
            }
            // Removido entre o read_dir e a leitura
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(current)
}

/// Compara o snapshot com o último estado conhecido, atualiza `seen` e
/// devolve as chaves que mudaram.
fn diff(seen: &mut Seen, current: &HashMap<String, String>) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, content) in current {
        let known = seen.get(key).and_then(|v| v.as_deref());
        if known != Some(content.as_str()) {
            seen.insert(key.clone(), Some(content.clone()));
            changed.push(key.clone());
        }
    }

    let removed: Vec<String> = seen
        .iter()
        .filter(|(key, content)| content.is_some() && !current.contains_key(*key))
        .map(|(key, _)| key.clone())
        .collect();
    for key in removed {
        seen.insert(key.clone(), None);
        changed.push(key);
    }

    changed
}
