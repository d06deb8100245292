/// Erros do backend de armazenamento.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage indisponível")]
    Unavailable,
    #[error("quota excedida: {needed} bytes necessários, limite de {quota}")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Erros de (de)serialização do blob persistido.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("blob malformado: {0}")]
    Malformed(String),
    #[error("falha ao serializar lista: {0}")]
    Encode(String),
}

/// Erros de validação de um registro.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecordError {
    #[error("registro sem chave")]
    EmptyKey,
}

/// Motivos pelos quais uma mutação no cache não teve efeito.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("lista cheia ({0} itens)")]
    Full(usize),
    #[error("chave já presente: {0}")]
    Duplicate(String),
    #[error("chave não encontrada: {0}")]
    NotFound(String),
}

/// Erro top-level do Aura.
#[derive(Debug, thiserror::Error)]
pub enum AuraError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Result type alias.
pub type AuraResult<T> = Result<T, AuraError>;

// Conversão implícita de io::Error → AuraError (via StorageError)
impl From<std::io::Error> for AuraError {
    fn from(e: std::io::Error) -> Self {
        AuraError::Storage(StorageError::Io(e))
    }
}

impl StorageError {
    /// Quota excedida é o único erro que justifica retry com lista reduzida.
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}
