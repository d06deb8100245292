use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use aura_common::RecordError;

/// Nomes que não podem aparecer entre os atributos (colidem com os campos
/// do registro, inclusive os aliases do formato legado).
const RESERVED_FIELDS: [&str; 4] = ["key", "insertedAt", "handle", "timestamp"];

/// Snapshot serializável de uma entidade (produto) na lista.
///
/// Os atributos são payload opaco para o cache: nunca são interpretados,
/// apenas persistidos e devolvidos para a camada de renderização.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "handle")]
    pub key: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
    /// Epoch em milissegundos. Blobs antigos usam `timestamp` (ou nada).
    #[serde(rename = "insertedAt", alias = "timestamp", default)]
    pub inserted_at: u64,
}

impl Record {
    pub fn new(key: impl Into<String>, mut attributes: Map<String, Value>, inserted_at: u64) -> Self {
        for field in RESERVED_FIELDS {
            attributes.remove(field);
        }
        Self {
            key: key.into(),
            attributes,
            inserted_at,
        }
    }

    pub fn validate(&self) -> Result<(), RecordError> {
        if self.key.trim().is_empty() {
            return Err(RecordError::EmptyKey);
        }
        Ok(())
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.inserted_at)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    /// Título para exibição; cai para a chave quando ausente.
    pub fn title(&self) -> &str {
        self.attribute_str("title")
            .filter(|t| !t.is_empty())
            .unwrap_or(self.key.as_str())
    }
}

/// Dados de referência do produto, fornecidos pela página no momento da inserção.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub handle: String,
    pub id: Option<String>,
    pub title: String,
    pub image: Option<String>,
    pub price: Option<String>,
    pub compare_at_price: Option<String>,
    pub available: bool,
    pub url: Option<String>,
}

impl ProductSnapshot {
    pub fn new(handle: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            title: title.into(),
            available: true,
            ..Default::default()
        }
    }

    /// Stub para handles que chegam por link compartilhado, antes de termos
    /// os dados do produto.
    pub fn placeholder(handle: impl Into<String>) -> Self {
        let handle = handle.into();
        Self::new(handle.clone(), handle)
    }

    pub fn default_url(&self) -> String {
        format!("/products/{}", self.handle)
    }

    pub fn into_record(self, now_ms: u64) -> Record {
        let mut attributes = Map::new();
        let url = self.url.clone().unwrap_or_else(|| self.default_url());

        attributes.insert("title".into(), Value::String(self.title));
        if let Some(id) = self.id {
            attributes.insert("id".into(), Value::String(id));
        }
        if let Some(image) = self.image {
            attributes.insert("image".into(), Value::String(image));
        }
        if let Some(price) = self.price {
            attributes.insert("price".into(), Value::String(price));
        }
        if let Some(compare) = self.compare_at_price {
            attributes.insert("compareAtPrice".into(), Value::String(compare));
        }
        attributes.insert("available".into(), Value::Bool(self.available));
        attributes.insert("url".into(), Value::String(url));

        Record::new(self.handle, attributes, now_ms)
    }
}
