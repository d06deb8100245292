//! Layout persistido: um array JSON de registros por chave de storage.

use aura_common::CodecError;

use crate::Record;

pub fn encode(records: &[Record]) -> Result<String, CodecError> {
    serde_json::to_string(records).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Faz o parse do blob. Qualquer coisa que não seja um array de registros
/// válidos é `Malformed`; não há recuperação parcial.
pub fn decode(data: &str) -> Result<Vec<Record>, CodecError> {
    serde_json::from_str(data).map_err(|e| CodecError::Malformed(e.to_string()))
}
