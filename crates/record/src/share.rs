//! Links de compartilhamento da comparação (`?compare=a,b,c`).

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::{Url, form_urlencoded};

use aura_common::SHARE_PARAM;

/// Tudo exceto `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, como `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Monta o link `<base><path>?compare=<chaves>`.
pub fn share_url<S: AsRef<str>>(base: &str, path: &str, keys: &[S]) -> String {
    let joined = keys
        .iter()
        .map(|k| AsRef::<str>::as_ref(k))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}{}?{}={}",
        base.trim_end_matches('/'),
        path,
        SHARE_PARAM,
        utf8_percent_encode(&joined, URI_COMPONENT)
    )
}

/// Extrai as chaves do parâmetro `compare` de um link ou de uma query string.
/// Entrada sem `?`, `=` nem `://` é tratada como lista crua separada por
/// vírgulas. Link ou query sem `compare` resulta em lista vazia. Duplicadas
/// e vazias são descartadas; a primeira ocorrência vence.
pub fn parse_share_link(input: &str) -> Vec<String> {
    let input = input.trim();

    let raw = if input.contains("://") {
        match Url::parse(input) {
            Ok(url) => compare_param(url.query_pairs()),
            Err(_) => None,
        }
    } else if input.contains('?') || input.contains('=') {
        let query = input.split_once('?').map(|(_, q)| q).unwrap_or(input);
        let query = query.split('#').next().unwrap_or_default();
        compare_param(form_urlencoded::parse(query.as_bytes()))
    } else {
        Some(input.to_string())
    };

    let mut keys: Vec<String> = Vec::new();
    for key in raw.as_deref().unwrap_or_default().split(',').map(str::trim) {
        if !key.is_empty() && !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

fn compare_param<'a>(
    mut pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>,
) -> Option<String> {
    pairs
        .find(|(name, _)| name == SHARE_PARAM)
        .map(|(_, value)| value.into_owned())
}
