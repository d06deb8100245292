#![forbid(unsafe_code)]

mod error;

pub use error::*;

/// Chave de storage da lista de vistos recentemente.
pub const RECENTLY_VIEWED_KEY: &str = "techauraz_recently_viewed";
/// Chave de storage da lista de comparação.
pub const COMPARISON_KEY: &str = "techauraz_comparison_list";

pub const RECENTLY_VIEWED_MAX: usize = 20;
pub const COMPARISON_MAX: usize = 4;
pub const EXPIRY_DAYS: u64 = 30;
pub const EXPIRY_MS: u64 = EXPIRY_DAYS * 24 * 60 * 60 * 1000;

/// Página que renderiza a tabela de comparação.
pub const COMPARISON_PAGE_PATH: &str = "/pages/comparar";
/// Parâmetro de query usado nos links de compartilhamento.
pub const SHARE_PARAM: &str = "compare";

pub const DEFAULT_DATA_DIR: &str = ".aura";
pub const EVENT_CHANNEL_CAPACITY: usize = 128;
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 500;
