use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::signal;
use tokio::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use aura_common::{DEFAULT_DATA_DIR, DEFAULT_WATCH_INTERVAL_MS};
use aura_record::{ProductSnapshot, Record, share};
use aura_storage::{CachePolicy, EventBus, FileStorage, ListCache, Storage};

#[derive(Parser, Debug)]
#[command(name = "aura", about = "Listas persistentes da loja: vistos recentemente e comparação")]
struct Args {
    /// Diretório onde as listas ficam gravadas
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = ListKind::RecentlyViewed)]
    list: ListKind,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum ListKind {
    RecentlyViewed,
    Comparison,
}

impl ListKind {
    fn policy(self) -> CachePolicy {
        match self {
            ListKind::RecentlyViewed => CachePolicy::recently_viewed(),
            ListKind::Comparison => CachePolicy::comparison(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Lista os registros, mais recente primeiro
    List {
        /// Produto da página atual, omitido da saída
        #[arg(long)]
        exclude: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Adiciona um produto
    Add {
        handle: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        image: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        compare_at_price: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        unavailable: bool,
    },
    Remove {
        handle: String,
    },
    Clear,
    Contains {
        handle: String,
    },
    /// Imprime o link de compartilhamento
    Share {
        #[arg(long, default_value = "https://techauraz.com")]
        base: String,
    },
    /// Mescla handles de um link de compartilhamento
    Import {
        link: String,
    },
    /// Acompanha mudanças feitas por outros processos
    Watch {
        #[arg(long, default_value_t = DEFAULT_WATCH_INTERVAL_MS)]
        interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aura_cli=info,aura_storage=warn".into()),
        )
        .init();

    let args = Args::parse();

    let storage = FileStorage::open(&args.data_dir)
        .with_context(|| format!("não foi possível abrir {:?}", args.data_dir))?;
    if !storage.is_available() {
        warn!("storage em {:?} não aceita escrita; operações serão no-op", args.data_dir);
    }

    let bus = EventBus::new();
    let cache = ListCache::new(
        Arc::new(storage.clone()),
        Arc::new(bus.clone()),
        args.list.policy(),
    );

    match args.command {
        Cmd::List {
            exclude,
            limit,
            json,
        } => {
            let records = cache.visible(exclude.as_deref(), limit.unwrap_or(usize::MAX));
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("(lista vazia)");
            } else {
                for (i, record) in records.iter().enumerate() {
                    println!("{}) {}", i + 1, format_record(record));
                }
            }
        }
        Cmd::Add {
            handle,
            title,
            image,
            price,
            compare_at_price,
            url,
            id,
            unavailable,
        } => {
            let product = ProductSnapshot {
                title: title.unwrap_or_else(|| handle.clone()),
                handle: handle.clone(),
                id,
                image,
                price,
                compare_at_price,
                available: !unavailable,
                url,
            };
            if cache.add_product(product) {
                println!("adicionado: {handle}");
            } else {
                println!("{}", rejection_message(&cache, &handle));
            }
        }
        Cmd::Remove { handle } => {
            if cache.remove(&handle) {
                println!("removido: {handle}");
            } else {
                println!("não encontrado: {handle}");
            }
        }
        Cmd::Clear => {
            cache.clear();
            println!("lista limpa");
        }
        Cmd::Contains { handle } => {
            println!("{}", cache.is_member(&handle));
        }
        Cmd::Share { base } => {
            println!("{}", cache.share_url(&base));
        }
        Cmd::Import { link } => {
            let keys = share::parse_share_link(&link);
            let inserted = cache.merge_keys(&keys);
            println!("{inserted} de {} produto(s) importado(s)", keys.len());
        }
        Cmd::Watch { interval_ms } => {
            watch(&cache, &storage, &bus, Duration::from_millis(interval_ms)).await;
        }
    }

    Ok(())
}

/// Imprime a lista cada vez que outro processo a altera, até Ctrl-C.
async fn watch(cache: &ListCache, storage: &FileStorage, bus: &EventBus, period: Duration) {
    let (_, remote) = cache.subscribe();
    let watcher = storage.watch(bus, period);
    let mut events = BroadcastStream::new(remote);

    info!("acompanhando {} (Ctrl-C para sair)", cache.storage_key());

    loop {
        tokio::select! {
            item = events.next() => {
                match item {
                    Some(Ok(event)) if event.concerns(cache.storage_key()) => {
                        let keys: Vec<String> = cache.get().into_iter().map(|r| r.key).collect();
                        println!("{}: [{}]", event.key, keys.join(", "));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => warn!("eventos perdidos: {e}"),
                    None => break,
                }
            }
            _ = signal::ctrl_c() => {
                info!("encerrando");
                break;
            }
        }
    }

    watcher.abort();
}

/// Explica por que um `add` não teve efeito.
fn rejection_message(cache: &ListCache, handle: &str) -> String {
    let policy = cache.policy();
    if handle.trim().is_empty() {
        "handle vazio".into()
    } else if cache.is_member(handle) {
        format!("já está na lista: {handle}")
    } else if cache.len() >= policy.max_size {
        format!("máximo de {} produtos para comparar", policy.max_size)
    } else {
        format!("não foi possível gravar {handle}")
    }
}

/// Formata um registro para exibição humana.
fn format_record(record: &Record) -> String {
    let mut line = format!("{} [{}]", record.title(), record.key);
    if let Some(price) = record.attribute_str("price") {
        line.push_str(&format!(" {price}"));
        if let Some(compare) = record.attribute_str("compareAtPrice")
            && compare != price
        {
            line.push_str(&format!(" (antes {compare})"));
        }
    }
    if record.attribute("available").and_then(|v| v.as_bool()) == Some(false) {
        line.push_str(" esgotado");
    }
    line
}
