#![forbid(unsafe_code)]

mod backend;
mod cache;
mod clock;
mod file;
mod notify;
mod policy;

pub use backend::{MemoryOrigin, MemoryStorage, Storage};
pub use cache::ListCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use file::FileStorage;
pub use notify::{ChangeEvent, ChangeNotifier, ChangeOrigin, EventBus};
pub use policy::{CachePolicy, OnDuplicate, OnOverflow};
