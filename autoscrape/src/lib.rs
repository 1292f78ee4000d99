pub mod config;
pub mod dedupe;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod record;
pub mod session;
pub mod store;
pub mod target;

pub use config::Config;
pub use dedupe::dedupe;
pub use error::{Error, FetchError, Result, SelectorError, StorageError};
pub use extract::extract;
pub use fetch::{FetchOptions, Fetcher};
pub use notify::{ChannelOutcome, Delivery, Notifier};
pub use pipeline::{run_all, run_target, RunOptions, TargetReport};
pub use record::Record;
pub use session::Session;
pub use target::{CompiledTarget, Target};
