//! Configuration section definitions.
//!
//! Each module corresponds to a section in `themedev.toml`:
//!
//! | Module      | TOML Section          | Purpose                          |
//! |-------------|-----------------------|----------------------------------|
//! | `store`     | `[store]`             | Store domain and dev theme       |
//! | `auth`      | `[auth]`              | Where tokens come from           |
//! | `sync`      | `[sync]`, `[watch]`   | Polling, filters, watcher timing |
//! | `serve`     | `[serve]`             | Preview and live reload ports    |
//! | `app`       | `[app]`               | App payload and draft endpoint   |
//! | `extension` | `[[extensions]]`      | Extensions pushed as drafts      |

mod app;
mod auth;
mod extension;
mod serve;
mod store;
mod sync;

pub use app::AppConfig;
pub use auth::AuthConfig;
pub use extension::{ExtensionConfig, ExtensionKind};
pub use serve::ServeConfig;
pub use store::StoreConfig;
pub use sync::{SyncConfig, WatchConfig};
