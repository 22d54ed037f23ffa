pub mod config;
pub mod error;
pub mod hash;
pub mod types;
pub mod url_util;

pub use config::Config;
pub use error::WinescoutError;
pub use hash::{cache_key, content_hash};
pub use types::*;
pub use url_util::{extract_domain, is_document_url, sanitize_url};
