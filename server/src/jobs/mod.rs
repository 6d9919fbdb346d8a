//! Background workers (§4.4 ambient lifecycle): periodic `tokio::spawn` +
//! `interval` loops, one file per concern, following the teacher's
//! `jobs::key_package_cleanup`/`jobs::data_compaction` layout.

pub mod credential_refresh;
pub mod identity_cache_cleanup;
pub mod unfurl_cache_cleanup;

pub use credential_refresh::run_credential_refresh_worker;
pub use identity_cache_cleanup::run_identity_cache_cleanup_worker;
pub use unfurl_cache_cleanup::run_unfurl_cache_cleanup_worker;
