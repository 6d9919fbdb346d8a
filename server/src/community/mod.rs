//! Community Lifecycle (§4.3): account provisioning on the PDS, encrypted
//! credential persistence, session renewal, and delegated community-authored
//! writes.

pub mod handle;
pub mod lifecycle;
pub mod pds_client;

pub use handle::resolve_community_handle;
pub use lifecycle::{create_community_record, ensure_fresh_session, provision, LifecycleError, ProvisionRequest};
pub use pds_client::{PdsClient, PdsClientError, ReqwestPdsClient};
