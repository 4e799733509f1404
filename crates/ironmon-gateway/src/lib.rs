pub mod error;
pub mod fallback;
pub mod http;
pub mod memory;
pub mod reconcile;
pub mod record;
pub mod store;

pub use error::{GatewayError, Result};
pub use fallback::{fallback_cache, fallback_devices};
pub use http::HttpRemoteStore;
pub use memory::InMemoryRemoteStore;
pub use reconcile::{reconcile, ConnectivityStatus, ReconcileOutcome, Severity, SyncGateway, SyncMode};
pub use record::{RecordPatch, RemoteRecord};
pub use store::RemoteStore;
