//! Agent collaborator implementations

mod http_client;
mod offline;

pub use http_client::HttpAgentClient;
pub use offline::OfflineAgentClient;
