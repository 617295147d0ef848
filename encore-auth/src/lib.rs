// Types shared by the listener and the dispatch loop
pub mod common;
pub mod store;

// OAuth coordinator: provider client, completion channel, callback listener
pub mod server;

pub use common::{ChatId, OAuthToken};
pub use server::services::{notification_channel, AuthCompletions, AuthNotifier};
pub use server::Coordinator;
pub use store::{ChatState, SessionStore, StoreError};

// Always exposed: the dispatch loop's tests build on these doubles
pub mod testing;
