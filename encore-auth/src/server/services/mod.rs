pub mod notifier;
pub mod oauth_client;

pub use notifier::{notification_channel, AuthCompletions, AuthNotifier};
pub use oauth_client::{generate_state_token, OAuthError, OAuthProvider, SpotifyOAuthClient};
