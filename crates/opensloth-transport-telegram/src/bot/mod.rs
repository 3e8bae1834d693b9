/// Command and message handlers
pub mod handlers;
/// Reply formatting and delivery
pub mod messaging;
/// Telegram API calls with retry
pub mod resilient;
/// Unauthorized access flood protection
pub mod unauthorized_cache;

pub use unauthorized_cache::UnauthorizedCache;
