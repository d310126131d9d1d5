//! Endpoint catalog
//!
//! Commonly used REST endpoints grouped by resource. Templates follow the
//! platform's documented paths relative to the versioned API base URL.

use super::{Method, Route};

// ============================================================================
// Messages
// ============================================================================

pub mod messages {
    use super::{Method, Route};

    pub const GET_MESSAGE: Route =
        Route::new(Method::Get, "channels/{channel_id}/messages/{message_id}");
    pub const GET_MESSAGES: Route = Route::new(Method::Get, "channels/{channel_id}/messages");
    pub const SEND_MESSAGE: Route = Route::new(Method::Post, "channels/{channel_id}/messages");
    pub const EDIT_MESSAGE: Route =
        Route::new(Method::Patch, "channels/{channel_id}/messages/{message_id}");
    pub const DELETE_MESSAGE: Route =
        Route::new(Method::Delete, "channels/{channel_id}/messages/{message_id}");
    pub const BULK_DELETE: Route =
        Route::new(Method::Post, "channels/{channel_id}/messages/bulk-delete");

    /// Add the current user's reaction. Headers on this route are unreliable.
    pub const ADD_REACTION: Route = Route::new(
        Method::Put,
        "channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me",
    );
    pub const REMOVE_REACTION: Route = Route::new(
        Method::Delete,
        "channels/{channel_id}/messages/{message_id}/reactions/{emoji}/{user_id}",
    );
}

// ============================================================================
// Channels
// ============================================================================

pub mod channels {
    use super::{Method, Route};

    pub const GET_CHANNEL: Route = Route::new(Method::Get, "channels/{channel_id}");
    pub const MODIFY_CHANNEL: Route = Route::new(Method::Patch, "channels/{channel_id}");
    pub const DELETE_CHANNEL: Route = Route::new(Method::Delete, "channels/{channel_id}");
    pub const TRIGGER_TYPING: Route = Route::new(Method::Post, "channels/{channel_id}/typing");
}

// ============================================================================
// Guilds
// ============================================================================

pub mod guilds {
    use super::{Method, Route};

    pub const GET_GUILD: Route = Route::new(Method::Get, "guilds/{guild_id}");
    pub const MODIFY_GUILD: Route = Route::new(Method::Patch, "guilds/{guild_id}");
    pub const GET_MEMBERS: Route = Route::new(Method::Get, "guilds/{guild_id}/members");
    pub const KICK_MEMBER: Route =
        Route::new(Method::Delete, "guilds/{guild_id}/members/{user_id}");
    pub const BAN_MEMBER: Route = Route::new(Method::Put, "guilds/{guild_id}/bans/{user_id}");
    pub const UNBAN_MEMBER: Route =
        Route::new(Method::Delete, "guilds/{guild_id}/bans/{user_id}");
    pub const BULK_BAN: Route = Route::new(Method::Post, "guilds/{guild_id}/bulk-ban");
    pub const CREATE_ROLE: Route = Route::new(Method::Post, "guilds/{guild_id}/roles");
    pub const ADD_MEMBER_ROLE: Route = Route::new(
        Method::Put,
        "guilds/{guild_id}/members/{user_id}/roles/{role_id}",
    );
}

// ============================================================================
// Users
// ============================================================================

pub mod users {
    use super::{Method, Route};

    pub const GET_SELF: Route = Route::new(Method::Get, "users/@me");
    pub const GET_USER: Route = Route::new(Method::Get, "users/{user_id}");
    pub const CREATE_DM: Route = Route::new(Method::Post, "users/@me/channels");
}

// ============================================================================
// Webhooks
// ============================================================================

pub mod webhooks {
    use super::{Method, Route};

    pub const EXECUTE_WEBHOOK: Route = Route::new(Method::Post, "webhooks/{webhook_id}/{token}");
}
