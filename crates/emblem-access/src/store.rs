use async_trait::async_trait;
use emblem_core::{Channel, Guild, Id, Member, Role, SavedMessageId};
use serde::{Deserialize, Serialize};

/// Read-only view of guild state synchronized from the platform gateway.
/// Lookups return owned snapshots; a missing entry is "not found", never an
/// error.
pub trait GuildStateCache: Send + Sync {
    fn guild(&self, guild_id: Id) -> Option<Guild>;

    fn channel(&self, channel_id: Id) -> Option<Channel>;

    /// Channels of a guild in cache iteration order. The order is not
    /// guaranteed by the gateway and callers must not rely on it.
    fn channels_for_guild(&self, guild_id: Id) -> Vec<Channel>;

    fn role(&self, guild_id: Id, role_id: Id) -> Option<Role>;

    fn roles_for_guild(&self, guild_id: Id) -> Vec<Role>;
}

/// Guild members, served from the gateway cache with a REST fallback for
/// members the gateway has not delivered yet.
#[async_trait]
pub trait MemberSource: Send + Sync {
    fn cached_member(&self, guild_id: Id, user_id: Id) -> Option<Member>;

    /// Fetches a member over the network. Blocking and cancellable; bound to
    /// the caller's request context.
    ///
    /// # Errors
    /// [`MemberFetchError::UnknownMember`] when the user is not part of the
    /// guild, [`MemberFetchError::Transport`] for any other failure.
    async fn fetch_member(&self, guild_id: Id, user_id: Id) -> Result<Member, MemberFetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MemberFetchError {
    /// The user is not currently in the guild. A valid zero-permission
    /// outcome, not an infrastructure failure.
    #[error("member is not part of the guild")]
    UnknownMember,
    #[error("member fetch failed: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// A saved message as persisted: its stored JSON payload is kept verbatim
/// and decoded on demand when nested actions are validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedMessage {
    pub id: SavedMessageId,
    pub guild_id: Id,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait SavedMessageStore: Send + Sync {
    /// Looks up a saved message scoped to `guild_id`. A message belonging to
    /// another guild is `None`.
    ///
    /// # Errors
    /// [`SavedMessageStoreError`] on storage failure.
    async fn saved_message_for_guild(
        &self,
        guild_id: Id,
        id: SavedMessageId,
    ) -> Result<Option<SavedMessage>, SavedMessageStoreError>;
}

#[derive(Debug, thiserror::Error)]
#[error("saved message lookup failed: {0}")]
pub struct SavedMessageStoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);
