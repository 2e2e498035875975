use std::sync::Arc;

use emblem_core::{resolve_member_permissions, Id, Member, Permissions};

use crate::errors::AccessError;
use crate::store::{GuildStateCache, MemberFetchError, MemberSource};

/// Bits that qualify a principal as "having access" for service gating.
pub const ACCESS_PERMISSIONS: Permissions =
    Permissions::MANAGE_WEBHOOKS.union(Permissions::ADMINISTRATOR);

/// Resolved permissions for one (channel, user) pair. Computed per request
/// and discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelAccess {
    pub user_permissions: Permissions,
    pub bot_permissions: Permissions,
}

impl ChannelAccess {
    #[must_use]
    pub fn user_access(&self) -> bool {
        self.user_permissions.intersects(ACCESS_PERMISSIONS)
    }

    #[must_use]
    pub fn bot_access(&self) -> bool {
        self.bot_permissions.intersects(ACCESS_PERMISSIONS)
    }
}

/// Guild-level reachability: whether at least one channel qualifies for the
/// user, and at least one for the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuildAccess {
    pub has_channel_with_user_access: bool,
    pub has_channel_with_bot_access: bool,
}

/// Evaluates access questions against injected read-only collaborators.
pub struct AccessEvaluator {
    cache: Arc<dyn GuildStateCache>,
    members: Arc<dyn MemberSource>,
    bot_user_id: Id,
}

impl AccessEvaluator {
    #[must_use]
    pub fn new(
        cache: Arc<dyn GuildStateCache>,
        members: Arc<dyn MemberSource>,
        bot_user_id: Id,
    ) -> Self {
        Self {
            cache,
            members,
            bot_user_id,
        }
    }

    /// Scans the guild's channels until both the user side and the bot side
    /// have a qualifying channel, computing each side only while it is still
    /// unsatisfied. An unknown guild is "no access", not an error.
    ///
    /// # Errors
    /// Propagates member-fetch transport failures.
    pub async fn guild_access_for_user(
        &self,
        user_id: Id,
        guild_id: Id,
    ) -> Result<GuildAccess, AccessError> {
        let mut res = GuildAccess::default();

        let Some(guild) = self.cache.guild(guild_id) else {
            return Ok(res);
        };

        if guild.owner_id == user_id {
            res.has_channel_with_user_access = true;
        }

        for channel in self.cache.channels_for_guild(guild_id) {
            if !res.has_channel_with_user_access {
                let permissions = self.channel_permissions(user_id, channel.id).await?;
                if permissions.intersects(ACCESS_PERMISSIONS) {
                    res.has_channel_with_user_access = true;
                }
            }

            if !res.has_channel_with_bot_access {
                let permissions = self.channel_permissions(self.bot_user_id, channel.id).await?;
                if permissions.intersects(ACCESS_PERMISSIONS) {
                    res.has_channel_with_bot_access = true;
                }
            }

            if res.has_channel_with_user_access && res.has_channel_with_bot_access {
                break;
            }
        }

        Ok(res)
    }

    /// Resolves the user's and the bot's permissions in one channel. The bot
    /// side is computed first; when the bot resolves to zero permissions the
    /// user side is skipped entirely, avoiding a member fetch for a request
    /// that will be rejected regardless.
    ///
    /// # Errors
    /// Propagates member-fetch transport failures. An unknown member is zero
    /// permissions, not an error.
    pub async fn channel_access_for_user(
        &self,
        user_id: Id,
        channel_id: Id,
    ) -> Result<ChannelAccess, AccessError> {
        let mut res = ChannelAccess::default();

        let bot_permissions = self.channel_permissions(self.bot_user_id, channel_id).await?;
        if bot_permissions.is_empty() {
            return Ok(res);
        }
        res.bot_permissions = bot_permissions;

        res.user_permissions = self.channel_permissions(user_id, channel_id).await?;

        Ok(res)
    }

    /// Guard for guild-scoped request handlers. The bot side is checked
    /// first so the caller can distinguish "invite or configure the bot"
    /// from "you personally lack permission".
    ///
    /// # Errors
    /// [`AccessError::BotMissingGuildAccess`] or
    /// [`AccessError::UserMissingGuildAccess`] on denial; member-fetch
    /// transport failures propagate.
    pub async fn require_guild_access(
        &self,
        user_id: Id,
        guild_id: Id,
    ) -> Result<GuildAccess, AccessError> {
        let access = self.guild_access_for_user(user_id, guild_id).await?;

        if !access.has_channel_with_bot_access {
            return Err(AccessError::BotMissingGuildAccess);
        }
        if !access.has_channel_with_user_access {
            return Err(AccessError::UserMissingGuildAccess);
        }

        Ok(access)
    }

    /// Guard for channel-scoped request handlers; bot side first, as above.
    ///
    /// # Errors
    /// [`AccessError::BotMissingChannelAccess`] or
    /// [`AccessError::UserMissingChannelAccess`] on denial; member-fetch
    /// transport failures propagate.
    pub async fn require_channel_access(
        &self,
        user_id: Id,
        channel_id: Id,
    ) -> Result<ChannelAccess, AccessError> {
        let access = self.channel_access_for_user(user_id, channel_id).await?;

        if !access.bot_access() {
            return Err(AccessError::BotMissingChannelAccess);
        }
        if !access.user_access() {
            return Err(AccessError::UserMissingChannelAccess);
        }

        Ok(access)
    }

    /// Read-through member lookup: the cached entry when present, else the
    /// network fetch.
    ///
    /// # Errors
    /// Whatever the fetch reports, including
    /// [`MemberFetchError::UnknownMember`].
    pub async fn guild_member(
        &self,
        guild_id: Id,
        user_id: Id,
    ) -> Result<Member, MemberFetchError> {
        if let Some(member) = self.members.cached_member(guild_id, user_id) {
            return Ok(member);
        }

        tracing::debug!(event = "access.member_fetch", %guild_id, %user_id);
        self.members.fetch_member(guild_id, user_id).await
    }

    /// One principal's effective permissions in one channel, with unknown
    /// member folded into zero permissions.
    async fn channel_permissions(
        &self,
        user_id: Id,
        channel_id: Id,
    ) -> Result<Permissions, AccessError> {
        match self.resolve_channel_permissions(user_id, channel_id).await {
            Ok(permissions) => Ok(permissions),
            Err(MemberFetchError::UnknownMember) => Ok(Permissions::empty()),
            Err(err) => Err(AccessError::MemberFetch(err)),
        }
    }

    async fn resolve_channel_permissions(
        &self,
        user_id: Id,
        channel_id: Id,
    ) -> Result<Permissions, MemberFetchError> {
        let Some(channel) = self.cache.channel(channel_id) else {
            return Ok(Permissions::empty());
        };
        let Some(guild) = self.cache.guild(channel.guild_id) else {
            return Ok(Permissions::empty());
        };

        // Owner short-circuit before the member lookup; the owner's roles
        // are irrelevant and the fetch would be wasted.
        if guild.owner_id == user_id {
            return Ok(Permissions::all());
        }

        let roles = self.cache.roles_for_guild(guild.id);
        let member = self.guild_member(guild.id, user_id).await?;

        Ok(resolve_member_permissions(
            &guild,
            &roles,
            Some(&channel),
            user_id,
            &member.role_ids,
        ))
    }
}
