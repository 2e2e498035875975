use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use emblem_core::{
    manageable_role_ids, member_highest_role_position, resolve_member_permissions,
    ActionDerivedPermissions, ActionKind, ActionSet, Id, MessageWithActions, Permissions,
    SavedMessageId,
};

use crate::access::AccessEvaluator;
use crate::errors::ActionError;
use crate::store::{GuildStateCache, SavedMessageStore};

/// Maximum depth of saved-message-trigger chains accepted at authoring time.
/// Bounds validation cost and breaks self-referencing cycles.
pub const MAX_ACTION_NESTING: u8 = 5;

pub struct ActionAuthorizer {
    access: AccessEvaluator,
    cache: Arc<dyn GuildStateCache>,
    saved_messages: Arc<dyn SavedMessageStore>,
}

/// Caller-scoped inputs for one authorization walk, resolved once up front.
#[derive(Debug, Clone, Copy)]
struct AuthorizationContext {
    guild_id: Id,
    caller_is_owner: bool,
    highest_role_position: i32,
    permissions: Permissions,
}

impl ActionAuthorizer {
    #[must_use]
    pub fn new(
        access: AccessEvaluator,
        cache: Arc<dyn GuildStateCache>,
        saved_messages: Arc<dyn SavedMessageStore>,
    ) -> Self {
        Self {
            access,
            cache,
            saved_messages,
        }
    }

    /// Validates every action in every set against the acting user's current
    /// permissions, recursing through saved-message triggers up to
    /// [`MAX_ACTION_NESTING`] levels. The whole tree is accepted or none of
    /// it is.
    ///
    /// # Errors
    /// A descriptive [`ActionError`] naming the first violated rule;
    /// infrastructure failures propagate unchanged.
    pub async fn check_action_sets(
        &self,
        action_sets: &HashMap<String, ActionSet>,
        user_id: Id,
        guild_id: Id,
        channel_id: Option<Id>,
    ) -> Result<(), ActionError> {
        let ctx = self
            .authorization_context(user_id, guild_id, channel_id)
            .await?;

        self.check_nested(ctx, action_sets, 0).await
    }

    /// Computes the frozen snapshot persisted alongside an action set:
    /// ownership, guild-wide permissions, channel permissions when a channel
    /// is given, and the allowlist of every role strictly below the author's
    /// highest role. Never recomputed implicitly; re-authoring replaces it
    /// wholesale.
    ///
    /// # Errors
    /// [`ActionError`] on unknown guild/channel, a channel outside the
    /// guild, or collaborator failure.
    pub async fn derive_permissions(
        &self,
        user_id: Id,
        guild_id: Id,
        channel_id: Option<Id>,
    ) -> Result<ActionDerivedPermissions, ActionError> {
        self.validate_channel(guild_id, channel_id)?;

        let guild = self
            .cache
            .guild(guild_id)
            .ok_or(ActionError::UnknownGuild { guild_id })?;
        let roles = self.cache.roles_for_guild(guild_id);

        let channel_permissions = match channel_id {
            Some(channel_id) => {
                self.access
                    .channel_access_for_user(user_id, channel_id)
                    .await?
                    .user_permissions
            }
            None => Permissions::empty(),
        };

        let member = self.access.guild_member(guild_id, user_id).await?;
        let highest_role_position = member_highest_role_position(&guild, &roles, &member.role_ids);
        let guild_permissions =
            resolve_member_permissions(&guild, &roles, None, user_id, &member.role_ids);

        Ok(ActionDerivedPermissions {
            user_id,
            guild_is_owner: guild.owner_id == user_id,
            guild_permissions,
            channel_permissions,
            allowed_role_ids: manageable_role_ids(&roles, highest_role_position),
        })
    }

    async fn authorization_context(
        &self,
        user_id: Id,
        guild_id: Id,
        channel_id: Option<Id>,
    ) -> Result<AuthorizationContext, ActionError> {
        self.validate_channel(guild_id, channel_id)?;

        let guild = self
            .cache
            .guild(guild_id)
            .ok_or(ActionError::UnknownGuild { guild_id })?;
        let roles = self.cache.roles_for_guild(guild_id);

        let channel_permissions = match channel_id {
            Some(channel_id) => {
                let access = self
                    .access
                    .channel_access_for_user(user_id, channel_id)
                    .await?;
                if !access.user_access() {
                    return Err(ActionError::ChannelAccessDenied { channel_id });
                }
                Some(access.user_permissions)
            }
            None => None,
        };

        let member = self.access.guild_member(guild_id, user_id).await?;
        let highest_role_position = member_highest_role_position(&guild, &roles, &member.role_ids);

        // Channel context narrows the effective permissions; without one the
        // guild-wide resolution applies.
        let permissions = match channel_permissions {
            Some(permissions) => permissions,
            None => resolve_member_permissions(&guild, &roles, None, user_id, &member.role_ids),
        };

        Ok(AuthorizationContext {
            guild_id,
            caller_is_owner: guild.owner_id == user_id,
            highest_role_position,
            permissions,
        })
    }

    fn validate_channel(&self, guild_id: Id, channel_id: Option<Id>) -> Result<(), ActionError> {
        let Some(channel_id) = channel_id else {
            return Ok(());
        };

        let channel = self
            .cache
            .channel(channel_id)
            .ok_or(ActionError::UnknownChannel { channel_id })?;
        if channel.guild_id != guild_id {
            return Err(ActionError::ChannelGuildMismatch {
                channel_id,
                guild_id,
            });
        }

        Ok(())
    }

    fn check_nested<'a>(
        &'a self,
        ctx: AuthorizationContext,
        action_sets: &'a HashMap<String, ActionSet>,
        nesting_level: u8,
    ) -> BoxFuture<'a, Result<(), ActionError>> {
        Box::pin(async move {
            if nesting_level > MAX_ACTION_NESTING {
                return Err(ActionError::NestingTooDeep);
            }

            for action_set in action_sets.values() {
                for action in &action_set.actions {
                    match action.kind {
                        ActionKind::TextResponse
                        | ActionKind::TextDm
                        | ActionKind::TextEdit
                        | ActionKind::PermissionCheck => {}
                        ActionKind::AddRole | ActionKind::RemoveRole | ActionKind::ToggleRole => {
                            self.check_role_action(ctx, &action.target_id)?;
                        }
                        ActionKind::SavedMessageResponse
                        | ActionKind::SavedMessageDm
                        | ActionKind::SavedMessageEdit => {
                            let nested = self
                                .nested_action_sets(ctx.guild_id, &action.target_id)
                                .await?;
                            self.check_nested(ctx, &nested, nesting_level + 1).await?;
                        }
                    }
                }
            }

            Ok(())
        })
    }

    fn check_role_action(
        &self,
        ctx: AuthorizationContext,
        target_id: &str,
    ) -> Result<(), ActionError> {
        if !ctx.permissions.contains(Permissions::MANAGE_ROLES) {
            return Err(ActionError::ManageRolesDenied);
        }

        let role_id =
            Id::try_from(String::from(target_id)).map_err(|_| ActionError::InvalidRoleId {
                target_id: String::from(target_id),
            })?;

        let role = self
            .cache
            .role(ctx.guild_id, role_id)
            .ok_or(ActionError::UnknownRole { role_id })?;

        // The platform's hierarchy rule: a role at or above the caller's
        // highest role can never be assigned, except by the guild owner.
        if !ctx.caller_is_owner && role.position >= ctx.highest_role_position {
            return Err(ActionError::RoleNotAssignable { role_id });
        }

        Ok(())
    }

    async fn nested_action_sets(
        &self,
        guild_id: Id,
        target_id: &str,
    ) -> Result<HashMap<String, ActionSet>, ActionError> {
        let message_id = SavedMessageId::try_from(String::from(target_id)).map_err(|_| {
            ActionError::InvalidSavedMessageId {
                target_id: String::from(target_id),
            }
        })?;

        let saved = self
            .saved_messages
            .saved_message_for_guild(guild_id, message_id)
            .await?
            .ok_or(ActionError::UnknownSavedMessage { message_id })?;

        let data: MessageWithActions = serde_json::from_value(saved.data)
            .map_err(|_| ActionError::MalformedSavedMessage { message_id })?;

        Ok(data.actions)
    }
}
