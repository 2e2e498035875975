use emblem_core::{Id, SavedMessageId};

use crate::store::{MemberFetchError, SavedMessageStoreError};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("the bot doesn't have access to this guild")]
    BotMissingGuildAccess,
    #[error("you don't have access to this guild")]
    UserMissingGuildAccess,
    #[error("the bot doesn't have access to this channel")]
    BotMissingChannelAccess,
    #[error("you don't have access to this channel")]
    UserMissingChannelAccess,
    #[error(transparent)]
    MemberFetch(#[from] MemberFetchError),
}

impl AccessError {
    /// Stable client-facing error code. Bot-side denials are distinct from
    /// user-side denials so operators can tell "invite or configure the bot"
    /// apart from "you personally lack permission".
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BotMissingGuildAccess | Self::BotMissingChannelAccess => "bot_missing_access",
            Self::UserMissingGuildAccess | Self::UserMissingChannelAccess => "missing_access",
            Self::MemberFetch(_) => "internal_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("channel {channel_id} not found")]
    UnknownChannel { channel_id: Id },
    #[error("channel {channel_id} does not belong to guild {guild_id}")]
    ChannelGuildMismatch { channel_id: Id, guild_id: Id },
    #[error("guild {guild_id} not found")]
    UnknownGuild { guild_id: Id },
    #[error("you have no access to the channel {channel_id}")]
    ChannelAccessDenied { channel_id: Id },
    #[error("you have no permission to manage roles here")]
    ManageRolesDenied,
    #[error("invalid role id: {target_id}")]
    InvalidRoleId { target_id: String },
    #[error("role {role_id} does not exist")]
    UnknownRole { role_id: Id },
    #[error("you can not assign the role {role_id}")]
    RoleNotAssignable { role_id: Id },
    #[error("invalid saved message id: {target_id}")]
    InvalidSavedMessageId { target_id: String },
    #[error("saved message {message_id} does not exist or belongs to a different server")]
    UnknownSavedMessage { message_id: SavedMessageId },
    #[error("saved message {message_id} has a malformed payload")]
    MalformedSavedMessage { message_id: SavedMessageId },
    #[error("you can't nest more than 5 saved messages with actions")]
    NestingTooDeep,
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    MemberFetch(#[from] MemberFetchError),
    #[error(transparent)]
    SavedMessageStore(#[from] SavedMessageStoreError),
}

#[cfg(test)]
mod tests {
    use super::AccessError;
    use crate::store::MemberFetchError;

    #[test]
    fn denial_codes_distinguish_bot_from_user() {
        assert_eq!(AccessError::BotMissingGuildAccess.code(), "bot_missing_access");
        assert_eq!(
            AccessError::BotMissingChannelAccess.code(),
            "bot_missing_access"
        );
        assert_eq!(AccessError::UserMissingGuildAccess.code(), "missing_access");
        assert_eq!(
            AccessError::UserMissingChannelAccess.code(),
            "missing_access"
        );
        assert_eq!(
            AccessError::MemberFetch(MemberFetchError::UnknownMember).code(),
            "internal_error"
        );
    }
}
