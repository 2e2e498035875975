#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "emblem"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("snowflake id is invalid")]
    InvalidSnowflake,
    #[error("permission bits are invalid")]
    InvalidPermissionBits,
    #[error("saved message id is invalid")]
    InvalidSavedMessageId,
}

/// Platform snowflake identifier. Carried as a decimal string on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(u64);

impl Id {
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl TryFrom<String> for Id {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = value.parse().map_err(|_| DomainError::InvalidSnowflake)?;
        Ok(Self(parsed))
    }
}

impl From<Id> for String {
    fn from(value: Id) -> Self {
        value.0.to_string()
    }
}

impl core::fmt::Display for Id {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a saved message owned by this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SavedMessageId(Ulid);

impl SavedMessageId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl TryFrom<String> for SavedMessageId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed =
            Ulid::from_string(&value).map_err(|_| DomainError::InvalidSavedMessageId)?;
        Ok(Self(parsed))
    }
}

impl From<SavedMessageId> for String {
    fn from(value: SavedMessageId) -> Self {
        value.0.to_string()
    }
}

impl core::fmt::Display for SavedMessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Permission bitmask using the platform's published bit positions.
/// Serialized as a decimal string, the platform's convention for permission
/// sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permissions(u64);

impl Permissions {
    pub const CREATE_INSTANT_INVITE: Self = Self(1 << 0);
    pub const KICK_MEMBERS: Self = Self(1 << 1);
    pub const BAN_MEMBERS: Self = Self(1 << 2);
    pub const ADMINISTRATOR: Self = Self(1 << 3);
    pub const MANAGE_CHANNELS: Self = Self(1 << 4);
    pub const MANAGE_GUILD: Self = Self(1 << 5);
    pub const ADD_REACTIONS: Self = Self(1 << 6);
    pub const VIEW_AUDIT_LOG: Self = Self(1 << 7);
    pub const VIEW_CHANNEL: Self = Self(1 << 10);
    pub const SEND_MESSAGES: Self = Self(1 << 11);
    pub const MANAGE_MESSAGES: Self = Self(1 << 13);
    pub const EMBED_LINKS: Self = Self(1 << 14);
    pub const ATTACH_FILES: Self = Self(1 << 15);
    pub const READ_MESSAGE_HISTORY: Self = Self(1 << 16);
    pub const MENTION_EVERYONE: Self = Self(1 << 17);
    pub const USE_EXTERNAL_EMOJIS: Self = Self(1 << 18);
    pub const MANAGE_ROLES: Self = Self(1 << 28);
    pub const MANAGE_WEBHOOKS: Self = Self(1 << 29);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Union of every named permission bit.
    #[must_use]
    pub const fn all() -> Self {
        Self::CREATE_INSTANT_INVITE
            .union(Self::KICK_MEMBERS)
            .union(Self::BAN_MEMBERS)
            .union(Self::ADMINISTRATOR)
            .union(Self::MANAGE_CHANNELS)
            .union(Self::MANAGE_GUILD)
            .union(Self::ADD_REACTIONS)
            .union(Self::VIEW_AUDIT_LOG)
            .union(Self::VIEW_CHANNEL)
            .union(Self::SEND_MESSAGES)
            .union(Self::MANAGE_MESSAGES)
            .union(Self::EMBED_LINKS)
            .union(Self::ATTACH_FILES)
            .union(Self::READ_MESSAGE_HISTORY)
            .union(Self::MENTION_EVERYONE)
            .union(Self::USE_EXTERNAL_EMOJIS)
            .union(Self::MANAGE_ROLES)
            .union(Self::MANAGE_WEBHOOKS)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any bit in `other` is set.
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl BitAndAssign for Permissions {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl Not for Permissions {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl TryFrom<String> for Permissions {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bits = value
            .parse()
            .map_err(|_| DomainError::InvalidPermissionBits)?;
        Ok(Self(bits))
    }
}

impl From<Permissions> for String {
    fn from(value: Permissions) -> Self {
        value.0.to_string()
    }
}

/// Synced guild snapshot. The guild's role list always contains exactly one
/// role whose id equals the guild id: the implicit "everyone" role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Id,
    pub owner_id: Id,
}

/// Roles are ordered by `position` only; equal position is not higher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Id,
    pub permissions: Permissions,
    pub position: i32,
    #[serde(default)]
    pub managed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverwriteKind {
    Role,
    Member,
}

/// Channel-level allow/deny pair scoped to a role or a specific member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOverwrite {
    pub kind: OverwriteKind,
    pub id: Id,
    pub allow: Permissions,
    pub deny: Permissions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Id,
    pub guild_id: Id,
    #[serde(default)]
    pub permission_overwrites: Vec<PermissionOverwrite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: Id,
    #[serde(default)]
    pub role_ids: Vec<Id>,
}

/// Computes a member's effective permissions in a guild, replicating the
/// platform's layering: everyone-role base, member-role union, Administrator
/// short-circuit, then channel overwrites (everyone, merged role, member)
/// when a channel is given. The guild owner holds every permission
/// unconditionally.
#[must_use]
pub fn resolve_member_permissions(
    guild: &Guild,
    roles: &[Role],
    channel: Option<&Channel>,
    user_id: Id,
    member_role_ids: &[Id],
) -> Permissions {
    if user_id == guild.owner_id {
        return Permissions::all();
    }

    let mut permissions = Permissions::empty();
    for role in roles {
        if role.id == guild.id {
            permissions |= role.permissions;
            break;
        }
    }

    for role in roles {
        if member_role_ids.contains(&role.id) {
            permissions |= role.permissions;
        }
    }

    if permissions.contains(Permissions::ADMINISTRATOR) {
        // Administrator bypasses channel overwrites entirely.
        return Permissions::all();
    }

    let Some(channel) = channel else {
        return permissions;
    };

    for overwrite in &channel.permission_overwrites {
        if overwrite.kind == OverwriteKind::Role && overwrite.id == guild.id {
            permissions = (permissions & !overwrite.deny) | overwrite.allow;
            break;
        }
    }

    // All matching role overwrites merge before being applied: a deny from
    // one held role cannot be undone by an allow from another at this layer.
    let mut denies = Permissions::empty();
    let mut allows = Permissions::empty();
    for overwrite in &channel.permission_overwrites {
        if overwrite.kind == OverwriteKind::Role && member_role_ids.contains(&overwrite.id) {
            denies |= overwrite.deny;
            allows |= overwrite.allow;
        }
    }
    permissions = (permissions & !denies) | allows;

    for overwrite in &channel.permission_overwrites {
        if overwrite.kind == OverwriteKind::Member && overwrite.id == user_id {
            permissions = (permissions & !overwrite.deny) | overwrite.allow;
            break;
        }
    }

    // An overwrite can never take Administrator away.
    if permissions.contains(Permissions::ADMINISTRATOR) {
        permissions |= Permissions::all();
    }

    permissions
}

/// Position of the member's most senior role, starting from the everyone
/// role's position and raised only by assigned roles strictly above it.
#[must_use]
pub fn member_highest_role_position(guild: &Guild, roles: &[Role], member_role_ids: &[Id]) -> i32 {
    let mut highest = 0;
    for role in roles {
        if role.id == guild.id {
            highest = role.position;
            break;
        }
    }

    for role in roles {
        if role.position > highest && member_role_ids.contains(&role.id) {
            highest = role.position;
        }
    }

    highest
}

/// Every role strictly below the given position, in snapshot order.
#[must_use]
pub fn manageable_role_ids(roles: &[Role], highest_position: i32) -> Vec<Id> {
    roles
        .iter()
        .filter(|role| role.position < highest_position)
        .map(|role| role.id)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TextResponse,
    ToggleRole,
    AddRole,
    RemoveRole,
    SavedMessageResponse,
    TextDm,
    SavedMessageDm,
    TextEdit,
    SavedMessageEdit,
    PermissionCheck,
}

impl ActionKind {
    /// Action kinds that grant or remove a role when they fire.
    #[must_use]
    pub const fn manages_roles(self) -> bool {
        matches!(self, Self::ToggleRole | Self::AddRole | Self::RemoveRole)
    }

    /// Action kinds that resolve a saved message and run its own actions.
    #[must_use]
    pub const fn triggers_saved_message(self) -> bool {
        matches!(
            self,
            Self::SavedMessageResponse | Self::SavedMessageDm | Self::SavedMessageEdit
        )
    }
}

/// One authored effect. `target_id` is a role snowflake for role actions and
/// a saved-message id for saved-message actions; the remaining fields only
/// apply to some kinds and default off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    #[serde(default)]
    pub target_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub allow_role_mentions: bool,
    #[serde(default)]
    pub disable_default_response: bool,
    #[serde(default)]
    pub required_permissions: Permissions,
    #[serde(default)]
    pub required_role_ids: Vec<Id>,
}

/// Actions bound to one interactive component, fired together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSet {
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// The decoded shape of a saved message's stored payload. Formatting fields
/// are handled elsewhere and ignored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithActions {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub actions: HashMap<String, ActionSet>,
}

/// Frozen authorization snapshot recorded when an action set is authored.
/// Execution-time role management consults only this record, never live
/// guild state, so previously authorized automation keeps working for
/// end-users until the action set is re-authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDerivedPermissions {
    pub user_id: Id,
    pub guild_is_owner: bool,
    pub guild_permissions: Permissions,
    #[serde(default)]
    pub channel_permissions: Permissions,
    #[serde(rename = "lower_role_ids", default)]
    pub allowed_role_ids: Vec<Id>,
}

impl ActionDerivedPermissions {
    /// True if the frozen guild-wide bitmask satisfies `permission`. Guild
    /// ownership and a frozen Administrator bit satisfy every check.
    #[must_use]
    pub fn has_guild_permission(&self, permission: Permissions) -> bool {
        self.guild_is_owner
            || self.guild_permissions.contains(Permissions::ADMINISTRATOR)
            || self.guild_permissions.intersects(permission)
    }

    /// True if the frozen channel-scoped bitmask satisfies `permission`.
    #[must_use]
    pub fn has_channel_permission(&self, permission: Permissions) -> bool {
        self.guild_is_owner
            || self.guild_permissions.contains(Permissions::ADMINISTRATOR)
            || self.channel_permissions.intersects(permission)
    }

    /// Whether `role_id` may be granted or removed under this snapshot:
    /// the guild owner always may; anyone else needs Manage Roles in the
    /// frozen guild bitmask and the role in the frozen allowlist.
    #[must_use]
    pub fn can_manage_role(&self, role_id: Id) -> bool {
        if self.guild_is_owner {
            return true;
        }

        self.has_guild_permission(Permissions::MANAGE_ROLES)
            && self.allowed_role_ids.contains(&role_id)
    }
}
