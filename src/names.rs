//! Workspace name codec.
//!
//! i3 has no grouping primitive, so all group metadata is stored inside the
//! workspace name itself.  A stored ("raw") name has the shape:
//!
//! ```text
//! global_number[:identity]
//! ```
//!
//! where `global_number` is the hidden ordering key (i3 derives the
//! workspace's numeric sort position from the leading integer, and status
//! bars hide it with `strip_workspace_numbers`), and `identity` encodes the
//! user-visible `(group, static_name, local_number)` triple:
//!
//! ```text
//! ""                    default group, nothing set
//! "mail"                default group, static name
//! "4"                   default group, local number
//! ":mail:4"             default group, static name and local number
//! "work:"               group only
//! "work:mail"           group and static name
//! "work:4"              group and local number
//! "work:mail:4"         group, static name and local number
//! ```
//!
//! A group name never starts with a digit, so a leading integer field is
//! always a `local_number` or the `global_number` prefix.  A leading token
//! is a group exactly when a later field follows it, which is why the
//! group-only form carries a trailing empty field and the default-group
//! name-and-number form an empty leading one.  This keeps the codec
//! injective: `"work:4"` is always group `work`, number `4`.
//!
//! The delimited representation lives in this module only; everything else
//! works with [`WorkspaceIdentity`].

use std::fmt;

/// Number of outputs a single ordering-key space can hold.
pub const MAX_OUTPUTS: usize = 10;
/// Groups per output; one output owns a block of
/// `MAX_GROUPS_PER_OUTPUT * MAX_WORKSPACES_PER_GROUP` ordering keys.
pub const MAX_GROUPS_PER_OUTPUT: i64 = 100;
/// Workspaces per group; valid local numbers are `1..MAX_WORKSPACES_PER_GROUP`.
pub const MAX_WORKSPACES_PER_GROUP: i64 = 100;

/// The structured identity of a workspace, independent of its hidden
/// ordering key.
///
/// The empty `group` is the *default group*: workspaces that were never
/// assigned anywhere.  It is encoded with no group prefix at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceIdentity {
    pub group: String,
    pub static_name: String,
    pub local_number: Option<u8>,
}

impl WorkspaceIdentity {
    /// Identity with only a group set.
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    /// Identity of a numbered workspace in `group` with no static name.
    pub fn numbered(group: impl Into<String>, local_number: u8) -> Self {
        Self {
            group: group.into(),
            static_name: String::new(),
            local_number: Some(local_number),
        }
    }
}

impl fmt::Display for WorkspaceIdentity {
    /// Lossy human-readable form (used in log messages only, not the codec).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(group: {:?}, name: {:?}, number: {:?})",
            self.group, self.static_name, self.local_number
        )
    }
}

/// Errors for identities and rename patterns that cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("group name cannot contain a colon: {0:?}")]
    GroupContainsColon(String),
    #[error("group name cannot start with a digit: {0:?}")]
    GroupStartsWithDigit(String),
    #[error("workspace name cannot contain a colon: {0:?}")]
    NameContainsColon(String),
    #[error("workspace name cannot be a bare number: {0:?}")]
    NumericName(String),
    #[error("workspace number must be between 1 and 99, got {0}")]
    NumberOutOfRange(u32),
    #[error("invalid workspace number: {0:?}")]
    InvalidNumber(String),
    #[error("name pattern cannot contain more than 3 fields")]
    TooManyFields,
    #[error("rename would produce an empty workspace name")]
    EmptyName,
}

/// Check that `group` is usable as a group field.  The empty string (the
/// default group) is valid.
pub fn validate_group(group: &str) -> Result<(), ValidationError> {
    if group.contains(':') {
        return Err(ValidationError::GroupContainsColon(group.to_string()));
    }
    if group.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return Err(ValidationError::GroupStartsWithDigit(group.to_string()));
    }
    Ok(())
}

/// Check that `name` is usable as a static-name field.  The empty string
/// (no static name) is valid.
pub fn validate_static_name(name: &str) -> Result<(), ValidationError> {
    if name.contains(':') {
        return Err(ValidationError::NameContainsColon(name.to_string()));
    }
    if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
        // A purely numeric static name would read back as a local number.
        return Err(ValidationError::NumericName(name.to_string()));
    }
    Ok(())
}

fn validate_local_number(number: u8) -> Result<(), ValidationError> {
    if number == 0 || i64::from(number) >= MAX_WORKSPACES_PER_GROUP {
        return Err(ValidationError::NumberOutOfRange(u32::from(number)));
    }
    Ok(())
}

/// Encode an identity into its delimited form.
///
/// Fails with [`ValidationError`] on identities the codec cannot represent
/// reversibly; never mutates anything.
pub fn encode(identity: &WorkspaceIdentity) -> Result<String, ValidationError> {
    validate_group(&identity.group)?;
    validate_static_name(&identity.static_name)?;
    if let Some(n) = identity.local_number {
        validate_local_number(n)?;
    }
    let group = identity.group.as_str();
    let name = identity.static_name.as_str();
    Ok(match (group.is_empty(), name.is_empty(), identity.local_number) {
        (true, true, None) => String::new(),
        (true, false, None) => name.to_string(),
        (true, true, Some(n)) => n.to_string(),
        // Empty leading group field; see the module docs.
        (true, false, Some(n)) => format!(":{}:{}", name, n),
        // Trailing empty field marks the lone token as a group.
        (false, true, None) => format!("{}:", group),
        (false, false, None) => format!("{}:{}", group, name),
        (false, true, Some(n)) => format!("{}:{}", group, n),
        (false, false, Some(n)) => format!("{}:{}:{}", group, name, n),
    })
}

/// Parse a field as a local number, accepting only the canonical range.
fn parse_local_number(field: &str) -> Option<u8> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u8 = field.parse().ok()?;
    validate_local_number(n).ok().map(|_| n)
}

fn is_group_field(field: &str) -> bool {
    validate_group(field).is_ok() && !field.is_empty()
}

/// Replace the delimiter so the result reads back as a plain static name.
fn sanitize_fallback(raw: &str) -> String {
    let sanitized = raw.replace(':', "%");
    if !sanitized.is_empty() && sanitized.bytes().all(|b| b.is_ascii_digit()) {
        // A numeric name would read back as a number.
        return format!("%{}", sanitized);
    }
    sanitized
}

/// Decode the identity part of a workspace name.
///
/// Total: names that do not fit the recognized forms (user-typed names with
/// stray colons, out-of-range numbers, …) decode to a whole-name static
/// name with the delimiter sanitized, never to an error.  The inverse law
/// `decode(encode(x)) == x` holds for every identity `encode` accepts.
pub fn decode(raw: &str) -> WorkspaceIdentity {
    if raw.is_empty() {
        return WorkspaceIdentity::default();
    }
    let fields: Vec<&str> = raw.split(':').collect();
    let recognized = match fields.as_slice() {
        [field] => match parse_local_number(field) {
            Some(n) => Some(WorkspaceIdentity::numbered("", n)),
            None if validate_static_name(field).is_ok() => Some(WorkspaceIdentity {
                static_name: field.to_string(),
                ..WorkspaceIdentity::default()
            }),
            None => None,
        },
        [group, second] if is_group_field(group) => {
            if second.is_empty() {
                Some(WorkspaceIdentity::group(*group))
            } else if let Some(n) = parse_local_number(second) {
                Some(WorkspaceIdentity::numbered(*group, n))
            } else if validate_static_name(second).is_ok() {
                Some(WorkspaceIdentity {
                    group: group.to_string(),
                    static_name: second.to_string(),
                    local_number: None,
                })
            } else {
                None
            }
        }
        [group, name, number] if validate_group(group).is_ok() => {
            match parse_local_number(number) {
                Some(n) if validate_static_name(name).is_ok() => Some(WorkspaceIdentity {
                    group: group.to_string(),
                    static_name: name.to_string(),
                    local_number: Some(n),
                }),
                _ => None,
            }
        }
        _ => None,
    };
    recognized.unwrap_or_else(|| WorkspaceIdentity {
        static_name: sanitize_fallback(raw),
        ..WorkspaceIdentity::default()
    })
}

//  Raw (stored) names

/// A parsed stored workspace name: the hidden ordering key plus the
/// decoded identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawName {
    pub global_number: Option<i64>,
    pub identity: WorkspaceIdentity,
}

impl RawName {
    /// The user-facing workspace number: the explicit `local_number` if the
    /// name carries one, otherwise derived from the ordering key's offset
    /// within its group block.
    pub fn local_number(&self) -> Option<u8> {
        self.identity.local_number.or_else(|| {
            self.global_number.and_then(|g| {
                match g.rem_euclid(MAX_WORKSPACES_PER_GROUP) {
                    0 => None,
                    n => Some(n as u8),
                }
            })
        })
    }
}

fn parse_global_field(field: &str) -> Option<i64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Parse a stored workspace name into ordering key and identity.  Total;
/// a name this tool never organized simply has no `global_number`.
pub fn parse_raw(name: &str) -> RawName {
    match name.split_once(':') {
        None => match parse_global_field(name) {
            Some(global) => RawName {
                global_number: Some(global),
                identity: WorkspaceIdentity::default(),
            },
            None => RawName {
                global_number: None,
                identity: decode(name),
            },
        },
        Some((first, rest)) => match parse_global_field(first) {
            Some(global) => RawName {
                global_number: Some(global),
                identity: decode(rest),
            },
            None => RawName {
                global_number: None,
                identity: decode(name),
            },
        },
    }
}

/// Compose a stored workspace name from an ordering key and an identity.
pub fn compose_raw(
    global_number: Option<i64>,
    identity: &WorkspaceIdentity,
) -> Result<String, ValidationError> {
    let encoded = encode(identity)?;
    Ok(match (global_number, encoded.is_empty()) {
        (Some(global), true) => global.to_string(),
        (Some(global), false) => format!("{}:{}", global, encoded),
        (None, false) => encoded,
        (None, true) => return Err(ValidationError::EmptyName),
    })
}

//  Ordering-key packing

/// Pack `(output, group rank, local number)` into a global ordering key.
///
/// Each output owns a disjoint block so the window manager's merged global
/// list never interleaves outputs; within a block, the group's current rank
/// is the high digits and the local number the low digits.
pub fn compute_global_number(output_index: usize, group_rank: usize, local_number: u8) -> i64 {
    debug_assert!((group_rank as i64) < MAX_GROUPS_PER_OUTPUT);
    debug_assert!(i64::from(local_number) < MAX_WORKSPACES_PER_GROUP);
    let block = MAX_GROUPS_PER_OUTPUT * MAX_WORKSPACES_PER_GROUP;
    output_index as i64 * block + group_rank as i64 * MAX_WORKSPACES_PER_GROUP
        + i64::from(local_number)
}

/// Recover the group rank encoded in a global ordering key.
pub fn global_number_to_group_rank(global_number: i64) -> usize {
    let block = MAX_GROUPS_PER_OUTPUT * MAX_WORKSPACES_PER_GROUP;
    (global_number.rem_euclid(block) / MAX_WORKSPACES_PER_GROUP) as usize
}

//  Partial updates (rename patterns)

/// One field of a partial identity update.
///
/// `Keep` leaves the current value, `Reset` clears it (the `-` convention),
/// `Set` replaces it.  This distinction exists only for explicit rename
/// operations; it plays no part in decoding live names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Reset,
    Set(T),
}

/// A partial update of a workspace identity, as given by `rename-workspace`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityUpdate {
    pub group: FieldUpdate<String>,
    pub static_name: FieldUpdate<String>,
    pub local_number: FieldUpdate<u8>,
}

fn string_update(field: Option<&str>) -> FieldUpdate<String> {
    match field {
        None | Some("") => FieldUpdate::Keep,
        Some("-") => FieldUpdate::Reset,
        Some(value) => FieldUpdate::Set(value.to_string()),
    }
}

fn number_update(field: Option<&str>) -> Result<FieldUpdate<u8>, ValidationError> {
    match field {
        None | Some("") => Ok(FieldUpdate::Keep),
        Some("-") => Ok(FieldUpdate::Reset),
        Some(value) => {
            let n: u32 = value
                .parse()
                .map_err(|_| ValidationError::InvalidNumber(value.to_string()))?;
            if n == 0 || i64::from(n) >= MAX_WORKSPACES_PER_GROUP {
                return Err(ValidationError::NumberOutOfRange(n));
            }
            Ok(FieldUpdate::Set(n as u8))
        }
    }
}

impl IdentityUpdate {
    /// Parse a colon-delimited rename pattern `[group][:name][:number]`.
    ///
    /// An empty field keeps the current value, `-` resets it.
    pub fn parse_pattern(pattern: &str) -> Result<Self, ValidationError> {
        let fields: Vec<&str> = pattern.split(':').collect();
        if fields.len() > 3 {
            return Err(ValidationError::TooManyFields);
        }
        Ok(Self {
            group: string_update(fields.first().copied()),
            static_name: string_update(fields.get(1).copied()),
            local_number: number_update(fields.get(2).copied())?,
        })
    }

    /// Build an update from the individual `--group` / `--name` / `--number`
    /// arguments.
    pub fn from_args(
        group: Option<&str>,
        name: Option<&str>,
        number: Option<&str>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            group: string_update(group),
            static_name: string_update(name),
            local_number: number_update(number)?,
        })
    }

    /// Whether this update changes nothing.
    pub fn is_noop(&self) -> bool {
        self.group == FieldUpdate::Keep
            && self.static_name == FieldUpdate::Keep
            && self.local_number == FieldUpdate::Keep
    }

    /// Apply the update to `current`.  The result is validated by the
    /// caller via [`encode`] before any rename is issued.
    pub fn apply(&self, current: &WorkspaceIdentity) -> WorkspaceIdentity {
        WorkspaceIdentity {
            group: match &self.group {
                FieldUpdate::Keep => current.group.clone(),
                FieldUpdate::Reset => String::new(),
                FieldUpdate::Set(value) => value.clone(),
            },
            static_name: match &self.static_name {
                FieldUpdate::Keep => current.static_name.clone(),
                FieldUpdate::Reset => String::new(),
                FieldUpdate::Set(value) => value.clone(),
            },
            local_number: match self.local_number {
                FieldUpdate::Keep => current.local_number,
                FieldUpdate::Reset => None,
                FieldUpdate::Set(value) => Some(value),
            },
        }
    }
}

//  Tests
