//! The group model and ordering engine.
//!
//! Groups are not stored anywhere: they are a derived partition of the
//! current workspace set by the group field of each workspace's name, and a
//! group's rank on an output is implicit in the numbering of its members.
//! Every function here is a pure mapping from a [`Snapshot`] of the window
//! manager plus a requested operation to a [`Plan`] of renames; no state is
//! retained across calls, so re-applying an already-applied plan is a no-op
//! and the server's strictly sequential dispatch is sufficient for
//! correctness.

use std::collections::BTreeSet;

use log::debug;

use crate::names::{self, ValidationError, WorkspaceIdentity};
use crate::traits::{OutputInfo, WorkspaceInfo};

/// Errors from the ordering engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    NotFound(String),
}

/// How a command resolves the group it operates on when several are live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupContext {
    /// The active group: the group of the lowest-sort-key workspace on the
    /// focused output.
    Active,
    /// The group of the workspace holding input focus.
    Focused,
    /// An explicitly named group.
    Named(String),
}

/// A single rename operation against the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// The computed realization of an operation: renames to apply in order,
/// and optionally a workspace to focus afterwards (always without the
/// window manager's back-and-forth toggle).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub renames: Vec<Rename>,
    pub focus: Option<String>,
}

/// Workspaces grouped by group name, in rank order.
pub type GroupToWorkspaces = Vec<(String, Vec<WorkspaceInfo>)>;

/// The group a workspace belongs to, from its name.
pub fn group_of(workspace: &WorkspaceInfo) -> String {
    names::parse_raw(&workspace.name).identity.group
}

/// The user-facing workspace number, explicit or derived from the
/// ordering key.
pub fn local_number_of(workspace: &WorkspaceInfo) -> Option<u8> {
    names::parse_raw(&workspace.name).local_number()
}

/// The hidden ordering key, preferring the one encoded in the name over
/// the window manager's reported sort key (they agree once organized).
pub fn global_number_of(workspace: &WorkspaceInfo) -> Option<i64> {
    names::parse_raw(&workspace.name)
        .global_number
        .or(workspace.sort_key)
}

/// Partition `workspaces` by group, preserving first-seen order.  With the
/// input in sort-key order this yields the groups in rank order.
pub fn group_by(workspaces: &[WorkspaceInfo]) -> GroupToWorkspaces {
    let mut groups: GroupToWorkspaces = Vec::new();
    for workspace in workspaces {
        let group = group_of(workspace);
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, members)) => members.push(workspace.clone()),
            None => groups.push((group, vec![workspace.clone()])),
        }
    }
    groups
}

//  Snapshot

/// An external snapshot of the window manager's state, fetched at the
/// start of every command and never cached across commands.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Active outputs, ordered top-to-bottom then left-to-right.
    pub outputs: Vec<OutputInfo>,
    /// All live workspaces, ordered by output then sort key.
    pub workspaces: Vec<WorkspaceInfo>,
}

impl Snapshot {
    pub fn new(outputs: Vec<OutputInfo>, mut workspaces: Vec<WorkspaceInfo>) -> Self {
        let mut outputs: Vec<OutputInfo> = outputs.into_iter().filter(|o| o.active).collect();
        outputs.sort_by_key(|o| (o.y, o.x));
        let index_of = |name: &str| -> usize {
            outputs
                .iter()
                .position(|o| o.name == name)
                .unwrap_or(usize::MAX)
        };
        workspaces.sort_by(|a, b| {
            (index_of(&a.output), a.sort_key.unwrap_or(i64::MAX))
                .cmp(&(index_of(&b.output), b.sort_key.unwrap_or(i64::MAX)))
        });
        Self { outputs, workspaces }
    }

    /// Index of the named output in the stable output order.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|o| o.name == name)
    }

    /// The workspace holding input focus.
    pub fn focused(&self) -> Option<&WorkspaceInfo> {
        self.workspaces.iter().find(|w| w.focused)
    }

    /// Name of the output holding input focus.
    pub fn focused_output(&self) -> Result<String, GroupsError> {
        self.focused()
            .map(|w| w.output.clone())
            .ok_or_else(|| GroupsError::NotFound("no focused workspace".to_string()))
    }

    /// Workspaces on the named output, in sort-key order.
    pub fn on_output(&self, output: &str) -> Vec<WorkspaceInfo> {
        self.workspaces
            .iter()
            .filter(|w| w.output == output)
            .cloned()
            .collect()
    }

    /// All members of `group`, across outputs.
    pub fn group_members(&self, group: &str) -> Vec<WorkspaceInfo> {
        self.workspaces
            .iter()
            .filter(|w| group_of(w) == group)
            .cloned()
            .collect()
    }

    /// Workspaces reordered so the focused output's come first; the group
    /// order seen by `list-groups`.
    pub fn ordered_for_listing(&self) -> Vec<WorkspaceInfo> {
        let focused_output = self.focused().map(|w| w.output.clone());
        let mut ordered: Vec<WorkspaceInfo> = Vec::with_capacity(self.workspaces.len());
        if let Some(ref name) = focused_output {
            ordered.extend(self.on_output(name));
        }
        ordered.extend(
            self.workspaces
                .iter()
                .filter(|w| Some(&w.output) != focused_output.as_ref())
                .cloned(),
        );
        ordered
    }

    /// Resolve a group context to a concrete group name.
    pub fn resolve_context(&self, context: &GroupContext) -> Result<String, GroupsError> {
        match context {
            GroupContext::Named(name) => Ok(name.clone()),
            GroupContext::Focused => self
                .focused()
                .map(group_of)
                .ok_or_else(|| GroupsError::NotFound("no focused workspace".to_string())),
            GroupContext::Active => {
                let output = self.focused_output()?;
                self.on_output(&output)
                    .first()
                    .map(group_of)
                    .ok_or_else(|| {
                        GroupsError::NotFound(format!("no workspaces on output {:?}", output))
                    })
            }
        }
    }
}

//  Local-number allocation

/// The lowest `count` local numbers not present in `used`.
fn lowest_free_local_numbers(count: usize, used: &BTreeSet<u8>) -> Vec<u8> {
    (1..names::MAX_WORKSPACES_PER_GROUP as u8)
        .filter(|n| !used.contains(n))
        .take(count)
        .collect()
}

/// Pick local numbers for one group's workspaces on one output.
///
/// `used_elsewhere` holds the numbers taken by the same group on other
/// outputs.  Without `renumber`, existing numbers are kept unless they
/// collide; colliding or numberless workspaces get fresh increasing
/// numbers.  With `renumber`, the whole group is packed into the lowest
/// free numbers.
fn compute_local_numbers(
    members: &[WorkspaceInfo],
    used_elsewhere: &BTreeSet<u8>,
    renumber: bool,
) -> Vec<u8> {
    if renumber {
        return lowest_free_local_numbers(members.len(), used_elsewhere);
    }
    let mut used = used_elsewhere.clone();
    let mut last = used.iter().next_back().copied().unwrap_or(0);
    let mut numbers = Vec::with_capacity(members.len());
    for member in members {
        let number = match local_number_of(member) {
            Some(n) if !used.contains(&n) => n,
            _ => {
                let next = (last + 1..names::MAX_WORKSPACES_PER_GROUP as u8)
                    .find(|n| !used.contains(n))
                    .or_else(|| lowest_free_local_numbers(1, &used).into_iter().next())
                    .unwrap_or(last.saturating_add(1));
                last = next;
                next
            }
        };
        used.insert(number);
        numbers.push(number);
    }
    numbers
}

/// Rank of `group` on an output, derived from the ordering keys of its
/// existing members.  A group with no numbered member gets the next rank
/// after every known group, so new groups land at the end.
fn group_rank_on_output(groups: &GroupToWorkspaces, group: &str) -> usize {
    let rank_of = |members: &[WorkspaceInfo]| {
        members
            .iter()
            .filter_map(global_number_of)
            .map(names::global_number_to_group_rank)
            .next()
    };
    let mut max_rank = None;
    for (name, members) in groups {
        if let Some(rank) = rank_of(members) {
            if name == group {
                return rank;
            }
            max_rank = Some(max_rank.unwrap_or(0).max(rank));
        }
    }
    max_rank.map(|r| r + 1).unwrap_or(0)
}

//  Organizing

/// Rewrite one output's groups into canonical names for the given rank
/// order, appending the renames to `renames` and updating the names in
/// `groups` in place so later steps see the post-rename state.
fn organize(
    groups: &mut GroupToWorkspaces,
    output_index: usize,
    all_workspaces: &[WorkspaceInfo],
    renumber: bool,
    renames: &mut Vec<Rename>,
) -> Result<(), GroupsError> {
    for (rank, (group, members)) in groups.iter_mut().enumerate() {
        debug!("organizing group {:?} at rank {}", group, rank);
        let member_names: BTreeSet<String> = members.iter().map(|w| w.name.clone()).collect();
        let used_elsewhere: BTreeSet<u8> = all_workspaces
            .iter()
            .filter(|w| group_of(w) == *group && !member_names.contains(&w.name))
            .filter_map(local_number_of)
            .collect();
        let numbers = compute_local_numbers(members, &used_elsewhere, renumber);
        for (member, number) in members.iter_mut().zip(numbers) {
            let mut identity = names::parse_raw(&member.name).identity;
            identity.group = group.clone();
            identity.local_number = Some(number);
            let global = names::compute_global_number(output_index, rank, number);
            let new_name = names::compose_raw(Some(global), &identity)?;
            if new_name != member.name {
                renames.push(Rename {
                    from: member.name.clone(),
                    to: new_name.clone(),
                });
                member.name = new_name;
            }
        }
    }
    Ok(())
}

//  Operations

/// Compute the plan for `switch-active-group`.
///
/// Per output, the target group is removed from the rank order and
/// reinserted at rank 0; the relative order of all other groups is
/// preserved.  Only hidden ordering keys change, never the encoded
/// identities.  Outputs other than the focused one are reordered only when
/// they hold members of the target group and `focused_only` is off.
pub fn switch_active_group(
    snapshot: &Snapshot,
    target: &str,
    focused_only: bool,
    renumber: bool,
) -> Result<Plan, GroupsError> {
    names::validate_group(target)?;
    let focused_output = snapshot.focused_output()?;
    let mut renames = Vec::new();
    // New name of the first target-group workspace on the focused output.
    let mut focus_candidate = None;
    for (index, output) in snapshot.outputs.iter().enumerate() {
        let mut groups = group_by(&snapshot.on_output(&output.name));
        let exists = groups.iter().any(|(name, _)| name == target);
        if output.name != focused_output && !(exists && !focused_only) {
            continue;
        }
        let target_entry = groups
            .iter()
            .position(|(name, _)| name == target)
            .map(|i| groups.remove(i))
            .unwrap_or_else(|| (target.to_string(), Vec::new()));
        let mut reordered: GroupToWorkspaces = Vec::with_capacity(groups.len() + 1);
        reordered.push(target_entry);
        reordered.append(&mut groups);
        organize(
            &mut reordered,
            index,
            &snapshot.workspaces,
            renumber,
            &mut renames,
        )?;
        if output.name == focused_output {
            focus_candidate = reordered[0].1.first().map(|w| w.name.clone());
        }
    }
    let focused_group = snapshot.focused().map(group_of).unwrap_or_default();
    let focus = if focused_group == target {
        None
    } else {
        Some(match focus_candidate {
            Some(name) => name,
            // No member on the focused output: focus a freshly derived
            // name and let the window manager materialize the workspace.
            None => {
                let used: BTreeSet<u8> = snapshot
                    .group_members(target)
                    .iter()
                    .filter_map(local_number_of)
                    .collect();
                let number = lowest_free_local_numbers(1, &used)
                    .into_iter()
                    .next()
                    .unwrap_or(1);
                let output_index = snapshot.output_index(&focused_output).unwrap_or(0);
                let global = names::compute_global_number(output_index, 0, number);
                names::compose_raw(Some(global), &WorkspaceIdentity::numbered(target, number))?
            }
        })
    };
    Ok(Plan { renames, focus })
}

/// Compute the plan for `assign-workspace-to-group`: a single rename that
/// re-encodes the focused workspace's identity with the new group, keeping
/// its static name, its number, and its ordering key.  The group comes
/// into existence simply by being referenced.
pub fn assign_to_group(snapshot: &Snapshot, target: &str) -> Result<Plan, GroupsError> {
    names::validate_group(target)?;
    let workspace = snapshot
        .focused()
        .ok_or_else(|| GroupsError::NotFound("no focused workspace".to_string()))?;
    let raw = names::parse_raw(&workspace.name);
    if raw.identity.group == target {
        return Ok(Plan::default());
    }
    let identity = WorkspaceIdentity {
        group: target.to_string(),
        static_name: raw.identity.static_name.clone(),
        local_number: raw.local_number(),
    };
    let new_name = match names::compose_raw(raw.global_number, &identity) {
        Ok(name) => name,
        // A workspace with no key, no name and no number: give it the
        // lowest free number in the target group so the name is non-empty.
        Err(ValidationError::EmptyName) => {
            let used: BTreeSet<u8> = snapshot
                .group_members(target)
                .iter()
                .filter_map(local_number_of)
                .collect();
            let number = lowest_free_local_numbers(1, &used)
                .into_iter()
                .next()
                .unwrap_or(1);
            names::compose_raw(None, &WorkspaceIdentity::numbered(target, number))?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Plan {
        renames: vec![Rename {
            from: workspace.name.clone(),
            to: new_name,
        }],
        focus: None,
    })
}

/// Resolve the raw name targeted by `workspace-number` / `move-to-number`.
///
/// An existing workspace with the requested number is targeted directly,
/// unless `use_next_available` is set and the number is taken by a
/// workspace with a different static name, in which case the lowest unused
/// number in the group is used instead.  A missing workspace yields a
/// derived name the window manager will materialize on focus.
pub fn numbered_workspace_target(
    snapshot: &Snapshot,
    group: &str,
    number: u8,
    use_next_available: bool,
) -> Result<String, GroupsError> {
    names::validate_group(group)?;
    let members = snapshot.group_members(group);
    let occupant = members.iter().find(|w| local_number_of(w) == Some(number));
    let target_number = match occupant {
        Some(workspace) => {
            let occupant_name = names::parse_raw(&workspace.name).identity.static_name;
            if !use_next_available || occupant_name.is_empty() {
                return Ok(workspace.name.clone());
            }
            // Occupied by an unrelated workspace: take the lowest free
            // number instead of colliding.
            let used: BTreeSet<u8> = members.iter().filter_map(local_number_of).collect();
            lowest_free_local_numbers(1, &used)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    GroupsError::NotFound(format!("no free workspace number in group {:?}", group))
                })?
        }
        None => number,
    };
    derived_workspace_name(snapshot, group, target_number)
}

/// Resolve the raw name for `workspace-new` / `move-to-new`: the lowest
/// free number in the group.
pub fn new_workspace_target(snapshot: &Snapshot, group: &str) -> Result<String, GroupsError> {
    names::validate_group(group)?;
    let used: BTreeSet<u8> = snapshot
        .group_members(group)
        .iter()
        .filter_map(local_number_of)
        .collect();
    let number = lowest_free_local_numbers(1, &used)
        .into_iter()
        .next()
        .ok_or_else(|| {
            GroupsError::NotFound(format!("no free workspace number in group {:?}", group))
        })?;
    derived_workspace_name(snapshot, group, number)
}

/// Compose the name of a not-yet-existing numbered workspace in `group`,
/// on the focused output, at the group's current rank there.
fn derived_workspace_name(
    snapshot: &Snapshot,
    group: &str,
    number: u8,
) -> Result<String, GroupsError> {
    let focused_output = snapshot.focused_output()?;
    let output_index = snapshot.output_index(&focused_output).unwrap_or(0);
    let groups = group_by(&snapshot.on_output(&focused_output));
    let rank = group_rank_on_output(&groups, group);
    let global = names::compute_global_number(output_index, rank, number);
    Ok(names::compose_raw(
        Some(global),
        &WorkspaceIdentity::numbered(group, number),
    )?)
}

/// Resolve the raw name of the workspace `offset` steps from the focused
/// one within its group, wrapping around.
pub fn relative_workspace(snapshot: &Snapshot, offset: i64) -> Result<String, GroupsError> {
    let focused = snapshot
        .focused()
        .ok_or_else(|| GroupsError::NotFound("no focused workspace".to_string()))?;
    let members = snapshot.group_members(&group_of(focused));
    let position = members
        .iter()
        .position(|w| w.name == focused.name)
        .unwrap_or(0);
    let len = members.len() as i64;
    let target = (position as i64 + offset).rem_euclid(len) as usize;
    Ok(members[target].name.clone())
}

/// Compute the plan for `rename-workspace`: a partial identity update of
/// the focused workspace.  The ordering key keeps its output and group
/// digits; only the local-number offset follows the update.  Validation
/// happens before the plan carries any rename, so an invalid result
/// mutates nothing.
pub fn rename_focused(
    snapshot: &Snapshot,
    update: &names::IdentityUpdate,
) -> Result<Plan, GroupsError> {
    let workspace = snapshot
        .focused()
        .ok_or_else(|| GroupsError::NotFound("no focused workspace".to_string()))?;
    let raw = names::parse_raw(&workspace.name);
    let mut current = raw.identity.clone();
    current.local_number = raw.local_number();
    let identity = update.apply(&current);
    let global = raw.global_number.map(|g| {
        g - g.rem_euclid(names::MAX_WORKSPACES_PER_GROUP)
            + i64::from(identity.local_number.unwrap_or(0))
    });
    let new_name = names::compose_raw(global, &identity)?;
    let renames = if new_name == workspace.name {
        Vec::new()
    } else {
        vec![Rename {
            from: workspace.name.clone(),
            to: new_name,
        }]
    };
    Ok(Plan {
        renames,
        focus: None,
    })
}

//  Tests
