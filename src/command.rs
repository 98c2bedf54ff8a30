//! The command-line surface.
//!
//! This module defines the vocabulary that the CLI binary and the
//! [command server](crate::server) share: both parse the same argv shape,
//! the server receiving it as newline-joined tokens over its socket, so a
//! keybinding can talk to either interchangeably.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::groups::GroupContext;

/// Default field list for `list-workspaces`.
pub const DEFAULT_FIELDS: &str =
    "global_number,group,static_name,local_number,global_name,window_icons,output,focused";

/// Render a group name for output; accepted back by
/// [`normalize_group_arg`].
pub fn display_group(group: &str) -> String {
    if group.is_empty() {
        "<default>".to_string()
    } else {
        group.to_string()
    }
}

/// Map the rendered `<default>` token back to the empty (default) group.
pub fn normalize_group_arg(group: &str) -> String {
    if group == "<default>" {
        String::new()
    } else {
        group.to_string()
    }
}

/// Control i3 workspace groups.
#[derive(Debug, Parser)]
#[command(name = "i3grp", version, about = "Workspace groups for i3 and sway")]
pub struct Cli {
    /// Log window-manager mutations without applying them.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Group-context selection shared by commands that implicitly assume a
/// group.
#[derive(Debug, Clone, Default, Args)]
pub struct GroupArgs {
    /// Use the active group (the group shown at the front of the focused
    /// monitor).
    #[arg(long, conflicts_with_all = ["group_focused", "group_name"])]
    pub group_active: bool,

    /// Use the group of the focused workspace.
    #[arg(long, conflicts_with = "group_name")]
    pub group_focused: bool,

    /// Use the named group.  `<default>` names the default group.
    #[arg(long)]
    pub group_name: Option<String>,
}

impl GroupArgs {
    /// The selected context, if any flag was given.
    pub fn context(&self) -> Option<GroupContext> {
        if let Some(name) = &self.group_name {
            Some(GroupContext::Named(normalize_group_arg(name)))
        } else if self.group_active {
            Some(GroupContext::Active)
        } else if self.group_focused {
            Some(GroupContext::Focused)
        } else {
            None
        }
    }
}

/// Every subcommand the tool understands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the groups of the current workspaces.
    ListGroups {
        /// List only groups with workspaces on the focused monitor.
        #[arg(long)]
        focused_monitor_only: bool,
    },

    /// List workspaces and their group metadata.
    ListWorkspaces {
        #[command(flatten)]
        group: GroupArgs,

        /// Comma-separated list of fields to output.
        #[arg(long, default_value = DEFAULT_FIELDS)]
        fields: String,

        /// List only the focused workspace.
        #[arg(long)]
        focused_only: bool,

        /// List only workspaces on the focused monitor.
        #[arg(long)]
        focused_monitor_only: bool,
    },

    /// Focus the workspace with the given number in the context group,
    /// like i3's "workspace number" command.
    WorkspaceNumber {
        #[command(flatten)]
        group: GroupArgs,

        /// If the number is taken by an unrelated workspace, use the next
        /// available number instead of targeting it.
        #[arg(long)]
        use_next_available_number: bool,

        /// Do not toggle back when the target is already focused.
        #[arg(long)]
        no_auto_back_and_forth: bool,

        #[arg(value_parser = clap::value_parser!(u8).range(1..100))]
        number: u8,
    },

    /// Move the focused container to the workspace with the given number
    /// in the context group.
    MoveToNumber {
        #[command(flatten)]
        group: GroupArgs,

        /// If the number is taken by an unrelated workspace, use the next
        /// available number instead of targeting it.
        #[arg(long)]
        use_next_available_number: bool,

        /// Do not toggle back when the target is already focused.
        #[arg(long)]
        no_auto_back_and_forth: bool,

        #[arg(value_parser = clap::value_parser!(u8).range(1..100))]
        number: u8,
    },

    /// Focus the next workspace in the focused group.
    WorkspaceNext,

    /// Focus the previous workspace in the focused group.
    WorkspacePrev,

    /// Move the focused container to the next workspace in the focused
    /// group.
    MoveToNext,

    /// Move the focused container to the previous workspace in the
    /// focused group.
    MoveToPrev,

    /// Focus a new workspace in the context group with the lowest
    /// available number.
    WorkspaceNew {
        #[command(flatten)]
        group: GroupArgs,
    },

    /// Move the focused container to a new workspace in the context group
    /// with the lowest available number.
    MoveToNew {
        #[command(flatten)]
        group: GroupArgs,
    },

    /// Bring the given group to the front of the workspace order.
    SwitchActiveGroup {
        /// Only reorder the focused monitor, even if other monitors hold
        /// workspaces of the group.
        #[arg(long)]
        focused_monitor_only: bool,

        group: String,
    },

    /// Assign the focused workspace to the given group.
    AssignWorkspaceToGroup { group: String },

    /// Rename and optionally regroup or renumber the focused workspace.
    ///
    /// Fields left out keep their current value; a literal `-` resets a
    /// field.  The positional pattern form is `[group][:name][:number]`.
    RenameWorkspace {
        /// Group to assign.  `-` resets to the default group.
        #[arg(long, conflicts_with = "pattern")]
        group: Option<String>,

        /// New static name.  `-` clears the name.
        #[arg(long, conflicts_with = "pattern")]
        name: Option<String>,

        /// New workspace number.  `-` clears the number.
        #[arg(long, conflicts_with = "pattern")]
        number: Option<String>,

        /// Combined `[group][:name][:number]` pattern.
        pattern: Option<String>,
    },

    /// Run the local command server.
    Server {
        /// Path of the unix socket to listen on.
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}
