//! The command façade shared by the CLI and the command server.
//!
//! Validates inputs, fetches a fresh [`Snapshot`] from the window manager
//! at the start of every command (never cached across commands), asks the
//! [ordering engine](crate::groups) for a plan, applies it through the
//! [`WindowManager`] and renders query results as tab/line-delimited text
//! for shell consumption.

use log::info;

use crate::command::{display_group, normalize_group_arg, Command, GroupArgs};
use crate::config::Config;
use crate::groups::{
    self, group_by, group_of, local_number_of, GroupContext, GroupsError, Plan, Snapshot,
};
use crate::icons::IconsResolver;
use crate::names::{self, IdentityUpdate};
use crate::traits::{WindowManager, WorkspaceInfo};

/// Possible errors from dispatching a command.
///
/// Validation and not-found errors are raised before any mutation; a
/// window-manager error raised mid-plan leaves the already-applied renames
/// in place, since the window manager has no transaction primitive.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Validation(#[from] names::ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid field: {0:?} (valid fields: {1})")]
    InvalidField(String, &'static str),
    #[error("window manager error: {0}")]
    WindowManager(String),
    #[error("{0}")]
    Unsupported(String),
}

impl From<GroupsError> for ControllerError {
    fn from(e: GroupsError) -> Self {
        match e {
            GroupsError::Validation(e) => Self::Validation(e),
            GroupsError::NotFound(message) => Self::NotFound(message),
        }
    }
}

/// The fields `list-workspaces` can output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkspaceField {
    GlobalNumber,
    Group,
    StaticName,
    LocalNumber,
    GlobalName,
    WindowIcons,
    Output,
    Focused,
}

const VALID_FIELDS: &str =
    "global_number, group, static_name, local_number, global_name, window_icons, output, focused";

impl WorkspaceField {
    fn parse(field: &str) -> Result<Self, ControllerError> {
        match field {
            "global_number" => Ok(Self::GlobalNumber),
            "group" => Ok(Self::Group),
            "static_name" => Ok(Self::StaticName),
            "local_number" => Ok(Self::LocalNumber),
            "global_name" => Ok(Self::GlobalName),
            "window_icons" => Ok(Self::WindowIcons),
            "output" => Ok(Self::Output),
            "focused" => Ok(Self::Focused),
            other => Err(ControllerError::InvalidField(other.to_string(), VALID_FIELDS)),
        }
    }
}

/// Dispatches commands against a window manager.
///
/// Holds no workspace state of its own: the window manager's workspace
/// names are the only store, and every command starts from a fresh
/// snapshot.  With `dry_run`, every mutation is logged instead of applied.
pub struct Controller<W: WindowManager> {
    wm: W,
    config: Config,
    icons: IconsResolver,
    dry_run: bool,
}

impl<W: WindowManager> Controller<W> {
    pub fn new(wm: W, config: Config, dry_run: bool) -> Self {
        let icons = IconsResolver::new(&config.icons);
        Self {
            wm,
            config,
            icons,
            dry_run,
        }
    }

    /// Dispatch one parsed command and return its rendered output (empty
    /// for mutations).
    pub fn run(&self, command: &Command) -> Result<String, ControllerError> {
        match command {
            Command::ListGroups {
                focused_monitor_only,
            } => self.list_groups(*focused_monitor_only),
            Command::ListWorkspaces {
                group,
                fields,
                focused_only,
                focused_monitor_only,
            } => self.list_workspaces(group, fields, *focused_only, *focused_monitor_only),
            Command::WorkspaceNumber {
                group,
                use_next_available_number,
                no_auto_back_and_forth,
                number,
            } => self.jump_to_number(
                group,
                *number,
                *use_next_available_number,
                *no_auto_back_and_forth,
                false,
            ),
            Command::MoveToNumber {
                group,
                use_next_available_number,
                no_auto_back_and_forth,
                number,
            } => self.jump_to_number(
                group,
                *number,
                *use_next_available_number,
                *no_auto_back_and_forth,
                true,
            ),
            Command::WorkspaceNext => self.jump_relative(1, false),
            Command::WorkspacePrev => self.jump_relative(-1, false),
            Command::MoveToNext => self.jump_relative(1, true),
            Command::MoveToPrev => self.jump_relative(-1, true),
            Command::WorkspaceNew { group } => self.jump_to_new(group, false),
            Command::MoveToNew { group } => self.jump_to_new(group, true),
            Command::SwitchActiveGroup {
                focused_monitor_only,
                group,
            } => self.switch_active_group(group, *focused_monitor_only),
            Command::AssignWorkspaceToGroup { group } => self.assign_to_group(group),
            Command::RenameWorkspace {
                group,
                name,
                number,
                pattern,
            } => self.rename_workspace(
                group.as_deref(),
                name.as_deref(),
                number.as_deref(),
                pattern.as_deref(),
            ),
            Command::Server { .. } => Err(ControllerError::Unsupported(
                "the server command cannot be dispatched to a running server".to_string(),
            )),
        }
    }

    //  Window-manager plumbing

    fn wm_error(e: W::Error) -> ControllerError {
        ControllerError::WindowManager(e.to_string())
    }

    fn snapshot(&self) -> Result<Snapshot, ControllerError> {
        let outputs = self.wm.outputs().map_err(Self::wm_error)?;
        let workspaces = self.wm.workspaces().map_err(Self::wm_error)?;
        Ok(Snapshot::new(outputs, workspaces))
    }

    /// Apply a plan: renames in order, then the focus change.  No rollback
    /// on mid-plan failure.
    fn apply(&self, plan: &Plan) -> Result<(), ControllerError> {
        for rename in &plan.renames {
            info!("renaming workspace {:?} to {:?}", rename.from, rename.to);
            if !self.dry_run {
                self.wm
                    .rename_workspace(&rename.from, &rename.to)
                    .map_err(Self::wm_error)?;
            }
        }
        if let Some(name) = &plan.focus {
            self.focus(name, false)?;
        }
        Ok(())
    }

    fn focus(&self, name: &str, auto_back_and_forth: bool) -> Result<(), ControllerError> {
        info!("focusing workspace {:?}", name);
        if !self.dry_run {
            self.wm
                .focus_workspace(name, auto_back_and_forth)
                .map_err(Self::wm_error)?;
        }
        Ok(())
    }

    fn move_focused_to(&self, name: &str) -> Result<(), ControllerError> {
        info!("moving focused container to workspace {:?}", name);
        if !self.dry_run {
            self.wm.move_focused_to(name).map_err(Self::wm_error)?;
        }
        Ok(())
    }

    //  Queries

    fn list_groups(&self, focused_monitor_only: bool) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let workspaces = if focused_monitor_only {
            snapshot.on_output(&snapshot.focused_output()?)
        } else {
            snapshot.ordered_for_listing()
        };
        let lines: Vec<String> = group_by(&workspaces)
            .iter()
            .map(|(group, _)| display_group(group))
            .collect();
        Ok(lines.join("\n"))
    }

    fn list_workspaces(
        &self,
        group: &GroupArgs,
        fields: &str,
        focused_only: bool,
        focused_monitor_only: bool,
    ) -> Result<String, ControllerError> {
        let fields: Vec<WorkspaceField> = fields
            .split(',')
            .map(|f| WorkspaceField::parse(f.trim()))
            .collect::<Result<_, _>>()?;
        let snapshot = self.snapshot()?;
        let context_group = match group.context() {
            Some(context) => Some(snapshot.resolve_context(&context)?),
            None => None,
        };
        let focused_output = if focused_monitor_only {
            Some(snapshot.focused_output()?)
        } else {
            None
        };
        let rows: Vec<String> = snapshot
            .workspaces
            .iter()
            .filter(|w| focused_output.as_ref().map_or(true, |o| w.output == *o))
            .filter(|w| context_group.as_ref().map_or(true, |g| group_of(w) == *g))
            .filter(|w| !focused_only || w.focused)
            .map(|w| self.render_row(w, &fields))
            .collect();
        Ok(rows.join("\n"))
    }

    fn render_row(&self, workspace: &WorkspaceInfo, fields: &[WorkspaceField]) -> String {
        let columns: Vec<String> = fields
            .iter()
            .map(|field| self.render_field(workspace, *field))
            .collect();
        columns.join("\t")
    }

    fn render_field(&self, workspace: &WorkspaceInfo, field: WorkspaceField) -> String {
        match field {
            WorkspaceField::GlobalNumber => groups::global_number_of(workspace)
                .map(|g| g.to_string())
                .unwrap_or_default(),
            WorkspaceField::Group => display_group(&group_of(workspace)),
            WorkspaceField::StaticName => {
                names::parse_raw(&workspace.name).identity.static_name
            }
            WorkspaceField::LocalNumber => local_number_of(workspace)
                .map(|n| n.to_string())
                .unwrap_or_default(),
            WorkspaceField::GlobalName => workspace.name.clone(),
            WorkspaceField::WindowIcons => self.icons.workspace_icons(&workspace.window_titles),
            WorkspaceField::Output => workspace.output.clone(),
            WorkspaceField::Focused => {
                if workspace.focused {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
        }
    }

    //  Mutations

    fn switch_active_group(
        &self,
        group: &str,
        focused_monitor_only: bool,
    ) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let plan = groups::switch_active_group(
            &snapshot,
            &normalize_group_arg(group),
            focused_monitor_only,
            self.config.renumber_workspaces,
        )?;
        self.apply(&plan)?;
        Ok(String::new())
    }

    fn assign_to_group(&self, group: &str) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let plan = groups::assign_to_group(&snapshot, &normalize_group_arg(group))?;
        self.apply(&plan)?;
        Ok(String::new())
    }

    fn jump_to_number(
        &self,
        group: &GroupArgs,
        number: u8,
        use_next_available: bool,
        no_auto_back_and_forth: bool,
        move_container: bool,
    ) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let context = group.context().unwrap_or(GroupContext::Focused);
        let target_group = snapshot.resolve_context(&context)?;
        let target = groups::numbered_workspace_target(
            &snapshot,
            &target_group,
            number,
            use_next_available,
        )?;
        if move_container {
            self.move_focused_to(&target)?;
        } else {
            self.focus(&target, !no_auto_back_and_forth)?;
        }
        Ok(String::new())
    }

    fn jump_relative(&self, offset: i64, move_container: bool) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let target = groups::relative_workspace(&snapshot, offset)?;
        if move_container {
            self.move_focused_to(&target)?;
        } else {
            // Deliberate navigation: never toggle back.
            self.focus(&target, false)?;
        }
        Ok(String::new())
    }

    fn jump_to_new(&self, group: &GroupArgs, move_container: bool) -> Result<String, ControllerError> {
        let snapshot = self.snapshot()?;
        let context = group.context().unwrap_or(GroupContext::Focused);
        let target_group = snapshot.resolve_context(&context)?;
        let target = groups::new_workspace_target(&snapshot, &target_group)?;
        if move_container {
            self.move_focused_to(&target)?;
        } else {
            self.focus(&target, false)?;
        }
        Ok(String::new())
    }

    fn rename_workspace(
        &self,
        group: Option<&str>,
        name: Option<&str>,
        number: Option<&str>,
        pattern: Option<&str>,
    ) -> Result<String, ControllerError> {
        let update = match pattern {
            Some(pattern) => IdentityUpdate::parse_pattern(pattern)?,
            None => IdentityUpdate::from_args(group, name, number)?,
        };
        if update.is_noop() {
            return Ok(String::new());
        }
        let snapshot = self.snapshot()?;
        let plan = groups::rename_focused(&snapshot, &update)?;
        self.apply(&plan)?;
        Ok(String::new())
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{OutputInfo, WorkspaceEvent};
    use std::cell::RefCell;

    //  Mock WindowManager

    /// A test double that mimics i3's name handling: renames update the
    /// stored workspace and its derived sort key, focusing a missing name
    /// creates the workspace.
    #[derive(Debug, Default)]
    struct MockWm {
        workspaces: RefCell<Vec<WorkspaceInfo>>,
        rename_log: RefCell<Vec<(String, String)>>,
        focus_log: RefCell<Vec<(String, bool)>>,
        move_log: RefCell<Vec<String>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl MockWm {
        fn with_workspaces(raw_names: &[&str], focused: &str) -> Self {
            let wm = Self::default();
            *wm.workspaces.borrow_mut() = raw_names
                .iter()
                .map(|name| WorkspaceInfo {
                    name: name.to_string(),
                    sort_key: names::parse_raw(name).global_number,
                    output: "eDP-1".to_string(),
                    focused: *name == focused,
                    visible: *name == focused,
                    window_titles: Vec::new(),
                })
                .collect();
            wm
        }
    }

    impl WindowManager for MockWm {
        type Error = MockError;

        fn outputs(&self) -> Result<Vec<OutputInfo>, MockError> {
            Ok(vec![OutputInfo {
                name: "eDP-1".into(),
                active: true,
                primary: true,
                x: 0,
                y: 0,
            }])
        }

        fn workspaces(&self) -> Result<Vec<WorkspaceInfo>, MockError> {
            Ok(self.workspaces.borrow().clone())
        }

        fn rename_workspace(&self, old: &str, new: &str) -> Result<(), MockError> {
            self.rename_log
                .borrow_mut()
                .push((old.to_string(), new.to_string()));
            for workspace in self.workspaces.borrow_mut().iter_mut() {
                if workspace.name == old {
                    workspace.name = new.to_string();
                    workspace.sort_key = names::parse_raw(new).global_number;
                }
            }
            Ok(())
        }

        fn focus_workspace(&self, name: &str, auto_back_and_forth: bool) -> Result<(), MockError> {
            self.focus_log
                .borrow_mut()
                .push((name.to_string(), auto_back_and_forth));
            let mut workspaces = self.workspaces.borrow_mut();
            if !workspaces.iter().any(|w| w.name == name) {
                workspaces.push(WorkspaceInfo {
                    name: name.to_string(),
                    sort_key: names::parse_raw(name).global_number,
                    output: "eDP-1".to_string(),
                    focused: false,
                    visible: false,
                    window_titles: Vec::new(),
                });
            }
            for workspace in workspaces.iter_mut() {
                workspace.focused = workspace.name == name;
                workspace.visible = workspace.focused;
            }
            Ok(())
        }

        fn move_focused_to(&self, name: &str) -> Result<(), MockError> {
            self.move_log.borrow_mut().push(name.to_string());
            Ok(())
        }

        fn subscribe(&self, _on_event: &mut dyn FnMut(WorkspaceEvent)) -> Result<(), MockError> {
            Ok(())
        }
    }

    fn controller(wm: MockWm) -> Controller<MockWm> {
        Controller::new(wm, Config::default(), false)
    }

    fn list_command(fields: &str) -> Command {
        Command::ListWorkspaces {
            group: GroupArgs::default(),
            fields: fields.to_string(),
            focused_only: false,
            focused_monitor_only: false,
        }
    }

    #[test]
    fn assign_then_switch_end_to_end() {
        let controller = controller(MockWm::with_workspaces(&["1", "2", "3", "4"], "4"));

        controller
            .run(&Command::AssignWorkspaceToGroup {
                group: "work".into(),
            })
            .unwrap();
        assert_eq!(
            controller.wm.rename_log.borrow().as_slice(),
            [("4".to_string(), "4:work:4".to_string())]
        );

        controller
            .run(&Command::SwitchActiveGroup {
                focused_monitor_only: false,
                group: "work".into(),
            })
            .unwrap();
        // The default group moved to rank 1; work kept its key and with it
        // the front of the order.  Focus was already in the group.
        assert!(controller.wm.focus_log.borrow().is_empty());

        let output = controller.run(&list_command("group,local_number")).unwrap();
        assert_eq!(output, "work\t4\n<default>\t1\n<default>\t2\n<default>\t3");
    }

    #[test]
    fn switch_focuses_first_workspace_of_target_group() {
        let controller = controller(MockWm::with_workspaces(&["1", "4:work:4"], "1"));
        controller
            .run(&Command::SwitchActiveGroup {
                focused_monitor_only: false,
                group: "work".into(),
            })
            .unwrap();
        assert_eq!(
            controller.wm.focus_log.borrow().as_slice(),
            [("4:work:4".to_string(), false)]
        );
    }

    #[test]
    fn switch_to_empty_group_materializes_a_workspace() {
        let controller = controller(MockWm::with_workspaces(&["1:a:1"], "1:a:1"));
        controller
            .run(&Command::SwitchActiveGroup {
                focused_monitor_only: false,
                group: "mail".into(),
            })
            .unwrap();
        assert_eq!(
            controller.wm.focus_log.borrow().as_slice(),
            [("1:mail:1".to_string(), false)]
        );
        // The window manager (mock) created it on focus.
        assert!(controller
            .wm
            .workspaces
            .borrow()
            .iter()
            .any(|w| w.name == "1:mail:1"));
    }

    #[test]
    fn workspace_number_uses_next_available_number() {
        let controller = controller(MockWm::with_workspaces(
            &["1:g:mail:1", "2:g:2", "3:g:3"],
            "2:g:2",
        ));
        controller
            .run(&Command::WorkspaceNumber {
                group: GroupArgs::default(),
                use_next_available_number: true,
                no_auto_back_and_forth: false,
                number: 1,
            })
            .unwrap();
        // 1 is held by an unrelated named workspace; the smallest unused
        // number in the group is 4.
        assert_eq!(
            controller.wm.focus_log.borrow().as_slice(),
            [("4:g:4".to_string(), true)]
        );
    }

    #[test]
    fn workspace_number_honors_no_auto_back_and_forth() {
        let controller = controller(MockWm::with_workspaces(&["1:g:1"], "1:g:1"));
        controller
            .run(&Command::WorkspaceNumber {
                group: GroupArgs::default(),
                use_next_available_number: false,
                no_auto_back_and_forth: true,
                number: 1,
            })
            .unwrap();
        assert_eq!(
            controller.wm.focus_log.borrow().as_slice(),
            [("1:g:1".to_string(), false)]
        );
    }

    #[test]
    fn move_to_number_moves_the_container() {
        let controller = controller(MockWm::with_workspaces(&["1:g:1", "2:g:2"], "1:g:1"));
        controller
            .run(&Command::MoveToNumber {
                group: GroupArgs::default(),
                use_next_available_number: false,
                no_auto_back_and_forth: false,
                number: 2,
            })
            .unwrap();
        assert_eq!(
            controller.wm.move_log.borrow().as_slice(),
            ["2:g:2".to_string()]
        );
    }

    #[test]
    fn relative_navigation_stays_in_group() {
        let controller = controller(MockWm::with_workspaces(
            &["1:g:1", "2:g:2", "101:other:1"],
            "2:g:2",
        ));
        controller.run(&Command::WorkspaceNext).unwrap();
        assert_eq!(
            controller.wm.focus_log.borrow().as_slice(),
            [("1:g:1".to_string(), false)]
        );
    }

    #[test]
    fn rename_workspace_applies_partial_update() {
        let controller = controller(MockWm::with_workspaces(&["102:work:mail:2"], "102:work:mail:2"));
        controller
            .run(&Command::RenameWorkspace {
                group: None,
                name: Some("web".into()),
                number: Some("5".into()),
                pattern: None,
            })
            .unwrap();
        assert_eq!(
            controller.wm.rename_log.borrow().as_slice(),
            [("102:work:mail:2".to_string(), "105:work:web:5".to_string())]
        );
    }

    #[test]
    fn rename_workspace_hyphen_resets_group() {
        let controller = controller(MockWm::with_workspaces(&["102:work:mail:2"], "102:work:mail:2"));
        controller
            .run(&Command::RenameWorkspace {
                group: Some("-".into()),
                name: None,
                number: None,
                pattern: None,
            })
            .unwrap();
        // The empty leading group field keeps "mail" reading as a static
        // name rather than a group.
        assert_eq!(
            controller.wm.rename_log.borrow().as_slice(),
            [("102:work:mail:2".to_string(), "102::mail:2".to_string())]
        );
    }

    #[test]
    fn validation_errors_leave_state_untouched() {
        let controller = controller(MockWm::with_workspaces(&["1"], "1"));
        let result = controller.run(&Command::AssignWorkspaceToGroup {
            group: "bad:group".into(),
        });
        assert!(matches!(result, Err(ControllerError::Validation(_))));
        assert!(controller.wm.rename_log.borrow().is_empty());
    }

    #[test]
    fn invalid_fields_are_rejected() {
        let controller = controller(MockWm::with_workspaces(&["1"], "1"));
        let result = controller.run(&list_command("group,bogus"));
        assert!(matches!(result, Err(ControllerError::InvalidField(..))));
    }

    #[test]
    fn list_groups_reports_default_group_token() {
        let controller = controller(MockWm::with_workspaces(&["1", "4:work:4"], "1"));
        let output = controller
            .run(&Command::ListGroups {
                focused_monitor_only: false,
            })
            .unwrap();
        assert_eq!(output, "<default>\nwork");
    }

    #[test]
    fn dry_run_logs_but_does_not_mutate() {
        let wm = MockWm::with_workspaces(&["1", "2"], "1");
        let controller = Controller::new(wm, Config::default(), true);
        controller
            .run(&Command::AssignWorkspaceToGroup {
                group: "work".into(),
            })
            .unwrap();
        assert!(controller.wm.rename_log.borrow().is_empty());
        assert_eq!(controller.wm.workspaces.borrow()[0].name, "1");
    }

    #[test]
    fn server_command_is_not_dispatchable() {
        let controller = controller(MockWm::default());
        let result = controller.run(&Command::Server { socket: None });
        assert!(matches!(result, Err(ControllerError::Unsupported(_))));
    }
}
