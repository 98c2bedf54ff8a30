//! The window-manager adapter contract.
//!
//! Every concrete backend (i3, sway, a test harness, …) implements
//! [`WindowManager`].  The [`Controller`](crate::controller::Controller) and
//! the [ordering engine](crate::groups) only depend on this abstraction, so
//! the group logic is not coupled to any specific compositor.

use std::fmt;

/// Static information about an output (monitor) known to the window manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputInfo {
    /// Unique name the window manager uses for this output (e.g. `"DP-1"`).
    pub name: String,
    /// Whether the output is currently enabled.
    pub active: bool,
    /// Whether the window manager considers this the primary output.
    pub primary: bool,
    /// X position on the virtual desktop (pixels).
    pub x: i32,
    /// Y position on the virtual desktop (pixels).
    pub y: i32,
}

/// A live workspace as observed from the window manager.
///
/// Workspaces are created and reaped entirely by the window manager; this
/// tool only renames them or asks to focus one by target name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceInfo {
    /// The raw stored name, including any hidden ordering-key prefix.
    pub name: String,
    /// The numeric sort key the window manager derived for this workspace,
    /// if it has one.
    pub sort_key: Option<i64>,
    /// Name of the output the workspace is currently on.
    pub output: String,
    /// Whether the workspace has input focus.
    pub focused: bool,
    /// Whether the workspace is visible on its output.
    pub visible: bool,
    /// Titles of the windows on the workspace, used only for display.
    pub window_titles: Vec<String>,
}

/// What changed in a workspace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceChange {
    Init,
    Focus,
    Empty,
    Rename,
    Move,
    Urgent,
    Reload,
    Other,
}

impl WorkspaceChange {
    /// Map the window manager's change string onto the known variants.
    pub fn from_change(change: &str) -> Self {
        match change {
            "init" => Self::Init,
            "focus" => Self::Focus,
            "empty" => Self::Empty,
            "rename" => Self::Rename,
            "move" => Self::Move,
            "urgent" => Self::Urgent,
            "reload" => Self::Reload,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for WorkspaceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::Focus => "focus",
            Self::Empty => "empty",
            Self::Rename => "rename",
            Self::Move => "move",
            Self::Urgent => "urgent",
            Self::Reload => "reload",
            Self::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A workspace-change notification delivered through
/// [`WindowManager::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceEvent {
    pub change: WorkspaceChange,
    /// Raw name of the workspace the event concerns, when the window
    /// manager reports one.
    pub workspace: Option<String>,
}

/// Abstraction over a window manager with a flat, ordered workspace list.
///
/// The adapter does not retry internally; retry policy, if any, belongs to
/// the caller.  Renames and focus changes take effect immediately, so a
/// caller applying a multi-step plan must be prepared for partial
/// application if a step fails.
pub trait WindowManager {
    /// The error type produced by this window manager.
    type Error: std::error::Error + Send + 'static;

    /// Return the outputs the window manager knows about.
    fn outputs(&self) -> Result<Vec<OutputInfo>, Self::Error>;

    /// Return all live workspaces with their raw names and sort keys.
    fn workspaces(&self) -> Result<Vec<WorkspaceInfo>, Self::Error>;

    /// Rename the workspace currently called `old` to `new`.
    fn rename_workspace(&self, old: &str, new: &str) -> Result<(), Self::Error>;

    /// Focus the workspace with the given raw name, creating it if no such
    /// workspace exists.  With `auto_back_and_forth`, focusing the already
    /// focused workspace toggles back to the previously focused one.
    fn focus_workspace(&self, name: &str, auto_back_and_forth: bool) -> Result<(), Self::Error>;

    /// Move the focused container to the workspace with the given raw name,
    /// creating the workspace if needed.
    fn move_focused_to(&self, name: &str) -> Result<(), Self::Error>;

    /// Block and deliver workspace events to `on_event` until the
    /// connection fails.  Intended for external consumers (status bars and
    /// the like); the core commands never subscribe.
    fn subscribe(&self, on_event: &mut dyn FnMut(WorkspaceEvent)) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    //  Mock WindowManager

    /// A test double that records every call made to it.
    #[derive(Debug, Default)]
    struct MockWm {
        workspaces: Vec<WorkspaceInfo>,
        rename_log: RefCell<Vec<(String, String)>>,
        focus_log: RefCell<Vec<(String, bool)>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl WindowManager for MockWm {
        type Error = MockError;

        fn outputs(&self) -> Result<Vec<OutputInfo>, MockError> {
            Ok(vec![OutputInfo {
                name: "MOCK-1".into(),
                active: true,
                primary: true,
                x: 0,
                y: 0,
            }])
        }

        fn workspaces(&self) -> Result<Vec<WorkspaceInfo>, MockError> {
            Ok(self.workspaces.clone())
        }

        fn rename_workspace(&self, old: &str, new: &str) -> Result<(), MockError> {
            self.rename_log
                .borrow_mut()
                .push((old.to_string(), new.to_string()));
            Ok(())
        }

        fn focus_workspace(&self, name: &str, auto_back_and_forth: bool) -> Result<(), MockError> {
            self.focus_log
                .borrow_mut()
                .push((name.to_string(), auto_back_and_forth));
            Ok(())
        }

        fn move_focused_to(&self, _name: &str) -> Result<(), MockError> {
            Ok(())
        }

        fn subscribe(&self, on_event: &mut dyn FnMut(WorkspaceEvent)) -> Result<(), MockError> {
            on_event(WorkspaceEvent {
                change: WorkspaceChange::Focus,
                workspace: Some("1".into()),
            });
            Ok(())
        }
    }

    #[test]
    fn mock_wm_records_renames() {
        let wm = MockWm::default();
        wm.rename_workspace("1", "101:work:1").unwrap();
        assert_eq!(wm.rename_log.borrow().len(), 1);
        assert_eq!(
            wm.rename_log.borrow()[0],
            ("1".to_string(), "101:work:1".to_string())
        );
    }

    #[test]
    fn mock_wm_records_focus_flags() {
        let wm = MockWm::default();
        wm.focus_workspace("101:work:1", false).unwrap();
        assert_eq!(wm.focus_log.borrow()[0], ("101:work:1".to_string(), false));
    }

    #[test]
    fn subscribe_delivers_events() {
        let wm = MockWm::default();
        let mut seen = Vec::new();
        wm.subscribe(&mut |event| seen.push(event)).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].change, WorkspaceChange::Focus);
        assert_eq!(seen[0].workspace.as_deref(), Some("1"));
    }

    #[test]
    fn change_parsing_covers_known_variants() {
        assert_eq!(WorkspaceChange::from_change("focus"), WorkspaceChange::Focus);
        assert_eq!(WorkspaceChange::from_change("empty"), WorkspaceChange::Empty);
        assert_eq!(
            WorkspaceChange::from_change("something-new"),
            WorkspaceChange::Other
        );
    }
}
