//! [`WindowManager`] implementation backed by i3 IPC.
//!
//! Queries (`GET_WORKSPACES`, `GET_OUTPUTS`, `GET_TREE`) and mutations
//! (`RUN_COMMAND`) all travel over one warm [`Connection`], which is
//! re-established on the next call after an I/O error.  Window titles for
//! the icon display come from the layout tree, since the flat workspace
//! list does not carry them.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::Deserialize;

use crate::i3::ipc::{self, Connection, IpcError};
use crate::traits::{
    OutputInfo, WindowManager, WorkspaceChange, WorkspaceEvent, WorkspaceInfo,
};

/// i3-backed window manager.
pub struct I3Wm {
    connection: RefCell<Option<Connection>>,
}

/// Errors that can occur when talking to i3.
#[derive(Debug, thiserror::Error)]
#[error("window manager error: {0}")]
pub struct I3WmError(String);

impl From<IpcError> for I3WmError {
    fn from(e: IpcError) -> Self {
        Self(e.to_string())
    }
}

impl From<serde_json::Error> for I3WmError {
    fn from(e: serde_json::Error) -> Self {
        Self(format!("parse: {}", e))
    }
}

impl Default for I3Wm {
    fn default() -> Self {
        Self::new()
    }
}

impl I3Wm {
    /// Create a new handle.  The connection is opened lazily on first use
    /// and kept warm afterwards.
    pub fn new() -> Self {
        Self {
            connection: RefCell::new(None),
        }
    }

    /// Run `f` against the warm connection, connecting if needed.  On
    /// failure the connection is dropped so the next call reconnects.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, IpcError>,
    ) -> Result<T, I3WmError> {
        let mut slot = self.connection.borrow_mut();
        let mut connection = match slot.take() {
            Some(connection) => connection,
            None => Connection::connect()?,
        };
        match f(&mut connection) {
            Ok(value) => {
                *slot = Some(connection);
                Ok(value)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn request(&self, message_type: u32, payload: &str) -> Result<String, I3WmError> {
        self.with_connection(|connection| connection.request(message_type, payload))
    }

    /// Send an i3 command and check every status in the reply.
    fn run_command(&self, command: &str) -> Result<(), I3WmError> {
        log::debug!("sending i3 command: {}", command);
        let body = self.request(ipc::RUN_COMMAND, command)?;
        let replies: Vec<CommandReply> = serde_json::from_str(&body)?;
        for reply in replies {
            if !reply.success {
                return Err(I3WmError(format!(
                    "command {:?} rejected: {}",
                    command,
                    reply.error.unwrap_or_else(|| "unknown error".to_string())
                )));
            }
        }
        Ok(())
    }
}

/// Quote a workspace name for the i3 command language.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

//  Minimal serde structs for the JSON we care about

/// One entry of the `RUN_COMMAND` reply.
#[derive(Deserialize)]
struct CommandReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Subset of the JSON object returned by `GET_WORKSPACES`.
#[derive(Deserialize)]
struct WorkspaceJson {
    num: i64,
    name: String,
    visible: bool,
    focused: bool,
    output: String,
}

#[derive(Deserialize)]
struct RectJson {
    x: i32,
    y: i32,
}

/// Subset of the JSON object returned by `GET_OUTPUTS`.
#[derive(Deserialize)]
struct OutputJson {
    name: String,
    active: bool,
    #[serde(default)]
    primary: bool,
    rect: RectJson,
}

/// Subset of a `GET_TREE` node.
#[derive(Deserialize)]
struct TreeNode {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<TreeNode>,
    #[serde(default)]
    floating_nodes: Vec<TreeNode>,
}

/// Subset of a workspace event payload.
#[derive(Deserialize)]
struct WorkspaceEventJson {
    change: String,
    #[serde(default)]
    current: Option<EventNodeJson>,
}

#[derive(Deserialize)]
struct EventNodeJson {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct SubscribeReply {
    success: bool,
}

/// Collect, per workspace name, the titles of the windows it contains.
fn workspace_titles(node: &TreeNode, titles: &mut HashMap<String, Vec<String>>) {
    if node.node_type == "workspace" {
        if let Some(name) = &node.name {
            let mut collected = Vec::new();
            collect_leaf_titles(node, &mut collected);
            titles.insert(name.clone(), collected);
        }
        return;
    }
    for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
        workspace_titles(child, titles);
    }
}

fn collect_leaf_titles(node: &TreeNode, out: &mut Vec<String>) {
    for child in node.nodes.iter().chain(node.floating_nodes.iter()) {
        if child.nodes.is_empty() && child.floating_nodes.is_empty() {
            if let Some(name) = &child.name {
                out.push(name.clone());
            }
        } else {
            collect_leaf_titles(child, out);
        }
    }
}

//  WindowManager implementation

impl WindowManager for I3Wm {
    type Error = I3WmError;

    fn outputs(&self) -> Result<Vec<OutputInfo>, Self::Error> {
        let body = self.request(ipc::GET_OUTPUTS, "")?;
        let outputs: Vec<OutputJson> = serde_json::from_str(&body)?;
        Ok(outputs
            .into_iter()
            .map(|o| OutputInfo {
                name: o.name,
                active: o.active,
                primary: o.primary,
                x: o.rect.x,
                y: o.rect.y,
            })
            .collect())
    }

    fn workspaces(&self) -> Result<Vec<WorkspaceInfo>, Self::Error> {
        let body = self.request(ipc::GET_WORKSPACES, "")?;
        let workspaces: Vec<WorkspaceJson> = serde_json::from_str(&body)?;
        let tree_body = self.request(ipc::GET_TREE, "")?;
        let tree: TreeNode = serde_json::from_str(&tree_body)?;
        let mut titles = HashMap::new();
        workspace_titles(&tree, &mut titles);
        Ok(workspaces
            .into_iter()
            .map(|w| {
                let window_titles = titles.remove(&w.name).unwrap_or_default();
                WorkspaceInfo {
                    sort_key: if w.num >= 0 { Some(w.num) } else { None },
                    name: w.name,
                    output: w.output,
                    focused: w.focused,
                    visible: w.visible,
                    window_titles,
                }
            })
            .collect())
    }

    fn rename_workspace(&self, old: &str, new: &str) -> Result<(), Self::Error> {
        if old == new {
            return Ok(());
        }
        self.run_command(&format!(
            "rename workspace {} to {}",
            quote(old),
            quote(new)
        ))
    }

    fn focus_workspace(&self, name: &str, auto_back_and_forth: bool) -> Result<(), Self::Error> {
        let options = if auto_back_and_forth {
            ""
        } else {
            "--no-auto-back-and-forth "
        };
        self.run_command(&format!("workspace {}{}", options, quote(name)))
    }

    fn move_focused_to(&self, name: &str) -> Result<(), Self::Error> {
        self.run_command(&format!("move container to workspace {}", quote(name)))
    }

    fn subscribe(&self, on_event: &mut dyn FnMut(WorkspaceEvent)) -> Result<(), Self::Error> {
        // Events need their own connection; replies and events would
        // otherwise interleave with requests.
        let mut connection = Connection::connect()?;
        connection.send(ipc::SUBSCRIBE, "[\"workspace\"]")?;
        let (_, body) = connection.recv()?;
        let reply: SubscribeReply = serde_json::from_str(&body)?;
        if !reply.success {
            return Err(I3WmError("subscription rejected".to_string()));
        }
        loop {
            let (message_type, body) = connection.recv()?;
            if message_type & ipc::EVENT_BIT == 0
                || message_type & !ipc::EVENT_BIT != ipc::WORKSPACE_EVENT
            {
                continue;
            }
            let event: WorkspaceEventJson = serde_json::from_str(&body)?;
            on_event(WorkspaceEvent {
                change: WorkspaceChange::from_change(&event.change),
                workspace: event.current.and_then(|node| node.name),
            });
        }
    }
}
