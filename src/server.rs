//! The local command server.
//!
//! Process startup and the window-manager IPC handshake dominate the
//! latency of every invocation, which hurts when commands run on every
//! keypress.  The server keeps one [`Controller`] with a warm
//! window-manager connection behind a unix socket; short-lived clients
//! send their argv and read the response.
//!
//! # Wire format
//!
//! A request is the command's argv tokens joined by `\n`, after which the
//! client shuts down its write side.  The response is the command's
//! textual output, or a single line starting with `error:` which the
//! client maps to a non-zero exit.
//!
//! Connections are served strictly sequentially, never concurrently: every
//! plan is computed against a window-manager snapshot that an interleaved
//! mutation would invalidate, so sequential dispatch is what makes
//! concurrent clients safe.

use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::command::{Cli, Command};
use crate::controller::Controller;
use crate::traits::WindowManager;

use clap::Parser;

/// Environment variable overriding the socket path, honored by both the
/// server and the client.
pub const SOCKET_ENV: &str = "I3GRP_SOCKET";

/// A request larger than this is rejected outright.
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// A client that connects but never finishes its request is dropped after
/// this long instead of occupying the server forever.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Default socket path, namespaced by display session so sessions do not
/// collide.
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(SOCKET_ENV) {
        return PathBuf::from(path);
    }
    let runtime = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into());
    let display = std::env::var("DISPLAY")
        .or_else(|_| std::env::var("WAYLAND_DISPLAY"))
        .unwrap_or_else(|_| "default".into());
    let display: String = display.chars().filter(|c| *c != ':' && *c != '/').collect();
    PathBuf::from(format!("{}/i3grp-{}.sock", runtime, display))
}

/// Errors produced by the command server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Serves commands over a unix socket, one connection at a time.
pub struct CommandServer<W: WindowManager> {
    path: PathBuf,
    controller: Controller<W>,
}

impl<W: WindowManager> CommandServer<W> {
    /// Create a server bound to `path` once [`run`](Self::run) is called.
    pub fn new(path: impl AsRef<Path>, controller: Controller<W>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            controller,
        }
    }

    /// The filesystem path of the socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bind the socket and serve connections forever.
    ///
    /// This method **blocks**; the accept loop only ends on a bind error.
    pub fn run(&self) -> Result<(), ServerError> {
        // Remove stale socket if present.
        let _ = std::fs::remove_file(&self.path);

        let listener = UnixListener::bind(&self.path)?;
        info!("listening on {}", self.path.display());

        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(e) = self.handle_connection(stream) {
                        error!("connection error: {}", e);
                    }
                }
                Err(e) => {
                    error!("accept error: {}", e);
                }
            }
        }
        Ok(())
    }

    /// Read one full request, dispatch it, write the response.
    fn handle_connection(&self, mut stream: UnixStream) -> std::io::Result<()> {
        debug!("client connected");
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        let mut request = Vec::new();
        (&mut stream)
            .take(MAX_REQUEST_BYTES as u64 + 1)
            .read_to_end(&mut request)?;
        let response = if request.len() > MAX_REQUEST_BYTES {
            warn!("rejecting oversized request ({} bytes read)", request.len());
            "error:request too long".to_string()
        } else {
            self.dispatch(&request)
        };
        stream.write_all(response.as_bytes())?;
        debug!("client served");
        Ok(())
    }

    fn dispatch(&self, request: &[u8]) -> String {
        let text = match std::str::from_utf8(request) {
            Ok(text) => text,
            Err(_) => return "error:request is not valid utf-8".to_string(),
        };
        let argv: Vec<&str> = text.split('\n').filter(|token| !token.is_empty()).collect();
        info!("argv from client: {:?}", argv);
        let cli = match Cli::try_parse_from(std::iter::once("i3grp").chain(argv)) {
            Ok(cli) => cli,
            Err(e)
                if e.kind() == clap::error::ErrorKind::DisplayHelp
                    || e.kind() == clap::error::ErrorKind::DisplayVersion =>
            {
                return e.to_string();
            }
            Err(e) => {
                let message = e.to_string();
                let first_line = message.lines().next().unwrap_or("invalid arguments");
                warn!("failed parsing client command: {}", first_line);
                return format!("error:failed parsing command: {}", first_line);
            }
        };
        if matches!(cli.command, Command::Server { .. }) {
            warn!("ignoring nested server command");
            return "error:nested server command".to_string();
        }
        match self.controller.run(&cli.command) {
            Ok(output) => output,
            Err(e) => format!("error:{}", e),
        }
    }
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::names;
    use crate::traits::{OutputInfo, WorkspaceEvent, WorkspaceInfo};
    use std::net::Shutdown;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    /// Monotonic counter to generate unique socket paths per test.
    static TEST_ID: AtomicU32 = AtomicU32::new(0);

    /// Helper: create a unique temporary socket path for each test.
    fn tmp_socket_path() -> PathBuf {
        let id = TEST_ID.fetch_add(1, Ordering::SeqCst);
        std::env::temp_dir().join(format!("i3grp-test-{}-{}.sock", std::process::id(), id))
    }

    //  Mock WindowManager shared with the server thread

    #[derive(Debug, Clone, Default)]
    struct SharedState {
        workspaces: Vec<WorkspaceInfo>,
        renames: Vec<(String, String)>,
    }

    #[derive(Debug, Clone)]
    struct MockWm {
        state: Arc<Mutex<SharedState>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl MockWm {
        fn with_workspaces(raw_names: &[&str], focused: &str) -> Self {
            let workspaces = raw_names
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
            Self {
                state: Arc::new(Mutex::new(SharedState {
                    workspaces,
                    renames: Vec::new(),
                })),
            }
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, SharedState> {
            self.state.lock().expect("mock state poisoned")
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
            Ok(self.lock().workspaces.clone())
        }

        fn rename_workspace(&self, old: &str, new: &str) -> Result<(), MockError> {
            let mut state = self.lock();
            state.renames.push((old.to_string(), new.to_string()));
            for workspace in state.workspaces.iter_mut() {
                if workspace.name == old {
                    workspace.name = new.to_string();
                    workspace.sort_key = names::parse_raw(new).global_number;
                }
            }
            Ok(())
        }

        fn focus_workspace(&self, name: &str, _auto_back_and_forth: bool) -> Result<(), MockError> {
            let mut state = self.lock();
            if !state.workspaces.iter().any(|w| w.name == name) {
                state.workspaces.push(WorkspaceInfo {
                    name: name.to_string(),
                    sort_key: names::parse_raw(name).global_number,
                    output: "eDP-1".to_string(),
                    ..WorkspaceInfo::default()
                });
            }
            for workspace in state.workspaces.iter_mut() {
                workspace.focused = workspace.name == name;
                workspace.visible = workspace.focused;
            }
            Ok(())
        }

        fn move_focused_to(&self, _name: &str) -> Result<(), MockError> {
            Ok(())
        }

        fn subscribe(&self, _on_event: &mut dyn FnMut(WorkspaceEvent)) -> Result<(), MockError> {
            Ok(())
        }
    }

    fn spawn_server(wm: MockWm) -> PathBuf {
        let path = tmp_socket_path();
        let server_path = path.clone();
        std::thread::spawn(move || {
            let controller = Controller::new(wm, Config::default(), false);
            let server = CommandServer::new(&server_path, controller);
            let _ = server.run();
        });
        // Give the server a moment to bind.
        std::thread::sleep(Duration::from_millis(150));
        path
    }

    fn send_request(path: &Path, argv: &[&str]) -> String {
        let mut stream = UnixStream::connect(path).expect("connect");
        stream.write_all(argv.join("\n").as_bytes()).unwrap();
        stream.shutdown(Shutdown::Write).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    #[test]
    fn serves_queries_over_the_socket() {
        let wm = MockWm::with_workspaces(&["1:a:1", "101:b:1"], "1:a:1");
        let path = spawn_server(wm);

        let response = send_request(&path, &["list-groups"]);
        assert_eq!(response, "a\nb");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn renders_errors_with_the_error_prefix() {
        let wm = MockWm::with_workspaces(&["1"], "1");
        let path = spawn_server(wm);

        let response = send_request(&path, &["assign-workspace-to-group", "bad:name"]);
        assert!(response.starts_with("error:"), "got: {:?}", response);

        let response = send_request(&path, &["no-such-command"]);
        assert!(
            response.starts_with("error:failed parsing command:"),
            "got: {:?}",
            response
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn rejects_nested_server_commands() {
        let wm = MockWm::with_workspaces(&["1"], "1");
        let path = spawn_server(wm);

        let response = send_request(&path, &["server"]);
        assert_eq!(response, "error:nested server command");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn sequential_clients_see_consistent_state() {
        // Two switches through one server: the second plan is computed
        // against the state the first one produced, equivalent to some
        // total order of the two calls.
        let wm = MockWm::with_workspaces(&["1:a:1", "101:b:1"], "1:a:1");
        let path = spawn_server(wm.clone());

        let first = send_request(&path, &["switch-active-group", "b"]);
        let second = send_request(&path, &["switch-active-group", "a"]);
        assert_eq!(first, "");
        assert_eq!(second, "");

        let state = wm.lock();
        assert_eq!(
            state.renames,
            vec![
                // switch to b
                ("101:b:1".to_string(), "1:b:1".to_string()),
                ("1:a:1".to_string(), "101:a:1".to_string()),
                // switch back to a
                ("101:a:1".to_string(), "1:a:1".to_string()),
                ("1:b:1".to_string(), "101:b:1".to_string()),
            ]
        );

        let _ = std::fs::remove_file(&path);
    }
}
