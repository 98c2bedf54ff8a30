//! Thin client forwarding its argv to a running `i3grp server`.
//!
//! Keybindings invoke this instead of `i3grp` itself to skip the
//! window-manager IPC handshake on every keypress.  The socket path can be
//! overridden with `$I3GRP_SOCKET`.

use i3grp::client;
use i3grp::server;

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = server::default_socket_path();
    match client::send_command(&path, &args) {
        Ok(response) => {
            if !response.is_empty() {
                println!("{}", response);
            }
            if response.starts_with("error:") {
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("{} (is `i3grp server` running?)", e);
            std::process::exit(1);
        }
    }
}
