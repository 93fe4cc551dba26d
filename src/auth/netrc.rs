//! Minimal per-host credentials file reader, modeled on the traditional
//! `.netrc` `machine / login / password` triple. No crate in the dependency
//! graph parses this format, so it is hand-rolled here; the grammar handled
//! is deliberately small (whitespace-separated tokens, `machine` blocks).

use std::path::Path;

/// A single `login`/`password` pair read for a `machine` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetrcEntry {
    pub login: String,
    pub password: String,
}

/// Looks up the entry for `machine` in the credentials file at `path`.
/// Returns `None` if the file does not exist or has no matching entry.
pub fn lookup(path: &Path, machine: &str) -> Option<NetrcEntry> {
    let contents = std::fs::read_to_string(path).ok()?;
    lookup_str(&contents, machine)
}

fn lookup_str(contents: &str, machine: &str) -> Option<NetrcEntry> {
    let tokens: Vec<&str> = contents.split_whitespace().collect();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == "machine" && i + 1 < tokens.len() {
            let candidate = tokens[i + 1];
            let mut login = None;
            let mut password = None;
            let mut j = i + 2;
            while j + 1 < tokens.len() && tokens[j] != "machine" {
                match tokens[j] {
                    "login" => login = Some(tokens[j + 1]),
                    "password" => password = Some(tokens[j + 1]),
                    _ => {}
                }
                j += 2;
            }
            if candidate == machine {
                if let (Some(login), Some(password)) = (login, password) {
                    return Some(NetrcEntry {
                        login: login.to_string(),
                        password: password.to_string(),
                    });
                }
                return None;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    None
}

/// The default credentials file path, `~/.cdsetool.netrc`.
pub fn default_path() -> Option<std::path::PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(".cdsetool.netrc"))
}
