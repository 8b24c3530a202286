use std::env;
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use nix::unistd::{self, User};
use thiserror::Error;

use crate::global;
use crate::types::Command;

pub type Builtin = fn(&Command) -> u8;

#[derive(Debug, Error)]
pub enum CdError {
	#[error("Error while reading the HOME environment variable")]
	HomeUnset,
	#[error("User {0} does not exist")]
	UnknownUser(String),
	#[error("Failed to look up user {user}: {source}")]
	UserLookup { user: String, source: nix::Error },
	#[error("Failed to set working directory to {}: {source}", .path.display())]
	Chdir { path: PathBuf, source: nix::Error },
}

fn home_dir() -> Result<PathBuf, CdError> {
	match env::var_os("HOME") {
		Some(home) => Ok(PathBuf::from(home)),
		None => Err(CdError::HomeUnset),
	}
}

fn user_home_dir(name: &[u8]) -> Result<PathBuf, CdError> {
	let user = String::from_utf8_lossy(name).into_owned();
	match User::from_name(&user) {
		Ok(Some(u)) => Ok(u.dir),
		Ok(None) => Err(CdError::UnknownUser(user)),
		Err(e) => Err(CdError::UserLookup { user: user, source: e }),
	}
}

/// Expands a bare `~` or a leading `~user`. Anything else, `~/dir` included,
/// is returned as is.
pub fn resolve_dir(arg: &[u8]) -> Result<PathBuf, CdError> {
	if arg == b"~" {
		return home_dir();
	}
	let rest = match arg.strip_prefix(b"~") {
		Some(rest) if !rest.is_empty() && rest[0] != b'/' => rest,
		_ => { return Ok(PathBuf::from(OsStr::from_bytes(arg))); },
	};
	let (name, tail) = match rest.iter().position(|&c| c == b'/') {
		Some(i) => (&rest[.. i], &rest[i + 1 ..]),
		None => (rest, &b""[..]),
	};
	let mut dir = user_home_dir(name)?;
	if !tail.is_empty() {
		dir.push(OsStr::from_bytes(tail));
	}
	Ok(dir)
}

pub fn change_dir(arg: &[u8]) -> Result<(), CdError> {
	let path = resolve_dir(arg)?;
	log::debug!("chdir {}", path.display());
	unistd::chdir(path.as_path()).map_err(|e| CdError::Chdir { path: path, source: e })
}

pub fn builtin_cd(command: &Command) -> u8 {
	match change_dir(command.args[1]) {
		Ok(()) => 0,
		Err(e) => {
			global::report(e);
			1
		},
	}
}

pub fn match_builtin(command: &Command) -> Option<Builtin> {
	match (command.name(), command.args.len()) {
		(b"cd", 2) => Some(builtin_cd as Builtin),
		_ => None,
	}
}
