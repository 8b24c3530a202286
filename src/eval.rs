use std::ffi::{CString, NulError};
use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use thiserror::Error;

use crate::builtin::{self, Builtin};
use crate::global;
use crate::redirect::{self, Position, Redirection, Sink, Source};
use crate::status::{StatusLog, WaitStatusExt};
use crate::types::{Command, Line};

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("{0}")]
	Nix(#[from] nix::Error),
	#[error("argument contains a nul byte: {0}")]
	Nul(#[from] NulError),
}

/// One command of a line, either run inside the shell or as a child process.
#[derive(Debug)]
pub enum Stage<'l, 'a> {
	Builtin(Builtin, &'l Command<'a>),
	Spawned { command: &'l Command<'a>, position: Position },
}

/// Splits a line into stages. Builtins stay out of the pipe chain, so
/// positions only count the spawned stages.
pub fn plan<'l, 'a>(line: &'l Line<'a>) -> Vec<Stage<'l, 'a>> {
	let builtins: Vec<Option<Builtin>> = line.commands.iter().map(builtin::match_builtin).collect();
	let n_spawned = builtins.iter().filter(|b| b.is_none()).count();
	let mut spawned = 0;
	line.commands.iter().zip(builtins).map(|(command, matched)| match matched {
		Some(func) => Stage::Builtin(func, command),
		None => {
			spawned += 1;
			let position = Position { is_first: spawned == 1, is_last: spawned == n_spawned };
			Stage::Spawned { command: command, position: position }
		},
	}).collect()
}

fn lossy(s: &[u8]) -> String {
	String::from_utf8_lossy(s).into_owned()
}

fn opened(file: Option<io::Result<File>>, what: &str) -> Option<OwnedFd> {
	match file {
		Some(Ok(file)) => Some(OwnedFd::from(file)),
		Some(Err(e)) => {
			global::report(format_args!("{} redirection failed: {}", what, e));
			None
		},
		None => None,
	}
}

/// Moves `fd` onto `target` and closes the original.
fn bind(fd: OwnedFd, target: RawFd) -> nix::Result<()> {
	if fd.as_raw_fd() == target {
		let _ = fd.into_raw_fd();
		return Ok(());
	}
	unistd::dup2(fd.as_raw_fd(), target)?;
	Ok(())
}

/// Runs in the forked child: wires stdin and stdout, then replaces the image.
fn exec_stage(argv: &[CString], redirection: Redirection, pipe_in: Option<OwnedFd>, pipe_out: Option<OwnedFd>,
              is_background: bool) -> ! {
	// the shell runs with SIGPIPE ignored, which exec would otherwise carry over
	let _ = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) };
	if is_background {
		// descendants of a background job are left to the kernel to reap
		let _ = unsafe { signal(Signal::SIGCHLD, SigHandler::SigIgn) };
	}

	let stdin = match redirection.stdin {
		Source::Pipe => pipe_in,
		source => opened(source.open(), "Input"),
	};
	let stdout = match redirection.stdout {
		Sink::Pipe => pipe_out,
		sink => opened(sink.open(), "Output"),
	};
	for (fd, target) in [(stdin, libc::STDIN_FILENO), (stdout, libc::STDOUT_FILENO)] {
		if let Some(fd) = fd {
			if let Err(e) = bind(fd, target) {
				global::report(format_args!("dup2 failed: {}", e));
			}
		}
	}

	if let Err(e) = unistd::execvp(&argv[0], argv) {
		global::report(format_args!("execvp failed: {}: {}", argv[0].to_string_lossy(), e));
	}
	unsafe { libc::_exit(1) }
}

/// Forks one stage. The pipe ends handed over belong to the child from here
/// on; the parent's copies are closed before this returns.
fn spawn_stage(command: &Command, redirection: Redirection, pipe_in: Option<OwnedFd>, pipe_out: Option<OwnedFd>,
               is_background: bool) -> Result<Pid, ExecError> {
	let argv: Result<Vec<CString>, NulError> = command.args.iter().map(|&s| CString::new(s)).collect();
	let argv: Vec<CString> = argv?;

	match unsafe { unistd::fork() }? {
		ForkResult::Parent { child } => {
			log::debug!("spawned {} as {} ({:?})", lossy(command.name()), child, redirection);
			drop(pipe_in);
			drop(pipe_out);
			Ok(child)
		},
		ForkResult::Child => exec_stage(&argv, redirection, pipe_in, pipe_out, is_background),
	}
}

fn wait_foreground(pid: Pid, status: &mut StatusLog) -> Option<WaitStatus> {
	loop {
		match waitpid(pid, None) {
			Ok(s) if s.is_terminated() => {
				status.record(s);
				return Some(s);
			},
			Ok(_) | Err(Errno::EINTR) => {},
			Err(e) => {
				global::report(format_args!("waitpid failed: {}", e));
				return None;
			},
		}
	}
}

/// Runs every stage of `line`, threading a pipe between consecutive spawned
/// stages. Only the last stage of a foreground line is waited for; its status
/// is recorded and returned.
pub fn eval_line(line: &Line, status: &mut StatusLog) -> Option<WaitStatus> {
	let mut pipe_in: Option<OwnedFd> = None;
	let mut waited = None;
	for stage in plan(line) {
		match stage {
			Stage::Builtin(func, command) => {
				let s = func(command);
				log::debug!("builtin {} returned {}", lossy(command.name()), s);
			},
			Stage::Spawned { command, position } => {
				let (next_in, pipe_out) = if position.is_last {
					(None, None)
				} else {
					match unistd::pipe2(OFlag::O_CLOEXEC) {
						Ok((read, write)) => (Some(read), Some(write)),
						Err(e) => {
							global::report(format_args!("pipe failed: {}", e));
							return waited;
						},
					}
				};
				let redirection = redirect::resolve(position, line);
				match spawn_stage(command, redirection, pipe_in.take(), pipe_out, line.is_background) {
					Ok(pid) => {
						if position.is_last && !line.is_background {
							waited = wait_foreground(pid, status);
						}
					},
					Err(e) => {
						global::report(format_args!("Failed to spawn {}: {}", lossy(command.name()), e));
					},
				}
				pipe_in = next_in;
			},
		}
	}
	waited
}
