//! Decides where each spawned stage reads from and writes to.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::ffi::OsStrExt;

use crate::types::Line;

const NULL_DEVICE: &str = "/dev/null";

/// Position of a spawned stage among the spawned stages of a line.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Position {
	pub is_first: bool,
	pub is_last: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Source<'a> {
	Inherit,
	Pipe,
	File(&'a [u8]),
	Null,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Sink<'a> {
	Inherit,
	Pipe,
	File { path: &'a [u8], append: bool },
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Redirection<'a> {
	pub stdin: Source<'a>,
	pub stdout: Sink<'a>,
}

pub fn resolve<'a>(position: Position, line: &Line<'a>) -> Redirection<'a> {
	let stdin = if !position.is_first {
		Source::Pipe
	} else if let Some(path) = line.input {
		Source::File(path)
	} else if line.is_background {
		// a background job must not read from the terminal
		Source::Null
	} else {
		Source::Inherit
	};
	let stdout = if !position.is_last {
		Sink::Pipe
	} else if let Some(path) = line.output {
		Sink::File { path: path, append: line.is_append }
	} else {
		Sink::Inherit
	};
	Redirection { stdin: stdin, stdout: stdout }
}

impl<'a> Source<'a> {
	/// Opens the file backing this source. Pipes and the inherited stream have none.
	pub fn open(&self) -> Option<io::Result<fs::File>> {
		match *self {
			Source::File(path) => Some(fs::File::open(OsStr::from_bytes(path))),
			Source::Null => Some(fs::File::open(NULL_DEVICE)),
			Source::Inherit | Source::Pipe => None,
		}
	}
}

impl<'a> Sink<'a> {
	pub fn open(&self) -> Option<io::Result<fs::File>> {
		match *self {
			Sink::File { path, append } => {
				let mut oopt = fs::OpenOptions::new();
				let _ = if append {
					oopt.append(true).create(true)
				} else {
					oopt.write(true).create(true).truncate(true)
				};
				Some(oopt.open(OsStr::from_bytes(path)))
			},
			Sink::Inherit | Sink::Pipe => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Command;
	use std::io::{Read, Write};

	const ONLY: Position = Position { is_first: true, is_last: true };
	const HEAD: Position = Position { is_first: true, is_last: false };
	const MIDDLE: Position = Position { is_first: false, is_last: false };
	const TAIL: Position = Position { is_first: false, is_last: true };

	fn line<'a>(input: Option<&'a [u8]>, output: Option<&'a [u8]>, is_background: bool) -> Line<'a> {
		Line {
			commands: vec![Command { args: vec![&b"cat"[..]] }],
			input: input,
			output: output,
			is_append: false,
			is_background: is_background,
		}
	}

	#[test]
	fn plain_foreground_inherits() {
		let l = line(None, None, false);
		assert_eq!(resolve(ONLY, &l), Redirection { stdin: Source::Inherit, stdout: Sink::Inherit });
	}

	#[test]
	fn pipeline_ends() {
		let l = line(Some(&b"in"[..]), Some(&b"out"[..]), false);
		assert_eq!(resolve(HEAD, &l), Redirection { stdin: Source::File(b"in"), stdout: Sink::Pipe });
		assert_eq!(resolve(MIDDLE, &l), Redirection { stdin: Source::Pipe, stdout: Sink::Pipe });
		assert_eq!(resolve(TAIL, &l), Redirection {
			stdin: Source::Pipe,
			stdout: Sink::File { path: b"out", append: false },
		});
	}

	#[test]
	fn background_reads_null_only_at_head_without_input() {
		let l = line(None, None, true);
		assert_eq!(resolve(HEAD, &l).stdin, Source::Null);
		assert_eq!(resolve(MIDDLE, &l).stdin, Source::Pipe);
		assert_eq!(resolve(TAIL, &l).stdin, Source::Pipe);

		let l = line(Some(&b"in"[..]), None, true);
		assert_eq!(resolve(ONLY, &l).stdin, Source::File(b"in"));
	}

	#[test]
	fn append_flag_reaches_sink() {
		let mut l = line(None, Some(&b"log"[..]), false);
		l.is_append = true;
		assert_eq!(resolve(ONLY, &l).stdout, Sink::File { path: b"log", append: true });
	}

	#[test]
	fn null_source_is_empty() {
		let mut file = Source::Null.open().unwrap().unwrap();
		let mut buf = vec![];
		assert_eq!(file.read_to_end(&mut buf).unwrap(), 0);
		assert!(Source::Inherit.open().is_none());
		assert!(Source::Pipe.open().is_none());
	}

	#[test]
	fn missing_input_fails_to_open() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing");
		let source = Source::File(path.as_os_str().as_bytes());
		assert_eq!(source.open().unwrap().unwrap_err().kind(), io::ErrorKind::NotFound);
	}

	#[test]
	fn sink_truncates_or_appends() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("out");
		let bytes = path.as_os_str().as_bytes();

		for _ in 0..2 {
			let mut f = Sink::File { path: bytes, append: true }.open().unwrap().unwrap();
			f.write_all(b"ab").unwrap();
		}
		assert_eq!(fs::read(&path).unwrap(), b"abab");

		let mut f = Sink::File { path: bytes, append: false }.open().unwrap().unwrap();
		f.write_all(b"c").unwrap();
		drop(f);
		assert_eq!(fs::read(&path).unwrap(), b"c");
	}
}
