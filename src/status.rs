use std::fmt::Write;
use std::mem;

use nix::sys::wait::WaitStatus;

pub const DEFAULT_CAPACITY: usize = 4096;

/// Upper bound on the length of one report line, newline included.
pub const LINE_MAX: usize = 64;

/// The smallest capacity that still leaves room for one asynchronous and one foreground report.
pub const MIN_CAPACITY: usize = 4 * LINE_MAX;

pub trait WaitStatusExt {
	fn is_terminated(self) -> bool;
}

impl WaitStatusExt for WaitStatus {
	fn is_terminated(self) -> bool {
		matches!(self, WaitStatus::Exited(..) | WaitStatus::Signaled(..))
	}
}

/// Termination reports waiting to be shown before the next prompt.
#[derive(Debug)]
pub struct StatusLog {
	buf: String,
	capacity: usize,
}

impl StatusLog {
	pub fn with_capacity(capacity: usize) -> StatusLog {
		StatusLog { buf: String::with_capacity(capacity), capacity: capacity }
	}

	pub fn remaining(&self) -> usize {
		self.capacity - self.buf.len()
	}

	/// Whether the reaper may collect one more child. A line's worth of room is
	/// always kept back for the foreground stage of the running line.
	pub fn has_room_for_async(&self) -> bool {
		self.remaining() >= 2 * LINE_MAX
	}

	/// Appends the report for a terminated process. Returns false when the
	/// status is not a termination or the line does not fit.
	pub fn record(&mut self, status: WaitStatus) -> bool {
		let mut line = String::with_capacity(LINE_MAX);
		let _ = match status {
			WaitStatus::Exited(pid, code) => writeln!(line, "PID {} finished with exit status {}", pid, code),
			WaitStatus::Signaled(pid, signal, _) => writeln!(line, "PID {} finished with signal {}", pid, signal as i32),
			_ => { return false; },
		};
		if line.len() > self.remaining() {
			log::warn!("status buffer full, dropping report: {}", line.trim_end());
			return false;
		}
		self.buf.push_str(&line);
		true
	}

	pub fn is_empty(&self) -> bool {
		self.buf.is_empty()
	}

	/// Hands out everything recorded so far and leaves the log empty.
	pub fn take(&mut self) -> String {
		mem::replace(&mut self.buf, String::with_capacity(self.capacity))
	}
}

impl Default for StatusLog {
	fn default() -> StatusLog {
		StatusLog::with_capacity(DEFAULT_CAPACITY)
	}
}
