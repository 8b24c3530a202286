use std::fmt;
use std::io;
use std::io::Write;

use crate::config::Config;
use crate::reaper::Reaper;
use crate::status::StatusLog;

pub struct State {
	pub config: Config,
	pub status: StatusLog,
	pub reaper: Reaper,
}

impl State {
	pub fn new(config: Config) -> io::Result<State> {
		let status = StatusLog::with_capacity(config.status_capacity);
		let reaper = Reaper::install()?;
		Ok(State { config: config, status: status, reaper: reaper })
	}

	/// Collects finished children and prints their reports in a single write.
	pub fn flush_status(&mut self) {
		self.reaper.reap(&mut self.status);
		if !self.status.is_empty() {
			let report = self.status.take();
			let mut stderr = io::stderr();
			let _ = stderr.write_all(report.as_bytes());
			let _ = stderr.flush();
		}
	}
}

/// Prints a one line diagnostic to stderr.
pub fn report<D: fmt::Display>(diagnostic: D) {
	let _ = writeln!(&mut io::stderr(), "{}", diagnostic);
}
