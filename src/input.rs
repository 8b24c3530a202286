use std::fs::File;
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::os::fd::AsFd;
use std::os::unix::net::UnixStream;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use signal_hook::consts::SIGINT;
use signal_hook::low_level;
use signal_hook::SigId;

use crate::reaper::Reaper;
use crate::status::StatusLog;

#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
	Line(Vec<u8>),
	/// SIGINT arrived before a full line was available.
	Interrupted,
	Eof,
}

/// Reads command lines while servicing child terminations.
///
/// SIGINT is caught so that it never kills the shell; it only cuts short the
/// wait for the next line. Like SIGCHLD, it is delivered as a byte on a socket
/// that is polled together with the input, so no signal can slip in between
/// checking for it and blocking.
pub struct LineReader<R> {
	reader: BufReader<R>,
	interrupt: UnixStream,
	sig_id: SigId,
}

impl LineReader<File> {
	pub fn stdin() -> io::Result<LineReader<File>> {
		let fd = io::stdin().as_fd().try_clone_to_owned()?;
		LineReader::new(File::from(fd))
	}
}

fn drain(stream: &mut UnixStream) -> bool {
	let mut buf = [0u8; 16];
	let mut seen = false;
	loop {
		match stream.read(&mut buf) {
			Ok(0) => { return seen; },
			Ok(_) => { seen = true; },
			Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {},
			Err(_) => { return seen; },
		}
	}
}

impl<R: io::Read + AsFd> LineReader<R> {
	pub fn new(inner: R) -> io::Result<LineReader<R>> {
		let (read, write) = UnixStream::pair()?;
		read.set_nonblocking(true)?;
		write.set_nonblocking(true)?;
		let sig_id = low_level::pipe::register(SIGINT, write)?;
		Ok(LineReader { reader: BufReader::new(inner), interrupt: read, sig_id: sig_id })
	}

	/// Blocks until the input is readable, handing reaper wake-ups to the reaper.
	/// Returns false when SIGINT arrived first.
	fn wait_readable(&mut self, reaper: &mut Reaper, status: &mut StatusLog) -> io::Result<bool> {
		loop {
			let (input_ready, wakeup_ready, interrupt_ready) = {
				let mut fds = [
					PollFd::new(self.reader.get_ref().as_fd(), PollFlags::POLLIN),
					PollFd::new(reaper.as_fd(), PollFlags::POLLIN),
					PollFd::new(self.interrupt.as_fd(), PollFlags::POLLIN),
				];
				match poll(&mut fds, PollTimeout::NONE) {
					Ok(_) => {},
					Err(Errno::EINTR) => { continue; },
					Err(e) => { return Err(e.into()); },
				}
				let ready = |fd: &PollFd| fd.revents().map_or(false, |r| !r.is_empty());
				(ready(&fds[0]), ready(&fds[1]), ready(&fds[2]))
			};
			if wakeup_ready {
				reaper.reap(status);
			}
			if interrupt_ready && drain(&mut self.interrupt) {
				return Ok(false);
			}
			if input_ready {
				return Ok(true);
			}
		}
	}

	/// Reads up to and including the next newline. Each read follows a poll, so
	/// a partial line never blocks the reaper or SIGINT. An interrupted partial
	/// line is discarded.
	pub fn read_line(&mut self, reaper: &mut Reaper, status: &mut StatusLog) -> io::Result<ReadOutcome> {
		// interrupts from before this prompt do not count
		drain(&mut self.interrupt);
		let mut line: Vec<u8> = vec![];
		loop {
			if self.reader.buffer().is_empty() && !self.wait_readable(reaper, status)? {
				return Ok(ReadOutcome::Interrupted);
			}
			let available = match self.reader.fill_buf() {
				Ok(buf) => buf,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => { continue; },
				Err(e) => { return Err(e); },
			};
			if available.is_empty() {
				return Ok(if line.is_empty() { ReadOutcome::Eof } else { ReadOutcome::Line(line) });
			}
			let taken = match available.iter().position(|&c| c == b'\n') {
				Some(i) => i + 1,
				None => available.len(),
			};
			line.extend_from_slice(&available[.. taken]);
			self.reader.consume(taken);
			if line.last() == Some(&b'\n') {
				return Ok(ReadOutcome::Line(line));
			}
		}
	}
}

impl<R> Drop for LineReader<R> {
	fn drop(&mut self) {
		low_level::unregister(self.sig_id);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serial_test::serial;
	use std::io::Write;
	use std::process;
	use std::thread;
	use std::time::Duration;

	#[test]
	#[serial]
	fn reads_buffered_lines_then_eof() {
		let (theirs, mut ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		ours.write_all(b"ls\necho hi").unwrap();
		drop(ours);
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Line(b"ls\n".to_vec()));
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Line(b"echo hi".to_vec()));
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Eof);
	}

	#[test]
	#[serial]
	fn reaps_while_waiting() {
		let (theirs, mut ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		let pid = process::Command::new("true").spawn().unwrap().id();
		let writer = thread::spawn(move || {
			thread::sleep(Duration::from_millis(300));
			ours.write_all(b"next\n").unwrap();
		});
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Line(b"next\n".to_vec()));
		writer.join().unwrap();
		assert!(log.take().contains(&format!("PID {} finished with exit status 0", pid)));
	}

	#[test]
	#[serial]
	fn partial_line_does_not_block_reaping() {
		let (theirs, mut ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		ours.write_all(b"ec").unwrap();
		let writer = thread::spawn(move || {
			thread::sleep(Duration::from_millis(100));
			let pid = process::Command::new("true").spawn().unwrap().id();
			thread::sleep(Duration::from_millis(400));
			ours.write_all(b"ho\n").unwrap();
			pid
		});
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Line(b"echo\n".to_vec()));
		let pid = writer.join().unwrap();
		assert!(log.take().contains(&format!("PID {} finished with exit status 0", pid)));
	}

	#[test]
	#[serial]
	fn sigint_discards_partial_line() {
		let (theirs, mut ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		ours.write_all(b"half").unwrap();
		thread::spawn(move || {
			thread::sleep(Duration::from_millis(300));
			low_level::raise(SIGINT).unwrap();
		});
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Interrupted);
		ours.write_all(b"next\n").unwrap();
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Line(b"next\n".to_vec()));
	}

	#[test]
	#[serial]
	fn sigint_before_the_wait_is_not_lost() {
		let (theirs, _ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		// arrives after the stale interrupts were cleared but before poll
		low_level::raise(SIGINT).unwrap();
		assert!(!reader.wait_readable(&mut reaper, &mut log).unwrap());
	}

	#[test]
	#[serial]
	fn sigint_interrupts_wait() {
		let (theirs, _ours) = UnixStream::pair().unwrap();
		let mut reader = LineReader::new(theirs).unwrap();
		let mut reaper = Reaper::install().unwrap();
		let mut log = StatusLog::default();

		let target = nix::sys::pthread::pthread_self();
		let killer = thread::spawn(move || {
			thread::sleep(Duration::from_millis(300));
			nix::sys::pthread::pthread_kill(target, nix::sys::signal::Signal::SIGINT).unwrap();
		});
		assert_eq!(reader.read_line(&mut reaper, &mut log).unwrap(), ReadOutcome::Interrupted);
		killer.join().unwrap();
	}
}
