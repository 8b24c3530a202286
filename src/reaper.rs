//! Collection of children that terminate while the shell is not waiting on them.
//!
//! The SIGCHLD handler only writes a byte into a socket; the read end is polled
//! by the read-eval loop, which then calls [`Reaper::reap`] in normal context.

use std::io;
use std::io::Read;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use signal_hook::consts::SIGCHLD;
use signal_hook::low_level;
use signal_hook::SigId;

use crate::status::StatusLog;

#[derive(Debug)]
pub struct Reaper {
	wakeup: UnixStream,
	sig_id: SigId,
}

impl Reaper {
	pub fn install() -> io::Result<Reaper> {
		let (read, write) = UnixStream::pair()?;
		read.set_nonblocking(true)?;
		write.set_nonblocking(true)?;
		let sig_id = low_level::pipe::register(SIGCHLD, write)?;
		Ok(Reaper { wakeup: read, sig_id: sig_id })
	}

	fn drain_wakeups(&mut self) {
		let mut buf = [0u8; 64];
		loop {
			match self.wakeup.read(&mut buf) {
				Ok(0) => { break; },
				Ok(_) => {},
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {},
				Err(_) => { break; },
			}
		}
	}

	/// Collects every child that has already terminated, without blocking.
	/// Stops early when the log is nearly full; the rest stay collectible.
	pub fn reap(&mut self, status: &mut StatusLog) -> usize {
		self.drain_wakeups();
		let mut reaped = 0;
		while status.has_room_for_async() {
			match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => { break; },
				Err(Errno::EINTR) => {},
				Ok(s) => {
					log::debug!("reaped {:?}", s);
					if status.record(s) {
						reaped += 1;
					}
				},
				Err(e) => {
					log::warn!("waitpid failed: {}", e);
					break;
				},
			}
		}
		reaped
	}
}

impl AsFd for Reaper {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.wakeup.as_fd()
	}
}

impl Drop for Reaper {
	fn drop(&mut self) {
		low_level::unregister(self.sig_id);
	}
}
