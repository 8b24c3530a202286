use clap::Parser;

use crate::status;

#[derive(Debug, Parser)]
#[command(name = "pipesh", version, about = "A small interactive shell with pipes, redirections and background jobs.")]
pub struct Config {
	/// Print the structure of every parsed command line to stderr.
	#[arg(short, long)]
	pub verbose: bool,

	/// Size in bytes of the buffer holding process termination reports.
	#[arg(long, value_name = "BYTES", default_value_t = status::DEFAULT_CAPACITY, value_parser = parse_capacity)]
	pub status_capacity: usize,
}

fn parse_capacity(s: &str) -> Result<usize, String> {
	let n: usize = s.parse().map_err(|e| format!("{}", e))?;
	if n < status::MIN_CAPACITY {
		return Err(format!("must be at least {}", status::MIN_CAPACITY));
	}
	Ok(n)
}
