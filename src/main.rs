mod builtin;
mod config;
mod eval;
mod global;
mod input;
mod parser;
mod reaper;
mod redirect;
mod status;
mod types;

use std::env;
use std::io;
use std::io::Write;
use std::process;

use clap::Parser;

use input::{LineReader, ReadOutcome};

const PROMPT_NAME: &str = "pipesh";

fn prompt() -> String {
	let cwd = env::current_dir().ok();
	let dir = cwd.as_ref()
		.and_then(|p| p.file_name().or_else(|| Some(p.as_os_str())))
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_default();
	format!("{} {}> ", PROMPT_NAME, dir)
}

fn run(state: &mut global::State, reader: &mut LineReader<std::fs::File>) -> io::Result<()> {
	let mut stdout = io::stdout();
	loop {
		state.flush_status();

		let _ = stdout.write_all(prompt().as_bytes());
		let _ = stdout.flush();

		let buf = match reader.read_line(&mut state.reaper, &mut state.status)? {
			ReadOutcome::Line(buf) => buf,
			ReadOutcome::Interrupted => {
				let _ = writeln!(stdout);
				continue;
			},
			ReadOutcome::Eof => {
				let _ = writeln!(stdout);
				return Ok(());
			},
		};
		if parser::is_blank(&buf) {
			continue;
		}

		let line = match parser::parse(&buf) {
			Ok(line) => line,
			Err(e) => {
				global::report(format_args!("Parse error: {}", e));
				continue;
			},
		};
		log::debug!("parsed {:?}", line);
		if state.config.verbose {
			let _ = line.dump(&mut io::stderr());
		}

		if line.is_exit() {
			return Ok(());
		}
		eval::eval_line(&line, &mut state.status);
	}
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::new().filter("PIPESH_LOG")).init();
	let config = config::Config::parse();

	let setup = global::State::new(config).and_then(|state| LineReader::stdin().map(|reader| (state, reader)));
	let (mut state, mut reader) = match setup {
		Ok(r) => r,
		Err(e) => {
			global::report(format_args!("Failed to initialize: {}", e));
			process::exit(1);
		},
	};

	if let Err(e) = run(&mut state, &mut reader) {
		global::report(format_args!("Failed to read command line: {}", e));
		process::exit(1);
	}
}
