use std::io;
use std::io::Write;

#[derive(Debug, PartialEq, Eq)]
pub struct Command<'a> {
	pub args: Vec<&'a [u8]>,
}

impl<'a> Command<'a> {
	pub fn name(&self) -> &'a [u8] {
		self.args[0]
	}
}

#[derive(Debug, PartialEq, Eq)]
pub struct Line<'a> {
	pub commands: Vec<Command<'a>>,
	pub input: Option<&'a [u8]>,
	pub output: Option<&'a [u8]>,
	pub is_append: bool,
	pub is_background: bool,
}

fn yes_no(b: bool) -> &'static str {
	if b { "Y" } else { "N" }
}

impl<'a> Line<'a> {
	pub fn is_exit(&self) -> bool {
		self.commands.len() == 1 && self.commands[0].args == [&b"exit"[..]]
	}

	/// Writes a human readable description of the line structure.
	pub fn dump<W: Write>(&self, w: &mut W) -> io::Result<()> {
		writeln!(w, "Command line:")?;
		writeln!(w, "\tNumber of commands: {}", self.commands.len())?;
		for (i, command) in self.commands.iter().enumerate() {
			writeln!(w, "\t\tCommand #{}:", i)?;
			writeln!(w, "\t\t\tNumber of args: {}", command.args.len())?;
			write!(w, "\t\t\tArgs:")?;
			for arg in &command.args {
				write!(w, " \"{}\"", String::from_utf8_lossy(arg))?;
			}
			writeln!(w)?;
		}
		writeln!(w, "\tRedirection of input: {}", yes_no(self.input.is_some()))?;
		if let Some(input) = self.input {
			writeln!(w, "\t\tFilename: '{}'", String::from_utf8_lossy(input))?;
		}
		writeln!(w, "\tRedirection of output: {}", yes_no(self.output.is_some()))?;
		if let Some(output) = self.output {
			writeln!(w, "\t\tFilename: '{}'", String::from_utf8_lossy(output))?;
			writeln!(w, "\t\tMode: {}", if self.is_append { "APPEND" } else { "TRUNC" })?;
		}
		writeln!(w, "\tBackground: {}", yes_no(self.is_background))
	}
}
