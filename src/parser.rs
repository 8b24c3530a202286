use thiserror::Error;

use crate::types::*;

#[derive(Debug, PartialEq, Eq, Error)]
pub enum ParseError {
	#[error("empty command")]
	EmptyCommand,
	#[error("empty redirect after '{0}'")]
	EmptyRedirect(&'static str),
	#[error("input redirected more than once")]
	DuplicateInput,
	#[error("output redirected more than once")]
	DuplicateOutput,
	#[error("character after '&': '{0}'")]
	TrailingCharacter(char),
	#[error("unknown command separator: '{0}'")]
	UnknownSeparator(char),
}

type ParseResult<T> = Result<T, ParseError>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum RedirectType { Input, Output, Append }

impl RedirectType {
	fn symbol(self) -> &'static str {
		match self {
			RedirectType::Input => "<",
			RedirectType::Output => ">",
			RedirectType::Append => ">>",
		}
	}
}

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
	input: Option<&'a [u8]>,
	output: Option<&'a [u8]>,
	is_append: bool,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\r' | b'\n')
	}

	fn is_letter(c: u8) -> bool {
		match c {
			b'>' | b'<' | b'&' | b'|' => false,
			_ => !Parser::is_whitespace(c),
		}
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Parser::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(Parser::is_letter);
		&self.line[orig .. self.i]
	}

	/// Consumes one `<`, `>` or `>>` redirection if the cursor is on one.
	fn parse_redirect(&mut self) -> ParseResult<bool> {
		let typ = match self.line.get(self.i) {
			Some(&b'<') => {
				self.i += 1;
				RedirectType::Input
			},
			Some(&b'>') => if self.line.get(self.i+1) == Some(&b'>') {
				self.i += 2;
				RedirectType::Append
			} else {
				self.i += 1;
				RedirectType::Output
			},
			_ => { return Ok(false); },
		};

		self.skip_whitespaces();
		let target = self.read_word();
		if target.is_empty() {
			return Err(ParseError::EmptyRedirect(typ.symbol()));
		}

		match typ {
			RedirectType::Input => {
				if self.input.is_some() {
					return Err(ParseError::DuplicateInput);
				}
				self.input = Some(target);
			},
			RedirectType::Output | RedirectType::Append => {
				if self.output.is_some() {
					return Err(ParseError::DuplicateOutput);
				}
				self.output = Some(target);
				self.is_append = typ == RedirectType::Append;
			},
		}
		Ok(true)
	}

	fn parse_command(&mut self) -> ParseResult<Command<'a>> {
		let mut args: Vec<&'a [u8]> = vec![];
		loop {
			self.skip_whitespaces();
			if self.parse_redirect()? {
				continue;
			}
			let word = self.read_word();
			if word.is_empty() {
				break;
			}
			args.push(word);
		}
		if args.is_empty() {
			return Err(ParseError::EmptyCommand);
		}
		Ok(Command { args: args })
	}

	fn parse_line(mut self) -> ParseResult<Line<'a>> {
		let mut commands: Vec<Command<'a>> = vec![];
		let mut is_background = false;

		loop {
			commands.push(self.parse_command()?);
			match self.line.get(self.i) {
				Some(&b'|') => { self.i += 1; },
				Some(&b'&') => {
					self.i += 1;
					is_background = true;
					self.skip_whitespaces();
					if let Some(&c) = self.line.get(self.i) {
						return Err(ParseError::TrailingCharacter(c as char));
					}
					break;
				},
				Some(&c) => { return Err(ParseError::UnknownSeparator(c as char)); },
				None => { break; },
			}
		}
		Ok(Line {
			commands: commands,
			input: self.input,
			output: self.output,
			is_append: self.is_append,
			is_background: is_background,
		})
	}
}

pub fn is_blank(line: &[u8]) -> bool {
	line.iter().all(|&c| Parser::is_whitespace(c))
}

pub fn parse<'a>(line: &'a [u8]) -> ParseResult<Line<'a>> {
	let parser: Parser<'a> = Parser { line: line, i: 0, input: None, output: None, is_append: false };
	parser.parse_line()
}
