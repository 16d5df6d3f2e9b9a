//! Command links between a control program and its robot

use crate::error::{Error, Result};
use crate::oi::LinkCommand;
use crate::oi::text::{format_link_command, parse_response};
use std::io::{BufRead, BufReader, Stdin, Stdout, Write};

/// Ordered command channel to one robot
pub trait CommandLink: Send {
    /// Send one command and collect its response bytes
    ///
    /// The response is empty for commands that produce none.
    fn transact(&mut self, cmd: &LinkCommand) -> Result<Vec<u8>>;
}

impl<L: CommandLink + ?Sized> CommandLink for Box<L> {
    fn transact(&mut self, cmd: &LinkCommand) -> Result<Vec<u8>> {
        (**self).transact(cmd)
    }
}

/// Text line protocol over a pair of streams
///
/// A compiled control program uses its stdout for commands and its stdin
/// for responses; the repeater sits on the other side.
pub struct LineLink<R, W> {
    reader: R,
    writer: W,
    line: String,
}

impl<R: BufRead + Send, W: Write + Send> LineLink<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line: String::new(),
        }
    }

    fn read_response(&mut self, expected: usize) -> Result<Vec<u8>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line)? == 0 {
            return Err(Error::Disconnected);
        }
        let bytes = parse_response(&self.line)?;
        if bytes.len() != expected {
            return Err(Error::InvalidParameter(format!(
                "expected {} response byte(s), got {}",
                expected,
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl LineLink<BufReader<Stdin>, Stdout> {
    /// Link over this process's stdin and stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(std::io::stdin()), std::io::stdout())
    }
}

impl<R: BufRead + Send, W: Write + Send> CommandLink for LineLink<R, W> {
    fn transact(&mut self, cmd: &LinkCommand) -> Result<Vec<u8>> {
        let line = format_link_command(cmd);
        log::debug!("-> {}", line);
        writeln!(self.writer, "{}", line)?;
        self.writer.flush()?;

        match cmd.response_len() {
            0 => Ok(Vec::new()),
            n => self.read_response(n),
        }
    }
}
