//! Line-oriented operator console.
//!
//! Every prompt and menu in the session goes through [`Console`], which is
//! generic over its reader and writer. Production wires stdin/stdout; tests
//! script the whole interaction with a `Cursor` and capture output in a
//! `Vec<u8>`.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints a full line.
    pub fn say(&mut self, line: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.output, "{}", line.as_ref())
    }

    pub fn blank(&mut self) -> io::Result<()> {
        writeln!(self.output)
    }

    /// Prints `label` without a newline and reads one trimmed input line.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` when the input stream is closed; the session
    /// controller treats that as a request to end the session.
    pub fn prompt(&mut self, label: &str) -> io::Result<String> {
        write!(self.output, "{label}")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        if read == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        Ok(line.trim().to_string())
    }

    /// Asks a yes/no question. Only `y`/`yes` (case-insensitive) count as yes.
    pub fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.prompt(&format!("{question} [y/N]: "))?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    /// Reads a menu index in `0..=max`, re-prompting until the input parses.
    pub fn select_index(&mut self, label: &str, max: usize) -> io::Result<usize> {
        loop {
            let raw = self.prompt(label)?;
            match raw.parse::<usize>() {
                Ok(index) if index <= max => return Ok(index),
                _ => self.say(format!("  enter a number between 0 and {max}"))?,
            }
        }
    }

    /// Rewrites the current line with elapsed/total progress.
    pub fn tick_progress(&mut self, elapsed: u64, total: u64) -> io::Result<()> {
        write!(self.output, "\r  elapsed {elapsed}s / {total}s ")?;
        self.output.flush()
    }

    /// Finishes a progress line started by [`Self::tick_progress`].
    pub fn end_progress(&mut self) -> io::Result<()> {
        writeln!(self.output)
    }

    /// Consumes the console, handing back the writer. Tests use this to
    /// assert on everything that was printed.
    pub fn into_output(self) -> W {
        self.output
    }
}
