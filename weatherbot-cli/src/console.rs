use anyhow::Context;
use std::io::{self, BufRead, StdinLock, Stdout, Write};
use weatherbot_core::Console;

/// Line-oriented console over any reader/writer pair.
#[derive(Debug)]
pub struct LineConsole<R, W> {
    input: R,
    output: W,
}

pub type StdConsole = LineConsole<StdinLock<'static>, Stdout>;

impl StdConsole {
    pub fn stdio() -> Self {
        LineConsole::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> LineConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn write_line(&mut self, text: &str) {
        // Nothing sensible to do if the terminal went away mid-session.
        let _ = writeln!(self.output, "{text}").and_then(|_| self.output.flush());
    }
}

impl<R: BufRead, W: Write> Console for LineConsole<R, W> {
    fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        write!(self.output, "{prompt}").context("Failed to write prompt")?;
        self.output.flush().context("Failed to flush stdout")?;

        let mut buffer = String::new();
        let read = self
            .input
            .read_line(&mut buffer)
            .context("Failed to read line from stdin")?;

        if read == 0 {
            self.write_line("");
            return Ok(None);
        }

        Ok(Some(buffer.trim_end_matches(['\r', '\n']).to_string()))
    }

    fn reply(&mut self, text: &str) {
        self.write_line(text);
    }

    fn notice(&mut self, text: &str) {
        self.write_line(text);
    }

    fn error(&mut self, text: &str) {
        self.write_line(&format!("Error: {text}"));
    }
}
