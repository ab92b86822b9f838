//! Console line input for the interactive authorization step

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};

/// Console the authorization flow talks to.
///
/// `read_line` blocks the authorization flow until a line arrives; there is no
/// timeout. Returns `Ok(None)` once the input is closed.
#[async_trait]
pub trait LineReader: Send {
    /// Show `message` to the user ahead of a `read_line`.
    async fn prompt(&mut self, message: &str) -> std::io::Result<()>;

    async fn read_line(&mut self) -> std::io::Result<Option<String>>;
}

/// Reads lines from the process's standard input.
pub struct StdinReader {
    inner: BufReader<Stdin>,
}

impl StdinReader {
    pub fn new() -> Self {
        Self {
            inner: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineReader for StdinReader {
    async fn prompt(&mut self, message: &str) -> std::io::Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(message.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await
    }

    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut line = String::new();
        let n = self.inner.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(strip_line_ending(line)))
    }
}

fn strip_line_ending(mut line: String) -> String {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    line
}
