use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read};
use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::mpsc;

/// The human in the loop: answers one prompt per article.
#[async_trait::async_trait]
pub trait Operator: Send {
    /// Show `prompt` and wait for a free-form answer.
    async fn ask(&mut self, prompt: &str) -> Result<String>;

    /// Show an informational line.
    async fn tell(&mut self, line: &str) -> Result<()>;
}

/// What the operator wants done with an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Post,
    Skip,
}

impl Decision {
    /// Only exact "yes" and "no", in any letter case, count.
    pub fn parse(response: &str) -> Option<Self> {
        if response.eq_ignore_ascii_case("yes") {
            Some(Self::Post)
        } else if response.eq_ignore_ascii_case("no") {
            Some(Self::Skip)
        } else {
            None
        }
    }
}

/// Interactive operator on stdin/stdout.
///
/// Input lines are read on a dedicated thread, so a prompt left waiting
/// never keeps the runtime from shutting down.
pub struct ConsoleOperator {
    input: mpsc::Receiver<std::io::Result<String>>,
    output: Stdout,
}

impl ConsoleOperator {
    pub fn new() -> Self {
        Self::with_input(std::io::stdin())
    }

    /// Answers come from `reader`, one per line; prompts still go to stdout.
    pub fn with_input<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel(1);
        std::thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        });
        Self { input: rx, output: tokio::io::stdout() }
    }
}

impl Default for ConsoleOperator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operator for ConsoleOperator {
    async fn ask(&mut self, prompt: &str) -> Result<String> {
        self.output.write_all(prompt.as_bytes()).await.context("failed to write prompt")?;
        self.output.flush().await.context("failed to flush prompt")?;
        match self.input.recv().await {
            Some(line) => line.context("failed to read operator input"),
            None => Err(anyhow!("operator input closed")),
        }
    }

    async fn tell(&mut self, line: &str) -> Result<()> {
        self.output.write_all(line.as_bytes()).await.context("failed to write to stdout")?;
        self.output.write_all(b"\n").await.context("failed to write to stdout")?;
        self.output.flush().await.context("failed to flush stdout")?;
        Ok(())
    }
}

/// Operator that replays queued answers, for tests and unattended runs.
/// Every prompt and line it was shown is kept for inspection.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    responses: VecDeque<String>,
    pub prompts: Vec<String>,
    pub lines: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

#[async_trait::async_trait]
impl Operator for ScriptedOperator {
    async fn ask(&mut self, prompt: &str) -> Result<String> {
        self.prompts.push(prompt.to_string());
        self.responses
            .pop_front()
            .ok_or_else(|| anyhow!("scripted operator ran out of responses"))
    }

    async fn tell(&mut self, line: &str) -> Result<()> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    /// Blocks every read until the paired sender is dropped.
    struct StalledInput(std::sync::mpsc::Receiver<()>);

    impl Read for StalledInput {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            let _ = self.0.recv();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn console_reads_lines_until_input_closes() {
        let mut operator = ConsoleOperator::with_input(std::io::Cursor::new("yes\r\nNo\n"));
        assert_eq!(operator.ask("").await.unwrap(), "yes");
        assert_eq!(operator.ask("").await.unwrap(), "No");
        let err = operator.ask("").await.unwrap_err();
        assert!(err.to_string().contains("operator input closed"));
    }

    #[test]
    fn waiting_prompt_does_not_block_runtime_shutdown() {
        let (_hold, stalled) = std::sync::mpsc::channel::<()>();
        let rt = tokio::runtime::Runtime::new().unwrap();
        let mut operator = ConsoleOperator::with_input(StalledInput(stalled));

        let waited = rt.block_on(async { tokio::time::timeout(Duration::from_millis(50), operator.ask("")).await });
        assert!(waited.is_err(), "no answer should be available");

        // interrupted mid-prompt: runtime goes away while the read is pending
        let started = Instant::now();
        drop(operator);
        drop(rt);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn only_exact_yes_and_no_are_decisions() {
        assert_eq!(Decision::parse("yes"), Some(Decision::Post));
        assert_eq!(Decision::parse("YES"), Some(Decision::Post));
        assert_eq!(Decision::parse("yEs"), Some(Decision::Post));
        assert_eq!(Decision::parse(" yes"), None);
        assert_eq!(Decision::parse("no"), Some(Decision::Skip));
        assert_eq!(Decision::parse("No"), Some(Decision::Skip));
        assert_eq!(Decision::parse("y"), None);
        assert_eq!(Decision::parse("maybe"), None);
        assert_eq!(Decision::parse("yes please"), None);
        assert_eq!(Decision::parse(""), None);
    }

    #[tokio::test]
    async fn scripted_operator_replays_and_records() {
        let mut operator = ScriptedOperator::new(["yes"]);
        assert_eq!(operator.ask("first?").await.unwrap(), "yes");
        assert!(operator.ask("second?").await.is_err());
        operator.tell("done").await.unwrap();
        assert_eq!(operator.prompts, vec!["first?", "second?"]);
        assert_eq!(operator.lines, vec!["done"]);
        assert_eq!(operator.remaining(), 0);
    }
}
