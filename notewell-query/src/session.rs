//! Interactive question answering over the indexed notes.

use std::future::Future;
use std::io::Write;

use console::style;
use log::{error, info};
use notewell_common::Chunk;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::llm::{LanguageModel, LlmError};
use crate::prompt::PromptTemplate;
use crate::retriever::{Retrieve, RetrieveError};

pub const UNKNOWN_SOURCE: &str = "Unknown source";

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Retrieve(#[from] RetrieveError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Answering,
    Terminated,
}

/// Why [`QuerySession::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Finished,
    Interrupted,
}

/// What one line of input asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Skip,
    Exit,
    Ask(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            Self::Skip
        } else if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            Self::Exit
        } else {
            Self::Ask(line)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Distinct source paths, in retrieval order.
    pub sources: Vec<String>,
}

fn distinct_sources(chunks: &[Chunk]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for chunk in chunks {
        let source = chunk.source().unwrap_or(UNKNOWN_SOURCE);
        if !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
    }
    sources
}

pub struct QuerySession<R, M> {
    retriever: R,
    model: M,
    prompt: PromptTemplate,
    state: SessionState,
}

impl<R: Retrieve, M: LanguageModel> QuerySession<R, M> {
    pub fn new(retriever: R, model: M) -> Self {
        Self {
            retriever,
            model,
            prompt: PromptTemplate::default(),
            state: SessionState::Ready,
        }
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Retrieves context for `question` and asks the model.
    ///
    /// # Errors
    ///
    /// Returns an error if retrieval or generation fails.
    pub async fn answer(&self, question: &str) -> Result<Answer, QueryError> {
        let chunks = self.retriever.retrieve(question).await?;
        let prompt = self.prompt.render(&chunks, question);
        let text = self.model.generate(&prompt).await?;
        Ok(Answer {
            text: text.trim().to_string(),
            sources: distinct_sources(&chunks),
        })
    }

    /// Reads questions line by line until `exit`, `quit` or end of input.
    /// A failed question is logged and the loop carries on.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run<I, W>(&mut self, mut input: I, output: &mut W) -> std::io::Result<()>
    where
        I: AsyncBufRead + Unpin,
        W: Write,
    {
        writeln!(output, "\n{}", style("--- Personal Note Q&A ---").bold())?;
        writeln!(
            output,
            "Ask questions based on your documents. Type 'exit' or 'quit' to end."
        )?;

        let mut line = String::new();
        while self.state != SessionState::Terminated {
            write!(output, "\n{}", style("Question: ").cyan())?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line).await? == 0 {
                writeln!(output)?;
                self.state = SessionState::Terminated;
                break;
            }

            match Command::parse(&line) {
                Command::Skip => {}
                Command::Exit => {
                    writeln!(output, "Exiting application. Goodbye!")?;
                    self.state = SessionState::Terminated;
                }
                Command::Ask(question) => {
                    self.state = SessionState::Answering;
                    info!("Processing query: '{question}'");
                    match self.answer(question).await {
                        Ok(answer) => write_answer(output, &answer)?,
                        Err(e) => error!("An error occurred while answering '{question}': {e}"),
                    }
                    self.state = SessionState::Ready;
                }
            }
        }
        Ok(())
    }

    /// Like [`QuerySession::run`], but `interrupt` resolving ends the session
    /// at once, whatever the loop is waiting on.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run_until<I, W, F>(
        &mut self,
        input: I,
        output: &mut W,
        interrupt: F,
    ) -> std::io::Result<SessionEnd>
    where
        I: AsyncBufRead + Unpin,
        W: Write,
        F: Future,
    {
        let end = tokio::select! {
            result = self.run(input, output) => {
                result?;
                SessionEnd::Finished
            }
            _ = interrupt => SessionEnd::Interrupted,
        };
        if end == SessionEnd::Interrupted {
            self.state = SessionState::Terminated;
            writeln!(output, "\nApplication interrupted by user. Exiting.")?;
            output.flush()?;
        }
        Ok(end)
    }
}

fn write_answer<W: Write>(output: &mut W, answer: &Answer) -> std::io::Result<()> {
    writeln!(output, "\n{}", style("--- Answer ---").green().bold())?;
    writeln!(output, "{}", answer.text)?;
    writeln!(output, "\n{}", style("--- Sources ---").yellow().bold())?;
    for source in &answer.sources {
        writeln!(output, "- {source}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notewell_common::Document;
    use std::sync::Mutex;

    struct Scripted;

    impl Retrieve for Scripted {
        async fn retrieve(&self, question: &str) -> Result<Vec<Chunk>, RetrieveError> {
            if question.contains("boom") {
                return Err(RetrieveError::Search(notewell_common::StoreError::Search(
                    "index offline".into(),
                )));
            }
            let orphan = Chunk {
                text: "orphan".to_string(),
                metadata: Default::default(),
            };
            Ok(vec![
                Chunk {
                    text: "alpha fact".to_string(),
                    metadata: Document::new("", "Documents/a.md").metadata,
                },
                Chunk {
                    text: "more alpha".to_string(),
                    metadata: Document::new("", "Documents/a.md").metadata,
                },
                orphan,
                Chunk {
                    text: "beta fact".to_string(),
                    metadata: Document::new("", "Documents/b.md").metadata,
                },
            ])
        }
    }

    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    impl LanguageModel for Recorder {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  the answer  \n".to_string())
        }
    }

    #[test]
    fn commands_parse_case_insensitively() {
        assert_eq!(Command::parse("   \n"), Command::Skip);
        assert_eq!(Command::parse("EXIT\n"), Command::Exit);
        assert_eq!(Command::parse(" Quit "), Command::Exit);
        assert_eq!(Command::parse(" what? \n"), Command::Ask("what?"));
        assert_eq!(Command::parse("exit now"), Command::Ask("exit now"));
    }

    #[tokio::test]
    async fn answer_lists_distinct_sources_in_order() {
        let session = QuerySession::new(Scripted, Recorder::default());
        let answer = session.answer("alpha?").await.unwrap();
        assert_eq!(answer.text, "the answer");
        assert_eq!(
            answer.sources,
            vec!["Documents/a.md", UNKNOWN_SOURCE, "Documents/b.md"]
        );
        let prompts = session.model.prompts.lock().unwrap();
        assert!(prompts[0].contains("alpha fact\n\nmore alpha"));
        assert!(prompts[0].contains("Question: alpha?"));
    }

    #[tokio::test]
    async fn failed_question_does_not_end_the_session() {
        let mut session = QuerySession::new(Scripted, Recorder::default());
        let input: &[u8] = b"\nboom please\nwhat is alpha?\nquit\nnever asked\n";
        let mut output = Vec::new();
        session.run(input, &mut output).await.unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("--- Answer ---").count(), 1);
        assert!(text.contains("the answer"));
        assert!(text.contains("- Documents/b.md"));
        assert!(text.contains("Goodbye!"));
        assert_eq!(session.state(), SessionState::Terminated);

        let prompts = session.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("what is alpha?"));
    }

    #[tokio::test]
    async fn interrupt_ends_session_while_waiting_for_input() {
        let mut session = QuerySession::new(Scripted, Recorder::default());
        // The writer half stays open, so the session blocks on its read.
        let (_keyboard, terminal) = tokio::io::duplex(64);
        let mut output = Vec::new();

        let end = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            session.run_until(
                tokio::io::BufReader::new(terminal),
                &mut output,
                tokio::time::sleep(std::time::Duration::from_millis(50)),
            ),
        )
        .await
        .expect("interrupt should end the session promptly")
        .unwrap();

        assert_eq!(end, SessionEnd::Interrupted);
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(String::from_utf8(output).unwrap().contains("interrupted by user"));
    }

    #[tokio::test]
    async fn run_until_reports_normal_exit() {
        let mut session = QuerySession::new(Scripted, Recorder::default());
        let input: &[u8] = b"exit\n";
        let mut output = Vec::new();
        let end = session
            .run_until(input, &mut output, std::future::pending::<()>())
            .await
            .unwrap();
        assert_eq!(end, SessionEnd::Finished);
    }

    #[tokio::test]
    async fn end_of_input_terminates() {
        let mut session = QuerySession::new(Scripted, Recorder::default());
        let input: &[u8] = b"";
        let mut output = Vec::new();
        session.run(input, &mut output).await.unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        assert!(session.model.prompts.lock().unwrap().is_empty());
    }
}
