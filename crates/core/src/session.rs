//! Interactive session: one uploaded document, repeated questions.
//!
//! ```text
//! Idle --upload--> DocumentUploaded --process--> Processing --> AnswerReady
//!   \__________________\______________________________\------> Error
//! ```
//!
//! `Error` is a display state only. The session keeps its document and
//! accepts the next upload or question.

use crate::orchestrator::QaCoordinator;
use crate::{Answer, QaError, UploadedDocument};
use tracing::{debug, error, info};
use uuid::Uuid;

pub const MISSING_DOCUMENT_MESSAGE: &str = "Please upload a PDF document first.";
pub const MISSING_QUESTION_MESSAGE: &str = "Please enter a question about the document.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    DocumentUploaded,
    Processing,
    AnswerReady,
    Error,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    state: SessionState,
    document: Option<UploadedDocument>,
    last_answer: Option<Answer>,
    last_error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            document: None,
            last_answer: None,
            last_error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn document(&self) -> Option<&UploadedDocument> {
        self.document.as_ref()
    }

    pub fn last_answer(&self) -> Option<&Answer> {
        self.last_answer.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Replaces any earlier document.
    pub fn upload(&mut self, document: UploadedDocument) {
        info!(
            session = %self.id,
            document = %document.name,
            bytes = document.bytes.len(),
            "document uploaded"
        );
        self.document = Some(document);
        self.last_answer = None;
        self.last_error = None;
        self.state = SessionState::DocumentUploaded;
    }

    /// Moves to `Error` with a message, e.g. when a file could not be read
    /// before it ever reached the session.
    pub fn fail(&mut self, failure: &QaError) {
        self.record_failure(failure);
    }

    /// The "process document" action. Validation happens before any pipeline
    /// stage runs; every failure leaves the session usable.
    pub async fn process(
        &mut self,
        coordinator: &QaCoordinator,
        question: &str,
    ) -> Result<&Answer, QaError> {
        let question = question.trim();

        let Some(document) = self.document.clone() else {
            return Err(self.reject(MISSING_DOCUMENT_MESSAGE));
        };
        if question.is_empty() {
            return Err(self.reject(MISSING_QUESTION_MESSAGE));
        }

        self.state = SessionState::Processing;
        self.last_error = None;
        debug!(session = %self.id, document = %document.name, "processing document");

        match coordinator.answer(&document, question).await {
            Ok(answer) => {
                info!(
                    session = %self.id,
                    sources = answer.sources.len(),
                    "answer generated successfully"
                );
                self.state = SessionState::AnswerReady;
                Ok(self.last_answer.insert(answer))
            }
            Err(failure) => {
                self.record_failure(&failure);
                Err(failure)
            }
        }
    }

    fn reject(&mut self, message: &str) -> QaError {
        let failure = QaError::Validation(message.to_string());
        self.record_failure(&failure);
        failure
    }

    fn record_failure(&mut self, failure: &QaError) {
        if failure.is_user_error() {
            debug!(session = %self.id, reason = %failure, "request rejected");
        } else {
            error!(
                session = %self.id,
                stage = failure.stage(),
                error = %failure,
                "processing error"
            );
        }
        self.last_answer = None;
        self.last_error = Some(failure.to_string());
        self.state = SessionState::Error;
    }
}
