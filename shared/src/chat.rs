//! Per-report conversation with optimistic sends.
//!
//! A send goes `composing -> optimistic -> confirmed | failed`. Only one
//! send is in flight per thread; submitting while one is pending does
//! nothing.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, DeliveryState, SenderType};
use crate::wire::OutgoingMessage;
use crate::{AppError, ErrorKind, MessageId, ReportId, UserId, MAX_MESSAGE_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct InFlight {
    temp_id: MessageId,
    text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatThread {
    report_id: ReportId,
    reporter_id: Option<UserId>,
    messages: Vec<ChatMessage>,
    draft: String,
    in_flight: Option<InFlight>,
    loaded: bool,
}

impl ChatThread {
    #[must_use]
    pub fn new(report_id: ReportId, reporter_id: Option<UserId>) -> Self {
        Self {
            report_id,
            reporter_id,
            messages: Vec::new(),
            draft: String::new(),
            in_flight: None,
            loaded: false,
        }
    }

    #[must_use]
    pub fn report_id(&self) -> &ReportId {
        &self.report_id
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    #[must_use]
    pub fn is_sending(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn set_draft(&mut self, text: String) {
        self.draft = text;
    }

    /// Moves the draft into an optimistic message. Returns the temporary id
    /// and the request body, or `None` when there is nothing to send or a
    /// send is already pending.
    pub fn begin_send(
        &mut self,
        sender_id: &str,
        now_ms: u64,
    ) -> Result<Option<(MessageId, OutgoingMessage)>, AppError> {
        if self.in_flight.is_some() {
            return Ok(None);
        }
        let content = self.draft.trim();
        if content.is_empty() {
            return Ok(None);
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(AppError::new(
                ErrorKind::Validation,
                format!("Messages are limited to {MAX_MESSAGE_LENGTH} characters."),
            ));
        }

        let temp_id = MessageId::temporary();
        let outgoing = OutgoingMessage {
            message_content: content.to_string(),
            sender_id: sender_id.to_string(),
            sender_type: SenderType::Police.as_str().to_string(),
            receiver_id: self.reporter_id.as_ref().map(ToString::to_string),
        };

        self.messages.push(ChatMessage {
            id: temp_id.clone(),
            content: outgoing.message_content.clone(),
            timestamp_ms: now_ms,
            sender_type: SenderType::Police,
            sender_id: Some(outgoing.sender_id.clone()),
            receiver_id: outgoing.receiver_id.clone(),
            delivery: DeliveryState::Sending,
        });
        self.in_flight = Some(InFlight {
            temp_id: temp_id.clone(),
            text: std::mem::take(&mut self.draft),
        });

        Ok(Some((temp_id, outgoing)))
    }

    /// Swaps the optimistic message for the server's copy. If a poll
    /// already delivered that copy, the optimistic one is just dropped.
    pub fn confirm(&mut self, temp_id: &MessageId, server: ChatMessage) {
        self.take_in_flight(temp_id);
        let already_present = self.messages.iter().any(|m| m.id == server.id);
        if already_present {
            self.messages.retain(|m| &m.id != temp_id);
            return;
        }
        match self.messages.iter_mut().find(|m| &m.id == temp_id) {
            Some(slot) => *slot = server,
            None => self.messages.push(server),
        }
    }

    /// Removes the optimistic message and puts its text back in the input,
    /// unchanged.
    pub fn fail(&mut self, temp_id: &MessageId) {
        self.messages.retain(|m| &m.id != temp_id);
        if let Some(in_flight) = self.take_in_flight(temp_id) {
            self.draft = in_flight.text;
        }
    }

    /// Replaces the confirmed history with a server listing while keeping
    /// the optimistic message, if any, at the end.
    pub fn merge_server(&mut self, server: Vec<ChatMessage>) {
        let pending: Vec<ChatMessage> = self
            .messages
            .drain(..)
            .filter(|m| m.id.is_temporary())
            .collect();
        self.messages = server;
        self.messages.extend(pending);
        self.loaded = true;
    }

    fn take_in_flight(&mut self, temp_id: &MessageId) -> Option<InFlight> {
        if self.in_flight.as_ref().is_some_and(|f| &f.temp_id == temp_id) {
            self.in_flight.take()
        } else {
            None
        }
    }
}
