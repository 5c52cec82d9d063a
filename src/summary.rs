//! Chat summary use case – loads a chat room, decrypts its messages into a
//! transcript and asks a [`Summarizer`] for the summary text that the
//! renderer turns into a PDF.
//!
//! Storage, decryption and text generation are traits so the calling layer
//! can plug in its own database, key management and model backend.

use chrono::NaiveDateTime;

use crate::config::Labels;
use crate::document::SummaryMeta;
use crate::error::{Error, Result};

/// Length of an AES-CBC initialisation vector.
pub const IV_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRoom {
    pub id: String,
    pub account_id: u64,
    pub title: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub content_enc: Vec<u8>,
    pub iv: Option<Vec<u8>>,
}

/// Decrypts stored message bodies.
pub trait MessageDecryptor {
    /// `iv` is `None` when the message carries no usable IV.
    fn decrypt(&self, ciphertext: &[u8], iv: Option<&[u8; IV_LEN]>) -> Result<String>;
}

/// Produces summary text from a prompt.
pub trait Summarizer {
    fn summarize(&self, prompt: &str) -> Result<String>;
}

/// Read access to chat rooms and their messages.
pub trait ChatStore {
    fn find_room(&self, room_id: &str) -> Result<Option<ChatRoom>>;
    fn find_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>>;
}

/// Result of a successful summarisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSummary {
    pub summary: String,
    pub room_title: String,
    /// Every stored message, including ones that failed to decrypt.
    pub message_count: usize,
    pub created_at: NaiveDateTime,
    pub room_id: String,
}

impl ChatSummary {
    /// Metadata printed above the summary in the PDF.
    pub fn meta(&self) -> SummaryMeta {
        SummaryMeta {
            room_title: self.room_title.clone(),
            created_at: self.created_at,
            message_count: self.message_count,
        }
    }
}

const SUMMARY_PROMPT: &str = "\
다음은 사용자와 상담사의 대화 내용입니다.
대화의 핵심 주제, 사용자의 고민과 감정, 상담사가 제안한 내용을 정리해 주세요.
마크다운 형식(제목, 목록, 굵은 글씨)을 사용해 읽기 쉽게 작성해 주세요.

[대화 내용]
{conversation}";

/// Build the summarisation prompt around a transcript.
pub fn summary_prompt(transcript: &str) -> String {
    SUMMARY_PROMPT.replace("{conversation}", transcript)
}

pub struct SummarizeChat<S, D, M> {
    store: S,
    decryptor: D,
    summarizer: M,
    labels: Labels,
}

impl<S, D, M> SummarizeChat<S, D, M>
where
    S: ChatStore,
    D: MessageDecryptor,
    M: Summarizer,
{
    pub fn new(store: S, decryptor: D, summarizer: M, labels: Labels) -> Self {
        Self {
            store,
            decryptor,
            summarizer,
            labels,
        }
    }

    /// Summarise the room `room_id` on behalf of `account_id`.
    pub fn execute(&self, room_id: &str, account_id: u64) -> Result<ChatSummary> {
        let room = self
            .store
            .find_room(room_id)?
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;
        if room.account_id != account_id {
            return Err(Error::Forbidden {
                room_id: room_id.to_string(),
                account_id,
            });
        }

        let messages = self.store.find_messages(room_id)?;
        if messages.is_empty() {
            return Err(Error::EmptyConversation(room_id.to_string()));
        }

        let transcript = self.transcript(&messages);
        let prompt = summary_prompt(&transcript);
        let summary = self
            .summarizer
            .summarize(&prompt)
            .map_err(|e| match e {
                Error::Generation(_) => e,
                other => Error::Generation(other.to_string()),
            })?;
        log::debug!(
            "Summarised room {room_id}: {} messages, {} chars",
            messages.len(),
            summary.len()
        );

        Ok(ChatSummary {
            summary: summary.trim().to_string(),
            room_title: room
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| self.labels.untitled_room.clone()),
            message_count: messages.len(),
            created_at: room.created_at,
            room_id: room_id.to_string(),
        })
    }

    /// Decrypted messages in id order as `"{role}: {text}"`, separated by
    /// blank lines. Messages that fail to decrypt are left out.
    pub fn transcript(&self, messages: &[ChatMessage]) -> String {
        let mut sorted: Vec<&ChatMessage> = messages.iter().collect();
        sorted.sort_by_key(|m| m.id);

        sorted
            .into_iter()
            .filter_map(|msg| {
                let iv = msg
                    .iv
                    .as_deref()
                    .and_then(|iv| <&[u8; IV_LEN]>::try_from(iv).ok());
                match self.decryptor.decrypt(&msg.content_enc, iv) {
                    Ok(text) => {
                        let role = match msg.role {
                            Role::User => &self.labels.user_role,
                            Role::Assistant => &self.labels.assistant_role,
                        };
                        Some(format!("{role}: {text}"))
                    }
                    Err(e) => {
                        log::warn!("Skipping message {}: {e}", msg.id);
                        None
                    }
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Treats the ciphertext as UTF-8; `FAIL` fails. Records whether an IV
    /// was passed.
    #[derive(Default)]
    struct PlainDecryptor {
        seen_iv: RefCell<Vec<bool>>,
    }

    impl MessageDecryptor for PlainDecryptor {
        fn decrypt(&self, ciphertext: &[u8], iv: Option<&[u8; IV_LEN]>) -> Result<String> {
            self.seen_iv.borrow_mut().push(iv.is_some());
            match std::str::from_utf8(ciphertext) {
                Ok("FAIL") | Err(_) => Err(Error::Decrypt("bad block".to_string())),
                Ok(text) => Ok(text.to_string()),
            }
        }
    }

    struct EchoSummarizer {
        prompts: RefCell<Vec<String>>,
        fail: bool,
    }

    impl EchoSummarizer {
        fn new() -> Self {
            Self {
                prompts: RefCell::new(Vec::new()),
                fail: false,
            }
        }
    }

    impl Summarizer for EchoSummarizer {
        fn summarize(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            if self.fail {
                return Err(Error::Generation("backend unavailable".to_string()));
            }
            Ok("  ## 요약\n- done  \n".to_string())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rooms: HashMap<String, ChatRoom>,
        messages: HashMap<String, Vec<ChatMessage>>,
    }

    impl ChatStore for MemoryStore {
        fn find_room(&self, room_id: &str) -> Result<Option<ChatRoom>> {
            Ok(self.rooms.get(room_id).cloned())
        }

        fn find_messages(&self, room_id: &str) -> Result<Vec<ChatMessage>> {
            Ok(self.messages.get(room_id).cloned().unwrap_or_default())
        }
    }

    fn created() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn message(id: u64, role: Role, text: &str, iv: Option<Vec<u8>>) -> ChatMessage {
        ChatMessage {
            id,
            role,
            content_enc: text.as_bytes().to_vec(),
            iv,
        }
    }

    fn store(title: Option<&str>, messages: Vec<ChatMessage>) -> MemoryStore {
        let mut store = MemoryStore::default();
        store.rooms.insert(
            "room-1".to_string(),
            ChatRoom {
                id: "room-1".to_string(),
                account_id: 42,
                title: title.map(str::to_string),
                created_at: created(),
            },
        );
        store.messages.insert("room-1".to_string(), messages);
        store
    }

    fn use_case(
        store: MemoryStore,
    ) -> SummarizeChat<MemoryStore, PlainDecryptor, EchoSummarizer> {
        SummarizeChat::new(
            store,
            PlainDecryptor::default(),
            EchoSummarizer::new(),
            Labels::default(),
        )
    }

    #[test]
    fn summarises_room() {
        let uc = use_case(store(
            Some("주간 상담"),
            vec![
                message(2, Role::Assistant, "어떤 일이 있었나요?", None),
                message(1, Role::User, "안녕하세요", None),
            ],
        ));
        let summary = uc.execute("room-1", 42).unwrap();
        assert_eq!(summary.summary, "## 요약\n- done");
        assert_eq!(summary.room_title, "주간 상담");
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.created_at, created());

        let prompts = uc.summarizer.prompts.borrow();
        assert!(prompts[0].ends_with("사용자: 안녕하세요\n\n상담사: 어떤 일이 있었나요?"));
    }

    #[test]
    fn missing_room() {
        let uc = use_case(MemoryStore::default());
        assert!(matches!(uc.execute("nope", 42), Err(Error::RoomNotFound(_))));
    }

    #[test]
    fn other_account_is_forbidden() {
        let uc = use_case(store(None, vec![message(1, Role::User, "hi", None)]));
        assert!(matches!(
            uc.execute("room-1", 7),
            Err(Error::Forbidden { account_id: 7, .. })
        ));
    }

    #[test]
    fn empty_conversation() {
        let uc = use_case(store(None, Vec::new()));
        assert!(matches!(
            uc.execute("room-1", 42),
            Err(Error::EmptyConversation(_))
        ));
    }

    #[test]
    fn undecryptable_messages_are_skipped_but_counted() {
        let uc = use_case(store(
            None,
            vec![
                message(1, Role::User, "FAIL", None),
                message(2, Role::User, "kept", None),
            ],
        ));
        let summary = uc.execute("room-1", 42).unwrap();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.room_title, "제목 없음");
        let prompts = uc.summarizer.prompts.borrow();
        assert!(!prompts[0].contains("FAIL"));
        assert!(prompts[0].contains("사용자: kept"));
    }

    #[test]
    fn iv_passed_only_when_sixteen_bytes() {
        let uc = use_case(store(
            None,
            vec![
                message(1, Role::User, "a", Some(vec![0u8; 16])),
                message(2, Role::User, "b", Some(vec![0u8; 8])),
                message(3, Role::User, "c", None),
            ],
        ));
        uc.execute("room-1", 42).unwrap();
        assert_eq!(*uc.decryptor.seen_iv.borrow(), vec![true, false, false]);
    }

    #[test]
    fn summarizer_failure_is_generation_error() {
        let mut uc = use_case(store(None, vec![message(1, Role::User, "hi", None)]));
        uc.summarizer.fail = true;
        let err = uc.execute("room-1", 42).unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
        assert!(err.to_string().contains("backend unavailable"));
    }

    #[test]
    fn prompt_wraps_transcript() {
        let prompt = summary_prompt("사용자: hi");
        assert!(prompt.contains("[대화 내용]\n사용자: hi"));
    }
}
