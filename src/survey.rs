//! Post-chat survey – decides whether the survey is shown to an account and
//! records responses, at most one per account and template version.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, Result};

/// Environment variable holding the message count that unlocks the survey.
pub const TRIGGER_ENV: &str = "SURVEY_TRIGGER_MESSAGE_COUNT";
pub const DEFAULT_TRIGGER_MESSAGE_COUNT: u64 = 5;

pub const MSG_NO_TEMPLATE: &str = "설문 템플릿이 없습니다.";
pub const MSG_DUPLICATE: &str = "이미 설문을 제출하셨어요.";

/// Question id whose answer is free text; every other answer is a choice.
const TEXT_QUESTION_ID: &str = "one_line";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyTemplate {
    pub version: u32,
    pub is_active: bool,
    pub title: String,
    pub subtitle: Option<String>,
    pub footer: Option<String>,
    /// JSON array of [`SurveyQuestion`]s as stored.
    pub questions_json: Option<String>,
}

impl SurveyTemplate {
    /// Decoded questions. Missing or malformed JSON yields no questions;
    /// entries that do not decode, such as unknown question types, are
    /// skipped.
    pub fn questions(&self) -> Vec<SurveyQuestion> {
        let Some(raw) = self.questions_json.as_deref().filter(|s| !s.trim().is_empty()) else {
            return Vec::new();
        };
        let items: Vec<Value> = match serde_json::from_str(raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Survey template v{} has malformed questions: {e}", self.version);
                return Vec::new();
            }
        };
        items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| {
                serde_json::from_value(item)
                    .map_err(|e| {
                        log::warn!("Survey template v{}: skipping question {i}: {e}", self.version)
                    })
                    .ok()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SurveyQuestion {
    Single {
        id: String,
        question: String,
        options: Vec<String>,
    },
    Text {
        id: String,
        question: String,
        #[serde(default)]
        optional: bool,
        #[serde(rename = "maxLength", default = "default_max_length")]
        max_length: u32,
        #[serde(default)]
        placeholder: String,
    },
    Done {
        title: String,
        #[serde(default)]
        desc: Option<String>,
        #[serde(rename = "autoCloseMs", default = "default_auto_close_ms")]
        auto_close_ms: u64,
    },
}

fn default_max_length() -> u32 {
    200
}

fn default_auto_close_ms() -> u64 {
    1500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Single,
    Text,
}

/// One stored answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseItem {
    pub question_id: String,
    pub question_type: ItemType,
    pub value: String,
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    /// A response for this account and version already exists.
    #[error("duplicate survey response")]
    Duplicate,
    #[error("{0}")]
    Other(String),
}

/// Storage for templates, responses and the message counts the policy
/// depends on.
pub trait SurveyRepository {
    /// The active template with the highest version.
    fn active_template(&self) -> Result<Option<SurveyTemplate>>;
    fn has_responded(&self, user_id: u64, version: u32) -> Result<bool>;
    fn insert_response(
        &self,
        user_id: Option<u64>,
        version: u32,
        items: Vec<ResponseItem>,
    ) -> std::result::Result<(), InsertError>;
    /// Messages the account has sent as the user role.
    fn user_message_count(&self, user_id: u64) -> Result<u64>;
}

/// When the survey becomes visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyPolicy {
    pub trigger_message_count: u64,
}

impl Default for SurveyPolicy {
    fn default() -> Self {
        Self {
            trigger_message_count: DEFAULT_TRIGGER_MESSAGE_COUNT,
        }
    }
}

impl SurveyPolicy {
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(TRIGGER_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => Self::default(),
            Some(raw) => match raw.parse() {
                Ok(trigger_message_count) => Self {
                    trigger_message_count,
                },
                Err(e) => {
                    log::warn!("{TRIGGER_ENV}={raw:?} is not a count ({e}), using the default");
                    Self::default()
                }
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HiddenReason {
    NoActiveTemplate,
    InvalidPayload,
    AlreadyResponded,
    NotEnoughMessages { trigger: u64, current: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurveyPayload {
    pub title: String,
    pub subtitle: Option<String>,
    pub footer: Option<String>,
    pub version: u32,
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurveyVisibility {
    Hidden(HiddenReason),
    Show(SurveyPayload),
}

impl SurveyVisibility {
    pub fn is_shown(&self) -> bool {
        matches!(self, SurveyVisibility::Show(_))
    }

    /// Response body: the payload or reason flattened next to a `show` flag.
    pub fn to_json(&self) -> Value {
        let (show, body) = match self {
            SurveyVisibility::Hidden(reason) => (false, serde_json::to_value(reason)),
            SurveyVisibility::Show(payload) => (true, serde_json::to_value(payload)),
        };
        let mut out = json!({ "show": show });
        if let (Ok(Value::Object(fields)), Value::Object(target)) = (body, &mut out) {
            target.extend(fields);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    pub ok: bool,
    pub duplicated: bool,
    pub message: Option<String>,
}

impl SubmitOutcome {
    fn saved() -> Self {
        Self {
            ok: true,
            duplicated: false,
            message: None,
        }
    }

    fn duplicate() -> Self {
        Self {
            ok: false,
            duplicated: true,
            message: Some(MSG_DUPLICATE.to_string()),
        }
    }

    fn no_template() -> Self {
        Self {
            ok: false,
            duplicated: false,
            message: Some(MSG_NO_TEMPLATE.to_string()),
        }
    }
}

pub struct SurveyService<R> {
    repo: R,
    policy: SurveyPolicy,
}

impl<R: SurveyRepository> SurveyService<R> {
    pub fn new(repo: R, policy: SurveyPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Whether `account_id` should see the survey, and its content if so.
    pub fn questions(&self, account_id: u64) -> Result<SurveyVisibility> {
        let Some(template) = self.repo.active_template()? else {
            return Ok(SurveyVisibility::Hidden(HiddenReason::NoActiveTemplate));
        };

        let questions = template.questions();
        if questions.is_empty() {
            return Ok(SurveyVisibility::Hidden(HiddenReason::InvalidPayload));
        }

        if self.repo.has_responded(account_id, template.version)? {
            return Ok(SurveyVisibility::Hidden(HiddenReason::AlreadyResponded));
        }

        let current = self.repo.user_message_count(account_id)?;
        let trigger = self.policy.trigger_message_count;
        if current < trigger {
            return Ok(SurveyVisibility::Hidden(HiddenReason::NotEnoughMessages {
                trigger,
                current,
            }));
        }

        Ok(SurveyVisibility::Show(SurveyPayload {
            title: template.title,
            subtitle: template.subtitle,
            footer: template.footer,
            version: template.version,
            questions,
        }))
    }

    /// Store answers against the active template. Anonymous submissions
    /// (`account_id == None`) skip the duplicate pre-check.
    pub fn submit(
        &self,
        account_id: Option<u64>,
        answers: &BTreeMap<String, String>,
    ) -> Result<SubmitOutcome> {
        let Some(template) = self.repo.active_template()? else {
            return Ok(SubmitOutcome::no_template());
        };

        if let Some(user) = account_id {
            if self.repo.has_responded(user, template.version)? {
                return Ok(SubmitOutcome::duplicate());
            }
        }

        let items = answers
            .iter()
            .map(|(id, value)| ResponseItem {
                question_id: id.clone(),
                question_type: if id == TEXT_QUESTION_ID {
                    ItemType::Text
                } else {
                    ItemType::Single
                },
                value: value.clone(),
            })
            .collect();

        match self.repo.insert_response(account_id, template.version, items) {
            Ok(()) => {
                log::debug!("Stored survey response for v{}", template.version);
                Ok(SubmitOutcome::saved())
            }
            // A concurrent submission can get past the pre-check.
            Err(InsertError::Duplicate) => Ok(SubmitOutcome::duplicate()),
            Err(InsertError::Other(e)) => Err(Error::Survey(e)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub user_id: Option<u64>,
    pub version: u32,
    pub items: Vec<ResponseItem>,
}

/// In-process repository with a unique (user, version) constraint on
/// responses from logged-in accounts.
#[derive(Debug, Default)]
pub struct InMemorySurveyRepository {
    templates: Mutex<Vec<SurveyTemplate>>,
    responses: Mutex<Vec<StoredResponse>>,
    message_counts: Mutex<HashMap<u64, u64>>,
}

impl InMemorySurveyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: SurveyTemplate) {
        lock(&self.templates).push(template);
    }

    pub fn set_message_count(&self, user_id: u64, count: u64) {
        lock(&self.message_counts).insert(user_id, count);
    }

    pub fn responses(&self) -> Vec<StoredResponse> {
        lock(&self.responses).clone()
    }
}

/// A poisoned lock only means another thread panicked mid-update; the data
/// is still usable for this store.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SurveyRepository for InMemorySurveyRepository {
    fn active_template(&self) -> Result<Option<SurveyTemplate>> {
        Ok(lock(&self.templates)
            .iter()
            .filter(|t| t.is_active)
            .max_by_key(|t| t.version)
            .cloned())
    }

    fn has_responded(&self, user_id: u64, version: u32) -> Result<bool> {
        Ok(lock(&self.responses)
            .iter()
            .any(|r| r.user_id == Some(user_id) && r.version == version))
    }

    fn insert_response(
        &self,
        user_id: Option<u64>,
        version: u32,
        items: Vec<ResponseItem>,
    ) -> std::result::Result<(), InsertError> {
        let mut responses = lock(&self.responses);
        if user_id.is_some()
            && responses
                .iter()
                .any(|r| r.user_id == user_id && r.version == version)
        {
            return Err(InsertError::Duplicate);
        }
        responses.push(StoredResponse {
            user_id,
            version,
            items,
        });
        Ok(())
    }

    fn user_message_count(&self, user_id: u64) -> Result<u64> {
        Ok(lock(&self.message_counts).get(&user_id).copied().unwrap_or(0))
    }
}
