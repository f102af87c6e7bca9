//! Chat session controller.
//!
//! A [`ChatSession`] owns the transcript of one conversation and runs the
//! request/response cycle for every question. Failures of the answer service
//! never leave the session; they become assistant turns.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::client::{AnswerService, BedrockKbClient};
use crate::config::{BedrockSettings, KbChatConfig};
use crate::errors::{ErrorKind, KbChatError, KbChatResult};
use crate::prompt::{
    service_error_reply, unexpected_error_reply, CLIENT_NOT_INITIALIZED_REPLY, GREETING,
    PROMPT_TEMPLATE,
};
use crate::types::{GenerationRequest, Turn};

/// Per-request generation parameters that do not change within a session
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProfile {
    pub model_arn: String,
    pub knowledge_base_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&BedrockSettings> for GenerationProfile {
    fn from(settings: &BedrockSettings) -> Self {
        Self {
            model_arn: settings.model_arn.clone(),
            knowledge_base_id: settings.knowledge_base_id.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }
}

impl GenerationProfile {
    /// Builds the request for one question with the fixed persona template
    pub fn request_for(&self, question: &str) -> GenerationRequest {
        GenerationRequest {
            question: question.to_string(),
            prompt_template: PROMPT_TEMPLATE.to_string(),
            model_identifier: self.model_arn.clone(),
            knowledge_base_identifier: self.knowledge_base_id.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

struct Backend {
    service: Arc<dyn AnswerService>,
    profile: GenerationProfile,
}

/// Holds the transcript and drives one question/answer cycle at a time
pub struct ChatSession {
    transcript: Option<Vec<Turn>>,
    backend: Option<Backend>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("turns", &self.transcript.as_ref().map(Vec::len))
            .field("client_ready", &self.is_client_ready())
            .finish()
    }
}

impl ChatSession {
    /// Session backed by `service`
    pub fn new(service: Arc<dyn AnswerService>, profile: GenerationProfile) -> Self {
        Self {
            transcript: None,
            backend: Some(Backend { service, profile }),
        }
    }

    /// Session without a client; every question is answered with an error turn
    pub fn uninitialized() -> Self {
        Self {
            transcript: None,
            backend: None,
        }
    }

    /// Validates `config` and connects to Bedrock. A configuration problem is
    /// logged and yields an uninitialized session instead of an error.
    pub fn connect(config: &KbChatConfig) -> Self {
        let connected = config.validate().and_then(|settings| {
            let profile = GenerationProfile::from(&settings);
            BedrockKbClient::new(settings).map(|client| (client, profile))
        });

        match connected {
            Ok((client, profile)) => {
                info!(
                    region = %client.settings().region,
                    knowledge_base_id = %profile.knowledge_base_id,
                    model_arn = %profile.model_arn,
                    "Knowledge base client initialized"
                );
                Self::new(Arc::new(client), profile)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize knowledge base client");
                Self::uninitialized()
            }
        }
    }

    pub fn is_client_ready(&self) -> bool {
        self.backend.is_some()
    }

    /// Seeds the transcript with the greeting unless one already exists
    pub fn initialize(&mut self) {
        if self.transcript.is_none() {
            debug!("Starting new transcript");
            self.transcript = Some(vec![Turn::assistant(GREETING)]);
        }
    }

    /// Drops the conversation and starts over with a fresh greeting
    pub fn reset(&mut self) {
        info!(
            turns = self.transcript.as_ref().map_or(0, Vec::len),
            "Resetting session"
        );
        self.transcript = None;
        self.initialize();
    }

    /// Asks one question and records both the question and the reply.
    ///
    /// Only blank input is refused; it leaves the transcript untouched. Every
    /// other failure is recorded as the assistant's reply.
    pub async fn submit(&mut self, question: &str) -> KbChatResult<()> {
        if question.trim().is_empty() {
            return Err(KbChatError::EmptyQuestion);
        }

        self.initialize();
        self.push(Turn::user(question));

        let reply = match &self.backend {
            Some(backend) => {
                let request = backend.profile.request_for(question);
                match backend.service.generate(&request).await {
                    Ok(answer) => answer,
                    Err(e) => reply_for_error(&e),
                }
            }
            None => {
                warn!("Question submitted without an initialized client");
                CLIENT_NOT_INITIALIZED_REPLY.to_string()
            }
        };

        self.push(Turn::assistant(reply));
        Ok(())
    }

    /// The turns so far, oldest first
    pub fn transcript(&self) -> &[Turn] {
        self.transcript.as_deref().unwrap_or(&[])
    }

    /// Most recent turn, if any
    pub fn last_turn(&self) -> Option<&Turn> {
        self.transcript().last()
    }

    /// Writes the transcript as pretty JSON
    pub fn save_transcript(&self, path: &Path) -> KbChatResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self.transcript())?;
        fs::write(path, json)?;
        info!(path = %path.display(), turns = self.transcript().len(), "Transcript saved");
        Ok(())
    }

    fn push(&mut self, turn: Turn) {
        self.transcript.get_or_insert_with(Vec::new).push(turn);
    }
}

fn reply_for_error(error: &KbChatError) -> String {
    match error.kind() {
        ErrorKind::Service => {
            warn!(error = %error, "Knowledge base service reported an error");
            service_error_reply(&error.to_string())
        }
        ErrorKind::Unexpected => {
            error!(error = %error, "Unexpected error while querying the knowledge base");
            unexpected_error_reply(&error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::WARNING_MARKER;
    use crate::types::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with the question reversed and remembers what it was asked
    #[derive(Default)]
    struct ReversingService {
        seen: Mutex<Vec<GenerationRequest>>,
    }

    #[async_trait]
    impl AnswerService for ReversingService {
        async fn generate(&self, request: &GenerationRequest) -> KbChatResult<String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(request.question.chars().rev().collect())
        }
    }

    /// Fails the first `failures` calls with a service error, then echoes
    struct FlakyService {
        failures: Mutex<usize>,
    }

    #[async_trait]
    impl AnswerService for FlakyService {
        async fn generate(&self, request: &GenerationRequest) -> KbChatResult<String> {
            let mut left = self.failures.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(KbChatError::ServiceError {
                    code: "ThrottlingException".to_string(),
                    message: "quota exceeded".to_string(),
                });
            }
            Ok(request.question.clone())
        }
    }

    struct BrokenTransport;

    #[async_trait]
    impl AnswerService for BrokenTransport {
        async fn generate(&self, _request: &GenerationRequest) -> KbChatResult<String> {
            Err(KbChatError::TransportError("connection reset".to_string()))
        }
    }

    fn profile() -> GenerationProfile {
        GenerationProfile {
            model_arn: "arn:aws:bedrock:us-east-1::foundation-model/test".to_string(),
            knowledge_base_id: "KB123".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    fn session_with(service: Arc<dyn AnswerService>) -> ChatSession {
        let mut session = ChatSession::new(service, profile());
        session.initialize();
        session
    }

    #[test]
    fn test_initialize_seeds_greeting() {
        let mut session = ChatSession::uninitialized();
        assert!(session.transcript().is_empty());

        session.initialize();
        assert_eq!(session.transcript(), &[Turn::assistant(GREETING)]);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut session = ChatSession::uninitialized();
        session.initialize();
        session.initialize();
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_reversing_service_answer_is_recorded() {
        let mut session = session_with(Arc::new(ReversingService::default()));
        session.submit("hello").await.unwrap();

        assert_eq!(session.last_turn(), Some(&Turn::assistant("olleh")));
    }

    #[tokio::test]
    async fn test_turns_alternate_after_greeting() {
        let mut session = session_with(Arc::new(ReversingService::default()));
        let questions = ["one", "two", "three", "four"];
        for q in questions {
            session.submit(q).await.unwrap();
        }

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1 + 2 * questions.len());
        assert_eq!(transcript[0].role(), Role::Assistant);
        for (i, turn) in transcript.iter().enumerate().skip(1) {
            let expected = if i % 2 == 1 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role(), expected, "turn {} has the wrong role", i);
        }
        assert_eq!(transcript[3].content(), "two");
    }

    #[tokio::test]
    async fn test_request_uses_fixed_template_and_profile() {
        let service = Arc::new(ReversingService::default());
        let mut session = session_with(service.clone());
        session.submit("What is the refund policy?").await.unwrap();

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], profile().request_for("What is the refund policy?"));
        assert_eq!(seen[0].prompt_template, PROMPT_TEMPLATE);
    }

    #[tokio::test]
    async fn test_service_error_is_shown_and_session_continues() {
        let service = Arc::new(FlakyService {
            failures: Mutex::new(1),
        });
        let mut session = session_with(service);

        session.submit("x").await.unwrap();
        let reply = session.last_turn().unwrap();
        assert_eq!(reply.role(), Role::Assistant);
        assert!(reply.content().contains("quota exceeded"));
        assert!(reply.content().starts_with(WARNING_MARKER));

        session.submit("again").await.unwrap();
        assert_eq!(session.last_turn(), Some(&Turn::assistant("again")));
        assert_eq!(session.transcript().len(), 5);
    }

    #[tokio::test]
    async fn test_unexpected_error_gets_apology() {
        let mut session = session_with(Arc::new(BrokenTransport));
        session.submit("x").await.unwrap();

        let reply = session.last_turn().unwrap().content();
        assert!(reply.starts_with(WARNING_MARKER));
        assert!(reply.contains("Sorry"));
        assert!(reply.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_uninitialized_client_reply() {
        let mut session = ChatSession::uninitialized();
        session.initialize();
        session.submit("x").await.unwrap();

        assert_eq!(
            session.last_turn(),
            Some(&Turn::assistant(CLIENT_NOT_INITIALIZED_REPLY))
        );
        assert!(session.last_turn().unwrap().content().contains("not initialized"));
    }

    #[tokio::test]
    async fn test_connect_with_missing_config_degrades() {
        let mut session = ChatSession::connect(&KbChatConfig::with_defaults());
        assert!(!session.is_client_ready());

        session.initialize();
        session.submit("x").await.unwrap();
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(
            session.last_turn().unwrap().content(),
            CLIENT_NOT_INITIALIZED_REPLY
        );
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected_without_side_effects() {
        let mut session = session_with(Arc::new(ReversingService::default()));
        for blank in ["", "   ", "\n\t"] {
            let err = session.submit(blank).await.unwrap_err();
            assert!(matches!(err, KbChatError::EmptyQuestion));
        }
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_before_initialize_still_greets_first() {
        let mut session = ChatSession::new(Arc::new(ReversingService::default()), profile());
        session.submit("ab").await.unwrap();

        let transcript = session.transcript();
        assert_eq!(transcript[0], Turn::assistant(GREETING));
        assert_eq!(transcript[1], Turn::user("ab"));
        assert_eq!(transcript[2], Turn::assistant("ba"));
    }

    #[tokio::test]
    async fn test_reset_reseeds_greeting() {
        let mut session = session_with(Arc::new(ReversingService::default()));
        session.submit("hello").await.unwrap();
        session.reset();

        assert_eq!(session.transcript(), &[Turn::assistant(GREETING)]);
    }

    #[tokio::test]
    async fn test_save_transcript_writes_json() {
        let mut session = session_with(Arc::new(ReversingService::default()));
        session.submit("hello").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("transcript.json");
        session.save_transcript(&path).unwrap();

        let saved: Vec<Turn> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved, session.transcript());
    }
}
