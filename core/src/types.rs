use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of the transcript. Fields are private so a turn cannot change
/// after it has been recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Everything needed to ask the knowledge base one question
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub question: String,
    pub prompt_template: String,
    pub model_identifier: String,
    pub knowledge_base_identifier: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

// --- RetrieveAndGenerate wire format --- //

/// Request body for `POST /retrieveAndGenerate`
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateRequest {
    pub input: RetrieveAndGenerateInput,
    pub retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RetrieveAndGenerateInput {
    pub text: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateConfiguration {
    #[serde(rename = "type")]
    pub config_type: String,
    pub knowledge_base_configuration: KnowledgeBaseConfiguration,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeBaseConfiguration {
    pub knowledge_base_id: String,
    pub model_arn: String,
    pub generation_configuration: GenerationConfiguration,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfiguration {
    pub prompt_template: PromptTemplate,
    pub inference_config: InferenceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub text_prompt_template: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub text_inference_config: TextInferenceConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TextInferenceConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&GenerationRequest> for RetrieveAndGenerateRequest {
    fn from(request: &GenerationRequest) -> Self {
        Self {
            input: RetrieveAndGenerateInput {
                text: request.question.clone(),
            },
            retrieve_and_generate_configuration: RetrieveAndGenerateConfiguration {
                config_type: "KNOWLEDGE_BASE".to_string(),
                knowledge_base_configuration: KnowledgeBaseConfiguration {
                    knowledge_base_id: request.knowledge_base_identifier.clone(),
                    model_arn: request.model_identifier.clone(),
                    generation_configuration: GenerationConfiguration {
                        prompt_template: PromptTemplate {
                            text_prompt_template: request.prompt_template.clone(),
                        },
                        inference_config: InferenceConfig {
                            text_inference_config: TextInferenceConfig {
                                temperature: request.temperature,
                                max_tokens: request.max_tokens,
                            },
                        },
                    },
                },
            },
        }
    }
}

/// Response body of `POST /retrieveAndGenerate`
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RetrieveAndGenerateResponse {
    pub output: RetrieveAndGenerateOutput,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub citations: Vec<Value>,
}

#[derive(Deserialize, Debug)]
pub struct RetrieveAndGenerateOutput {
    pub text: String,
}

/// Error body returned by AWS JSON services
#[derive(Deserialize, Debug, Default)]
pub struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    pub error_type: Option<String>,
    #[serde(alias = "Message", default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> GenerationRequest {
        GenerationRequest {
            question: "How do I reset my password?".to_string(),
            prompt_template: "Context: $search_results$".to_string(),
            model_identifier: "arn:aws:bedrock:us-east-1::foundation-model/m".to_string(),
            knowledge_base_identifier: "KB123".to_string(),
            temperature: 0.5,
            max_tokens: 1000,
        }
    }

    #[test]
    fn test_wire_request_shape() {
        let body = RetrieveAndGenerateRequest::from(&sample_request());
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(
            value,
            json!({
                "input": { "text": "How do I reset my password?" },
                "retrieveAndGenerateConfiguration": {
                    "type": "KNOWLEDGE_BASE",
                    "knowledgeBaseConfiguration": {
                        "knowledgeBaseId": "KB123",
                        "modelArn": "arn:aws:bedrock:us-east-1::foundation-model/m",
                        "generationConfiguration": {
                            "promptTemplate": {
                                "textPromptTemplate": "Context: $search_results$"
                            },
                            "inferenceConfig": {
                                "textInferenceConfig": {
                                    "temperature": 0.5,
                                    "maxTokens": 1000
                                }
                            }
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_response_tolerates_extra_fields() {
        let raw = json!({
            "output": { "text": "Use the self-service portal." },
            "sessionId": "abc-123",
            "citations": [{ "retrievedReferences": [] }],
            "guardrailAction": "NONE"
        });
        let parsed: RetrieveAndGenerateResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.output.text, "Use the self-service portal.");
        assert_eq!(parsed.session_id.as_deref(), Some("abc-123"));
        assert_eq!(parsed.citations.len(), 1);
    }

    #[test]
    fn test_error_body_accepts_both_message_casings() {
        let lower: ServiceErrorBody =
            serde_json::from_str(r#"{"message":"bad kb"}"#).unwrap();
        let upper: ServiceErrorBody =
            serde_json::from_str(r#"{"__type":"ValidationException","Message":"bad kb"}"#).unwrap();
        assert_eq!(lower.message.as_deref(), Some("bad kb"));
        assert_eq!(upper.message.as_deref(), Some("bad kb"));
        assert_eq!(upper.error_type.as_deref(), Some("ValidationException"));
    }

    #[test]
    fn test_turn_serializes_lowercase_role() {
        let turn = Turn::assistant("hello");
        assert_eq!(
            serde_json::to_value(&turn).unwrap(),
            json!({ "role": "assistant", "content": "hello" })
        );
    }
}
