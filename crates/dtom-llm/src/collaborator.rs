//! [`MatrixCollaborator`] backed by a chat completion endpoint.

use async_trait::async_trait;
use dtom_core::{
    CharacterDefinition, CharacterSchema, MatrixCollaborator, ServiceError, ServiceResult,
    ValidationVerdict,
};
use tracing::{debug, warn};

use crate::client::ChatClient;
use crate::config::LlmConfig;
use crate::error::Result;
use crate::prompts;
use crate::reply;

pub struct OpenAiCollaborator {
    client: ChatClient,
}

impl OpenAiCollaborator {
    pub fn new(config: LlmConfig) -> Result<Self> {
        Ok(OpenAiCollaborator {
            client: ChatClient::new(config)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::from_env())
    }

    pub fn config(&self) -> &LlmConfig {
        self.client.config()
    }
}

#[async_trait]
impl MatrixCollaborator for OpenAiCollaborator {
    async fn propose_schema(&self, corpus: &str) -> ServiceResult<CharacterSchema> {
        let text = self
            .client
            .complete(prompts::SCHEMA_SYSTEM, &prompts::schema_prompt(corpus))
            .await?;
        reply::parse_schema_reply(&text).map_err(|e| {
            warn!(error = %e, "schema reply rejected");
            ServiceError::MalformedReply(e.to_string())
        })
    }

    async fn extract_state(
        &self,
        description: &str,
        character: &CharacterDefinition,
    ) -> ServiceResult<String> {
        let text = self
            .client
            .complete(
                prompts::EXTRACTION_SYSTEM,
                &prompts::extraction_prompt(description, character),
            )
            .await?;
        Ok(text)
    }

    async fn audit_matrix(
        &self,
        description: &str,
        schema: &CharacterSchema,
        formatted_row: &str,
    ) -> ServiceResult<Vec<ValidationVerdict>> {
        let text = self
            .client
            .complete(
                prompts::AUDIT_SYSTEM,
                &prompts::audit_prompt(description, schema, formatted_row),
            )
            .await?;

        let verdicts = reply::parse_audit_report(&text);
        if verdicts.is_empty() {
            return Err(ServiceError::MalformedReply(
                "audit report contained no character verdicts".to_string(),
            ));
        }
        debug!(verdicts = verdicts.len(), "audit report decoded");
        Ok(verdicts)
    }
}
