//! Escalation classification
//!
//! Decides per query whether a conversation must be handed to a human agent.
//! Two strategies share one interface and are chosen by configuration:
//! trigger-phrase rules, or a rubric judged by the generation model.


use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::settings::validate_triggers;
use crate::config::{EscalationConfig, EscalationStrategy};
use crate::generation::Generator;
use crate::{Result, SupportError};

/// Outcome of classifying one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationDecision {
    pub escalate: bool,
    /// Matched trigger phrase or the model's verdict
    pub reason: Option<String>,
}

impl EscalationDecision {
    #[inline]
    pub fn continue_automated() -> Self {
        Self {
            escalate: false,
            reason: None,
        }
    }

    #[inline]
    pub fn escalate(reason: impl Into<String>) -> Self {
        Self {
            escalate: true,
            reason: Some(reason.into()),
        }
    }
}

/// Case-insensitive trigger phrase matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRules {
    /// Lowercased phrases
    triggers: Vec<String>,
}

impl TriggerRules {
    #[inline]
    pub fn new(triggers: &[String]) -> Result<Self> {
        validate_triggers(triggers)?;
        Ok(Self {
            triggers: triggers.iter().map(|t| t.trim().to_lowercase()).collect(),
        })
    }

    #[inline]
    pub fn triggers(&self) -> &[String] {
        &self.triggers
    }

    /// First trigger phrase contained in `query`, if any
    #[inline]
    pub fn matched(&self, query: &str) -> Option<&str> {
        let lower = query.to_lowercase();
        self.triggers
            .iter()
            .find(|trigger| lower.contains(trigger.as_str()))
            .map(String::as_str)
    }
}

const ESCALATION_RUBRIC: &str = "You are screening customer support messages. \
Decide whether this message should be handed to a human support agent.

Escalate when the message shows any of:
- a complex problem that requires human judgement
- strong negative emotion such as anger or distress
- a sensitive issue such as billing disputes or account security
- an explicit request to speak with a human
- a possible emergency

Reply with exactly one word: ESCALATE or CONTINUE.";

/// Rubric-based judgement delegated to the generation capability
#[derive(Clone)]
pub struct ModelJudge {
    generator: Arc<dyn Generator>,
}

impl fmt::Debug for ModelJudge {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelJudge")
            .field("generator", &self.generator.model_name())
            .finish()
    }
}

impl ModelJudge {
    #[inline]
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    fn judge(&self, query: &str) -> Result<EscalationDecision> {
        let prompt = format!(
            "{}\n\nCustomer message:\n{}\n\nVerdict:",
            ESCALATION_RUBRIC,
            query.trim()
        );
        let verdict = self
            .generator
            .generate(&prompt, None)
            .map_err(|e| SupportError::Classification(e.to_string()))?;

        debug!("Escalation model verdict: {}", verdict.trim());
        if verdict.to_lowercase().contains("escalate") {
            Ok(EscalationDecision::escalate(format!(
                "model verdict: {}",
                verdict.trim()
            )))
        } else {
            Ok(EscalationDecision::continue_automated())
        }
    }
}

#[derive(Debug, Clone)]
pub enum EscalationClassifier {
    RuleBased(TriggerRules),
    ModelBased(ModelJudge),
}

impl EscalationClassifier {
    /// Rule-based classifier with the default trigger phrases
    #[inline]
    pub fn rule_based_default() -> Result<Self> {
        Self::from_config(
            &EscalationConfig::default(),
            None::<Arc<dyn Generator>>,
        )
    }

    /// Build the configured strategy; the model strategy requires `generator`
    #[inline]
    pub fn from_config(
        config: &EscalationConfig,
        generator: Option<Arc<dyn Generator>>,
    ) -> Result<Self> {
        match config.strategy {
            EscalationStrategy::Rule => Ok(Self::RuleBased(TriggerRules::new(&config.triggers)?)),
            EscalationStrategy::Model => {
                let generator = generator.ok_or_else(|| {
                    SupportError::Configuration(
                        "Model-based escalation requires a generation capability".to_string(),
                    )
                })?;
                Ok(Self::ModelBased(ModelJudge::new(generator)))
            }
        }
    }

    #[inline]
    pub fn strategy(&self) -> EscalationStrategy {
        match self {
            Self::RuleBased(_) => EscalationStrategy::Rule,
            Self::ModelBased(_) => EscalationStrategy::Model,
        }
    }

    /// Classify `query`, keeping the reason for the verdict
    ///
    /// Empty or whitespace-only queries never escalate and make no external call.
    #[inline]
    pub fn classify_decision(&self, query: &str) -> Result<EscalationDecision> {
        if query.trim().is_empty() {
            return Ok(EscalationDecision::continue_automated());
        }

        let decision = match self {
            Self::RuleBased(rules) => rules
                .matched(query)
                .map_or_else(EscalationDecision::continue_automated, |trigger| {
                    EscalationDecision::escalate(format!("matched trigger '{}'", trigger))
                }),
            Self::ModelBased(judge) => judge.judge(query).inspect_err(|e| {
                warn!("Model-based escalation failed: {}", e);
            })?,
        };

        if decision.escalate {
            info!(
                "Escalating query ({})",
                decision.reason.as_deref().unwrap_or("no reason")
            );
        }
        Ok(decision)
    }

    #[inline]
    pub fn classify(&self, query: &str) -> Result<bool> {
        Ok(self.classify_decision(query)?.escalate)
    }
}
