//! Answer generation: context assembly, provider fallback, and the
//! degraded context-echo path
//!
//! The orchestrator builds a grounded prompt from ranked chunks, walks the
//! configured provider chain until one answers, and otherwise returns a
//! deterministic answer assembled from the retrieved context itself, never
//! fabricated and always marked as degraded.

mod provider;
mod tone;

pub use provider::{GenerationProvider, HttpGenerationProvider};
pub use tone::{analyze_tone, ToneAnalysis};

use crate::config::GenerationConfig;
use crate::types::{QueryMode, ScoredChunk};
use std::sync::Arc;
use std::time::Duration;

/// Maximum characters of context echoed by the degraded fallback answer
const FALLBACK_CONTEXT_LIMIT: usize = 500;

/// Number of follow-up questions derived per answer
const FOLLOW_UP_COUNT: usize = 3;

/// A generated answer with its auxiliary signals
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub sources: Vec<String>,
    /// True when every provider failed and the answer is a context echo
    pub degraded: bool,
    pub follow_up_questions: Vec<String>,
    pub tone_score: Option<f32>,
}

/// Walks the provider chain and assembles prompts from retrieved context
pub struct GenerationOrchestrator {
    providers: Vec<Arc<dyn GenerationProvider>>,
    max_context_snippet: usize,
    response_timeout: Duration,
}

impl GenerationOrchestrator {
    /// Build the orchestrator from configuration: primary model first,
    /// then the configured fallbacks
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::with_providers(HttpGenerationProvider::chain(config), config)
    }

    /// Build with an explicit provider chain (dependency injection)
    pub fn with_providers(
        providers: Vec<Arc<dyn GenerationProvider>>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            providers,
            max_context_snippet: config.max_context_snippet,
            response_timeout: Duration::from_secs(config.response_timeout_secs),
        }
    }

    /// Generate an answer for a query over ranked context chunks
    ///
    /// Never returns an error: provider exhaustion, missing configuration,
    /// and timeouts all land on the degraded context-echo path.
    pub async fn generate(
        &self,
        query: &str,
        chunks: &[ScoredChunk],
        mode: QueryMode,
    ) -> GeneratedAnswer {
        let (context, sources) = build_context(chunks, self.max_context_snippet);

        if self.providers.is_empty() {
            tracing::warn!("No generation provider configured, using fallback answer");
            return self.fallback_answer(query, &context, sources);
        }

        let system_prompt = system_prompt(mode, &context);

        let attempt = self.try_providers(&system_prompt, query);
        let outcome = tokio::time::timeout(self.response_timeout, attempt).await;

        match outcome {
            Ok(Some((text, provider))) => {
                let follow_up_questions = self
                    .derive_follow_ups(provider.as_ref(), query, &text, &context)
                    .await;
                let tone_score = Some(analyze_tone(&text).score);

                GeneratedAnswer {
                    text,
                    sources,
                    degraded: false,
                    follow_up_questions,
                    tone_score,
                }
            }
            Ok(None) => {
                tracing::warn!("All generation providers failed, using fallback answer");
                self.fallback_answer(query, &context, sources)
            }
            Err(_) => {
                tracing::warn!(
                    "Generation timed out after {:?}, using fallback answer",
                    self.response_timeout
                );
                self.fallback_answer(query, &context, sources)
            }
        }
    }

    /// Try each provider in order, returning the first usable completion
    async fn try_providers(
        &self,
        system_prompt: &str,
        query: &str,
    ) -> Option<(String, Arc<dyn GenerationProvider>)> {
        for provider in &self.providers {
            match provider.complete(system_prompt, query).await {
                Ok(text) => {
                    tracing::debug!("Provider '{}' answered", provider.name());
                    return Some((text, provider.clone()));
                }
                Err(e) => {
                    tracing::warn!("Provider '{}' failed: {}", provider.name(), e);
                }
            }
        }
        None
    }

    /// Deterministic answer built directly from retrieved context
    fn fallback_answer(
        &self,
        query: &str,
        context: &str,
        sources: Vec<String>,
    ) -> GeneratedAnswer {
        let text = if context.is_empty() {
            format!(
                "Sorry, I couldn't find any relevant information about '{}' in the available \
                 content. [Answer generation is temporarily unavailable]",
                query
            )
        } else {
            let snippet: String = context.chars().take(FALLBACK_CONTEXT_LIMIT).collect();
            format!(
                "I found some information related to your question '{}' in the book content:\n\n\
                 {}...\n\n[Answer generation is temporarily unavailable - showing the retrieved \
                 context directly]",
                query, snippet
            )
        };

        GeneratedAnswer {
            text,
            sources,
            degraded: true,
            follow_up_questions: Vec::new(),
            tone_score: None,
        }
    }

    /// Best-effort follow-up questions; failures yield an empty list
    async fn derive_follow_ups(
        &self,
        provider: &dyn GenerationProvider,
        query: &str,
        answer: &str,
        context: &str,
    ) -> Vec<String> {
        let prompt = format!(
            "Based on the following query, answer, and context, generate {} follow-up \
             questions that would deepen the reader's understanding.\n\n\
             Original query: {}\n\nAnswer: {}\n\nContext: {}\n\n\
             Return only the questions as a numbered list, one per line.",
            FOLLOW_UP_COUNT, query, answer, context
        );

        match provider
            .complete("You write concise study questions for book readers.", &prompt)
            .await
        {
            Ok(text) => parse_follow_up_questions(&text),
            Err(e) => {
                tracing::debug!("Follow-up generation failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// Assemble the prompt context from ranked chunks
///
/// Each chunk contributes at most `max_snippet` characters; sources are
/// deduplicated in first-seen order.
pub fn build_context(chunks: &[ScoredChunk], max_snippet: usize) -> (String, Vec<String>) {
    let mut parts = Vec::with_capacity(chunks.len());
    let mut sources: Vec<String> = Vec::new();

    for chunk in chunks {
        if chunk.content.is_empty() {
            continue;
        }

        let snippet: String = chunk.content.chars().take(max_snippet).collect();
        parts.push(format!(
            "Section: {}\nSource: {}\nContent: {}",
            chunk.source_section, chunk.source_path, snippet
        ));

        if !chunk.source_path.is_empty() && !sources.contains(&chunk.source_path) {
            sources.push(chunk.source_path.clone());
        }
    }

    (parts.join("\n\n"), sources)
}

/// Mode-specific instruction set plus the assembled context
fn system_prompt(mode: QueryMode, context: &str) -> String {
    let context = if context.is_empty() {
        "No relevant content found in the book."
    } else {
        context
    };

    match mode {
        QueryMode::Global => format!(
            "You are an expert assistant for the book. Answer the user's question based on \
             the provided context from the book.\n\nContext:\n{}\n\nInstructions:\n\
             - Base your answer strictly on the provided context\n\
             - If the context doesn't contain relevant information, clearly say so\n\
             - Reference specific sections when possible\n\
             - Be helpful, accurate, and concise",
            context
        ),
        QueryMode::Local => format!(
            "You are an expert assistant for the book. Answer the user's question based ONLY \
             on the provided selected text.\n\nSelected text context:\n{}\n\nInstructions:\n\
             - Answer only from the provided context\n\
             - Do not include information not found in the context\n\
             - If the context doesn't contain enough information to answer, say so\n\
             - Be concise and accurate",
            context
        ),
    }
}

/// Parse a numbered list of questions, capped at `FOLLOW_UP_COUNT`
pub fn parse_follow_up_questions(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(['.', ')'])
                .trim()
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .take(FOLLOW_UP_COUNT)
        .collect()
}

#[cfg(test)]
pub(crate) use provider::test_support;

#[cfg(test)]
mod tests {
    use super::provider::test_support::ScriptedProvider;
    use super::*;
    use std::sync::atomic::Ordering;

    fn scored(content: &str, source: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            id: format!("id-{}", content.len()),
            score,
            content: content.to_string(),
            source_path: source.to_string(),
            source_section: "Intro".to_string(),
            content_preview: content.chars().take(200).collect(),
        }
    }

    fn config() -> GenerationConfig {
        GenerationConfig {
            response_timeout_secs: 5,
            max_context_snippet: 100,
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_build_context_dedupes_sources_and_bounds_snippets() {
        let chunks = vec![
            scored(&"a".repeat(300), "/intro.mdx", 0.9),
            scored("short", "/intro.mdx", 0.8),
            scored("other", "/nodes.mdx", 0.7),
        ];

        let (context, sources) = build_context(&chunks, 100);
        assert_eq!(sources, vec!["/intro.mdx".to_string(), "/nodes.mdx".to_string()]);
        // The oversize chunk is clipped to the snippet bound
        assert!(!context.contains(&"a".repeat(101)));
        assert!(context.contains(&"a".repeat(100)));
        assert!(context.contains("Section: Intro"));
    }

    #[test]
    fn test_parse_follow_up_questions() {
        let text = "1. What is a node?\n2. How do topics work?\n3. What are services?\n4. Extra?";
        let questions = parse_follow_up_questions(text);
        assert_eq!(
            questions,
            vec![
                "What is a node?".to_string(),
                "How do topics work?".to_string(),
                "What are services?".to_string(),
            ]
        );
    }

    #[test]
    fn test_parse_follow_up_questions_unnumbered() {
        let questions = parse_follow_up_questions("What is a node?\n\nHow do topics work?");
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0], "What is a node?");
    }

    #[tokio::test]
    async fn test_primary_provider_answers() {
        let primary = Arc::new(ScriptedProvider::answering("primary", "Nodes are processes."));
        let orchestrator = GenerationOrchestrator::with_providers(
            vec![primary.clone() as Arc<dyn GenerationProvider>],
            &config(),
        );

        let chunks = vec![scored("A node is a process.", "/nodes.mdx", 0.9)];
        let answer = orchestrator
            .generate("What are nodes?", &chunks, QueryMode::Global)
            .await;

        assert!(!answer.degraded);
        assert_eq!(answer.text, "Nodes are processes.");
        assert_eq!(answer.sources, vec!["/nodes.mdx".to_string()]);
        assert!(answer.tone_score.is_some());
    }

    #[tokio::test]
    async fn test_fallback_chain_tries_secondary() {
        let primary = Arc::new(ScriptedProvider::failing("primary", "rate limited"));
        let secondary = Arc::new(ScriptedProvider::answering("secondary", "From the backup."));
        let orchestrator = GenerationOrchestrator::with_providers(
            vec![
                primary.clone() as Arc<dyn GenerationProvider>,
                secondary.clone(),
            ],
            &config(),
        );

        let answer = orchestrator
            .generate("question", &[], QueryMode::Global)
            .await;

        assert!(!answer.degraded);
        assert_eq!(answer.text, "From the backup.");
        assert!(primary.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_all_providers_failing_yields_degraded_context_echo() {
        let a = Arc::new(ScriptedProvider::failing("a", "down")) as Arc<dyn GenerationProvider>;
        let b = Arc::new(ScriptedProvider::failing("b", "down"));
        let orchestrator = GenerationOrchestrator::with_providers(vec![a, b], &config());

        let chunks = vec![scored("A node is a process.", "/nodes.mdx", 0.9)];
        let answer = orchestrator
            .generate("What are nodes?", &chunks, QueryMode::Global)
            .await;

        assert!(answer.degraded);
        // The fallback echoes retrieved context, never fabricated text
        assert!(answer.text.contains("A node is a process."));
        assert!(answer.follow_up_questions.is_empty());
        assert!(answer.tone_score.is_none());
    }

    #[tokio::test]
    async fn test_no_providers_configured_is_degraded() {
        let orchestrator = GenerationOrchestrator::with_providers(vec![], &config());
        let answer = orchestrator
            .generate("What are nodes?", &[], QueryMode::Global)
            .await;

        assert!(answer.degraded);
        assert!(answer.text.contains("couldn't find any relevant information"));
    }

    #[tokio::test]
    async fn test_follow_ups_come_from_successful_provider() {
        let provider = Arc::new(ScriptedProvider::answering(
            "primary",
            "1. What is a topic?\n2. What is a service?",
        )) as Arc<dyn GenerationProvider>;
        let orchestrator = GenerationOrchestrator::with_providers(vec![provider], &config());

        let answer = orchestrator
            .generate("What are nodes?", &[], QueryMode::Global)
            .await;

        // The scripted provider returns the same text for the answer and
        // the follow-up call, so both parse from it
        assert_eq!(answer.follow_up_questions.len(), 2);
        assert_eq!(answer.follow_up_questions[0], "What is a topic?");
    }

    #[test]
    fn test_local_mode_prompt_restricts_to_excerpt() {
        let prompt = system_prompt(QueryMode::Local, "excerpt text");
        assert!(prompt.contains("ONLY"));
        assert!(prompt.contains("excerpt text"));

        let global = system_prompt(QueryMode::Global, "corpus context");
        assert!(global.contains("corpus context"));
        assert!(!global.contains("selected text"));
    }
}
