//! The external text generator contract, reduced to an async trait so
//! this crate never depends on a specific LLM SDK.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    #[error("generator call failed: {0}")]
    Failed(String),
}

/// `generate(prompt) -> text`, called only from the `query` applier with
/// the context's current text plus the literal suffix `"\nAnswer: "`.
/// Implementations must be safe to call concurrently from multiple nodes;
/// a failure causes the `query` slot to apply without an answer, never to
/// abort the slot.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError>;
}

/// Deterministic default/test generator: echoes the prompt's length back
/// as its answer. The only implementation this crate ships — wiring a real
/// model behind `GEMINI_API_KEY` is left to the integrator.
#[derive(Debug, Default)]
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GeneratorError> {
        Ok(format!("echo:{}", prompt.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_generator_is_deterministic() {
        let gen = EchoGenerator;
        let a = gen.generate("hello").await.unwrap();
        let b = gen.generate("hello").await.unwrap();
        assert_eq!(a, b);
    }
}
