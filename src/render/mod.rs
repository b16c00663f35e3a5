//! Answer Rendering
//!
//! Turns (possibly still streaming) answer text into display markup.

mod markdown;

pub use markdown::MarkdownRenderer;

/// Stateless text-to-markup conversion
pub trait Render {
    fn render(&self, text: &str) -> String;
}
