//! Image provider adapters.

mod gemini;
mod scripted;

pub use gemini::{API_BASE, DEFAULT_MODEL, GeminiCredentials, GeminiImageProvider};
pub use scripted::{ScriptedImageProvider, image};
