//! # yamato-providers
//!
//! The chat-completion client and the persona that turns its output into
//! in-character replies.

pub mod openai;
pub mod persona;

pub use openai::OpenAiProvider;
pub use persona::{Persona, PersonaReply, PersonaRequest};
