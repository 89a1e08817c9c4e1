//! External gateway clients
//!
//! Thin, typed clients over the SaaS collaborators: the podcast
//! catalog, the speech-to-text service, and the chat model. Each
//! exposes a narrow trait so the pipeline and tests never depend on a
//! vendor SDK surface.

pub mod catalog;
pub mod chat;
pub mod transcription;

pub use catalog::{CatalogApi, CatalogClient, CatalogEpisode, CatalogPodcast, CatalogTranscript};
pub use chat::{ChatModel, ChatTurn, MockChatModel, OpenAIChatClient, TokenStream};
pub use transcription::{SpeechToText, Transcription, TranscriptionClient, Utterance};
