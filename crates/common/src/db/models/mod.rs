//! SeaORM entity models
//!
//! Database entities for Borrowed Brain

mod chat_message;
mod chat_session;
mod chunk;
mod episode;
mod library_entry;
mod podcast;
mod sync_job;
mod synced_episode;
mod transcript;
mod usage;

pub use podcast::{
    Entity as PodcastEntity,
    Model as Podcast,
    ActiveModel as PodcastActiveModel,
    Column as PodcastColumn,
};

pub use episode::{
    Entity as EpisodeEntity,
    Model as Episode,
    ActiveModel as EpisodeActiveModel,
    Column as EpisodeColumn,
};

pub use transcript::{
    Entity as TranscriptEntity,
    Model as Transcript,
    ActiveModel as TranscriptActiveModel,
    Column as TranscriptColumn,
};

pub use library_entry::{
    Entity as LibraryEntryEntity,
    Model as LibraryEntry,
    ActiveModel as LibraryEntryActiveModel,
    Column as LibraryEntryColumn,
};

pub use synced_episode::{
    Entity as SyncedEpisodeEntity,
    Model as SyncedEpisode,
    ActiveModel as SyncedEpisodeActiveModel,
    Column as SyncedEpisodeColumn,
};

pub use sync_job::{
    Entity as SyncJobEntity,
    Model as SyncJob,
    ActiveModel as SyncJobActiveModel,
    Column as SyncJobColumn,
};

pub use chat_session::{
    Entity as ChatSessionEntity,
    Model as ChatSession,
    ActiveModel as ChatSessionActiveModel,
    Column as ChatSessionColumn,
    ContextScope,
};

pub use chat_message::{
    Entity as ChatMessageEntity,
    Model as ChatMessage,
    ActiveModel as ChatMessageActiveModel,
    Column as ChatMessageColumn,
    MessageRole,
};

pub use chunk::{
    Entity as ChunkEntity,
    Model as Chunk,
    ActiveModel as ChunkActiveModel,
    Column as ChunkColumn,
};

pub use usage::{
    Entity as UsageLedgerEntity,
    Model as UsageLedger,
    ActiveModel as UsageLedgerActiveModel,
    Column as UsageLedgerColumn,
};
