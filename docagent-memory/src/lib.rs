//! Doc Agent Memory Layer
//!
//! Client for the MemMachine memory service. The agent uses it to remember
//! which documentation a user fetched, and to surface that history the next
//! time a similar question comes in.
//!
//! ## Example
//!
//! ```ignore
//! use docagent_memory::{build_context_prompt, MemoryClient, MemoryClientConfig, RetrievalEpisode};
//!
//! let client = MemoryClient::new(MemoryClientConfig::default())?;
//!
//! let hits = client.search_similar("fastapi routing", "zed_user", 3).await?;
//! println!("{}", build_context_prompt(&hits, "fastapi routing"));
//!
//! let episode = RetrievalEpisode::builder()
//!     .user_query("fastapi routing")
//!     .library("fastapi", "/fastapi/fastapi")
//!     .docs(&docs)
//!     .success(true)
//!     .build()?;
//! client.store_episode("zed_user", &episode).await?;
//! ```

pub mod client;
pub mod episode;
pub mod error;
pub mod search;
pub mod session;

// Re-exports for convenience
pub use client::{MemoryClient, MemoryClientConfig, DEFAULT_BASE_URL};
pub use episode::{preview, EpisodeBuilderError, RetrievalEpisode, RetrievalEpisodeBuilder};
pub use error::MemoryError;
pub use search::{build_context_prompt, MemoryHits, SearchFilter, SearchRequest};
pub use session::SessionScope;
