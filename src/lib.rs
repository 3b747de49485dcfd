//! deepclaude — two-model stream stitching behind one chat-completion API.
//!
//! A request for the composed model runs a reasoning model first, streams
//! its thinking to the client as it arrives, then feeds the transcript to an
//! answer model and streams that too, all as one
//! `chat.completion.chunk` SSE stream.
//!
//! # Quick Start
//!
//! ```no_run
//! use deepclaude::config::Config;
//!
//! # async fn example() -> deepclaude::error::Result<()> {
//! let config = Config::load(None)?;
//! config.validate()?;
//! deepclaude::server::serve(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod server;
pub mod stitch;
pub mod types;
pub mod upstream;
