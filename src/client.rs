//! The seam between the pipeline and the forum platform.
//!
//! The fetch stage only needs two reads: the currently hot threads of a
//! source community and the top-level comment nodes of a thread. Keeping this
//! behind a trait lets the stage tests script the platform instead of
//! touching the network.

use crate::error::ClientError;

/// A discussion thread as returned by the platform's listing endpoint.
#[derive(Debug, Clone)]
pub struct Thread {
    pub id: String,
    pub title: String,
}

/// A node in a thread's top-level comment listing.
#[derive(Debug, Clone)]
pub enum CommentNode {
    /// A real comment. `author` is `None` when the account is gone.
    Comment {
        author: Option<String>,
        body: String,
    },
    /// Placeholder standing in for comments not included in the listing.
    More,
}

pub trait ForumClient: Send + Sync {
    /// Lists up to `limit` currently hot threads in `source`, in the
    /// platform's ranking order.
    fn hot_threads(&self, source: &str, limit: u32) -> Result<Vec<Thread>, ClientError>;

    /// The top-level comment nodes of a thread, in listing order.
    fn comments(&self, thread: &Thread) -> Result<Vec<CommentNode>, ClientError>;
}
