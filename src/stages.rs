//! The concrete pipeline: fetch, prepare and process per source, plus the
//! terminal join task.
//!
//! Each source community gets the same three stages, instantiated by
//! [`assemble`] from one parametrized definition. The join task depends on
//! every process stage and writes the sentinel that marks a completed run.

use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use camino::Utf8Path;

use crate::blueprint::{Blueprint, Handle, TaskContext};
use crate::client::{CommentNode, ForumClient};
use crate::target::FileTarget;
use crate::{stopwords, text};

/// How many hot threads are fetched per source.
pub const THREAD_LIMIT: u32 = 10;

/// How many entries the frequency table keeps.
pub const TOP_WORDS: usize = 50;

/// The source communities of the default pipeline.
pub const DEFAULT_SOURCES: [&str; 2] = ["politics", "conservative"];

const MODERATOR: &str = "AutoModerator";
const DELETED: &str = "[deleted]";
const SENTINEL: &str = "done";

/// The assembled pipeline definition: the blueprint itself, the terminal
/// join handle, and a name registry for resolving tasks from the CLI.
pub struct PipelinePlan {
    pub blueprint: Blueprint,
    pub join: Handle,
    tasks: Vec<(String, Handle)>,
}

impl PipelinePlan {
    pub fn lookup(&self, name: &str) -> Option<Handle> {
        self.tasks
            .iter()
            .find(|(task, _)| task == name)
            .map(|(_, handle)| *handle)
    }

    /// Task names in registration order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|(name, _)| name.as_str())
    }
}

/// Builds the task graph for the given sources.
///
/// Stage outputs land under `data_dir`; the join sentinel is written to
/// `sentinel`.
pub fn assemble(
    client: Arc<dyn ForumClient>,
    data_dir: &Utf8Path,
    sentinel: &Utf8Path,
    sources: &[&str],
    limit: u32,
) -> PipelinePlan {
    let mut blueprint = Blueprint::new();
    let mut tasks = Vec::new();
    let mut processed = Vec::new();

    for &source in sources {
        let fetch = {
            let client = client.clone();
            let source = source.to_string();
            blueprint
                .task()
                .name(format!("fetch-{source}"))
                .output(FileTarget::new(
                    data_dir.join(format!("{source}_comments.tsv")),
                ))
                .run(move |ctx: &TaskContext<'_>| write_comments(client.as_ref(), &source, limit, ctx))
        };
        tasks.push((format!("fetch-{source}"), fetch));

        let prepare = blueprint
            .task()
            .name(format!("prepare-{source}"))
            .depends_on([fetch])
            .output(FileTarget::new(
                data_dir.join(format!("prepared_{source}_comments.tsv")),
            ))
            .run(write_prepared);
        tasks.push((format!("prepare-{source}"), prepare));

        let process = blueprint
            .task()
            .name(format!("process-{source}"))
            .depends_on([prepare])
            .output(FileTarget::new(
                data_dir.join(format!("processed_{source}_comments.tsv")),
            ))
            .run(write_frequencies);
        tasks.push((format!("process-{source}"), process));
        processed.push(process);
    }

    let join = blueprint
        .task()
        .name("join")
        .depends_on(processed)
        .output(FileTarget::new(sentinel.to_owned()))
        .run(write_sentinel);
    tasks.push(("join".to_string(), join));

    PipelinePlan {
        blueprint,
        join,
        tasks,
    }
}

/// Fetch stage: one comment per line, newlines collapsed to spaces.
/// Placeholder nodes and moderator posts are expected noise, not errors.
fn write_comments(
    client: &dyn ForumClient,
    source: &str,
    limit: u32,
    ctx: &TaskContext<'_>,
) -> anyhow::Result<()> {
    let mut out = ctx.output().open_write()?;

    for thread in client.hot_threads(source, limit)? {
        for node in client.comments(&thread)? {
            let (author, body) = match node {
                CommentNode::Comment { author, body } => (author, body),
                CommentNode::More => {
                    tracing::debug!(thread = %thread.id, "skipping comment placeholder");
                    continue;
                }
            };
            if author.as_deref() == Some(MODERATOR) {
                tracing::debug!(thread = %thread.id, "skipping moderator comment");
                continue;
            }

            let line = body.replace('\n', " ");
            writeln!(out, "{line}")?;
        }
    }

    out.commit()?;
    Ok(())
}

/// Prepare stage: drop `[deleted]` comments, strip links, keep order.
fn write_prepared(ctx: &TaskContext<'_>) -> anyhow::Result<()> {
    let input = ctx.input().open_read()?;
    let mut out = ctx.output().open_write()?;

    for line in input.lines() {
        let line = line?;
        if line.trim() == DELETED {
            tracing::debug!("dropping deleted comment");
            continue;
        }
        writeln!(out, "{}", text::remove_links(&line))?;
    }

    out.commit()?;
    Ok(())
}

/// Process stage: frequency table of the non-stopword tokens, count
/// descending with lexical order breaking ties.
fn write_frequencies(ctx: &TaskContext<'_>) -> anyhow::Result<()> {
    let input = ctx.input().open_read()?;
    let mut counts: HashMap<String, usize> = HashMap::new();

    for line in input.lines() {
        let line = line?;
        let lowered = line.to_lowercase();
        let stripped = text::remove_punctuation(&lowered);
        for token in text::tokenize(&stripped) {
            if stopwords::ENGLISH.contains(token) {
                continue;
            }
            *counts.entry(token.to_owned()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut out = ctx.output().open_write()?;
    for (word, count) in ranked.into_iter().take(TOP_WORDS) {
        writeln!(out, "{word}\t{count}")?;
    }

    out.commit()?;
    Ok(())
}

/// Join stage: a synchronization point that marks the whole run as done.
fn write_sentinel(ctx: &TaskContext<'_>) -> anyhow::Result<()> {
    let mut out = ctx.output().open_write()?;
    write!(out, "{SENTINEL}")?;
    out.commit()?;
    Ok(())
}
