//! Resolution of a target task against the graph.
//!
//! The walk is sequential: one action runs to completion before the next
//! begins. A task whose output already exists is a boundary, nothing upstream
//! of it is even examined. A failing action halts the walk; outputs committed
//! earlier stay on disk, the failed task's output stays absent, and a later
//! invocation picks up from exactly the failed task.

use std::collections::HashSet;

use indicatif::{ProgressBar, ProgressStyle};
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;

use crate::blueprint::{Handle, Pipeline, TaskContext};
use crate::error::PipelineError;
use crate::target::Target;

/// What happened to a single task during one resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The action was invoked and committed its output.
    Ran,
    /// The output already existed, so the action was not invoked.
    Skipped,
}

/// Per-task outcomes of one resolution, in execution order.
#[derive(Debug, Default)]
pub struct Resolution {
    pub outcomes: Vec<(String, Outcome)>,
}

impl Resolution {
    /// Number of tasks whose action actually ran.
    pub fn ran(&self) -> usize {
        self.count(Outcome::Ran)
    }

    /// Number of tasks skipped because their output already existed.
    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skipped)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| *o == outcome)
            .count()
    }
}

pub(crate) fn resolve(pipeline: &Pipeline, target: Handle) -> Result<Resolution, PipelineError> {
    // A cycle anywhere in the graph is a malformed definition, caught before
    // any action runs.
    let order = toposort(&pipeline.graph, None)
        .map_err(|cycle| PipelineError::Cycle(pipeline.graph[cycle.node_id()].name.to_string()))?;

    // Walk upstream from the target, but do not expand past tasks whose
    // output already exists. Those are complete, their dependencies are
    // nobody's business this run.
    let mut needed: HashSet<NodeIndex> = HashSet::new();
    let mut stack = vec![target.index];
    while let Some(index) = stack.pop() {
        if !needed.insert(index) {
            continue;
        }
        let task = &pipeline.graph[index];
        if !task.target.exists() {
            stack.extend(task.dependencies.iter().copied());
        }
    }

    let plan: Vec<NodeIndex> = order
        .into_iter()
        .filter(|index| needed.contains(index))
        .collect();

    let bar = ProgressBar::new(plan.len() as u64).with_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("Error setting progress bar template")
            .progress_chars("#>-"),
    );

    let mut resolution = Resolution::default();

    for index in plan {
        let task = &pipeline.graph[index];
        bar.set_message(task.name.to_string());

        if task.target.exists() {
            tracing::debug!(task = %task.name, output = %task.target.locator(), "output present, skipping");
            resolution.outcomes.push((task.name.to_string(), Outcome::Skipped));
            bar.inc(1);
            continue;
        }

        let span = tracing::info_span!("task", name = %task.name);
        let _enter = span.enter();
        tracing::info!(output = %task.target.locator(), "running");

        let inputs: Vec<&dyn Target> = task
            .dependencies
            .iter()
            .map(|&dep| pipeline.graph[dep].target.as_ref())
            .collect();
        let context = TaskContext {
            inputs,
            output: task.target.as_ref(),
        };

        (task.action)(&context)
            .map_err(|err| PipelineError::Task(task.name.to_string(), err))?;

        if !task.target.exists() {
            return Err(PipelineError::Task(
                task.name.to_string(),
                anyhow::anyhow!(
                    "action completed but did not produce '{}'",
                    task.target.locator()
                ),
            ));
        }

        resolution.outcomes.push((task.name.to_string(), Outcome::Ran));
        bar.inc(1);
    }

    bar.finish_and_clear();
    Ok(resolution)
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::blueprint::{Blueprint, Handle};
    use crate::target::MemoryTarget;

    /// A task that records its own name when run and commits an empty output.
    fn recorded(
        blueprint: &mut Blueprint,
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
        target: MemoryTarget,
        dependencies: impl IntoIterator<Item = Handle>,
    ) -> Handle {
        let log = log.clone();
        blueprint
            .task()
            .name(name)
            .depends_on(dependencies)
            .output(target)
            .run(move |ctx: &TaskContext<'_>| {
                log.lock().unwrap().push(name);
                ctx.output().open_write()?.commit()?;
                Ok(())
            })
    }

    #[test]
    fn resolves_dependencies_before_dependents() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();

        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);
        let b = recorded(&mut blueprint, &log, "b", MemoryTarget::new("b"), []);
        let c = recorded(&mut blueprint, &log, "c", MemoryTarget::new("c"), [a, b]);

        let pipeline = blueprint.finish();
        let resolution = pipeline.resolve(c).unwrap();

        assert_eq!(resolution.ran(), 3);
        let order = log.lock().unwrap().clone();
        let pos = |name| order.iter().position(|&n| n == name).unwrap();
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn inputs_exist_when_action_begins() {
        let mut blueprint = Blueprint::new();
        let upstream = MemoryTarget::new("upstream");

        let a = {
            let upstream = upstream.clone();
            blueprint
                .task()
                .name("a")
                .output(upstream)
                .run(|ctx: &TaskContext<'_>| {
                    let mut out = ctx.output().open_write()?;
                    writeln!(out, "payload")?;
                    out.commit()?;
                    Ok(())
                })
        };

        let b = blueprint
            .task()
            .name("b")
            .depends_on([a])
            .output(MemoryTarget::new("b"))
            .run(|ctx: &TaskContext<'_>| {
                assert!(ctx.inputs().iter().all(|input| input.exists()));
                ctx.output().open_write()?.commit()?;
                Ok(())
            });

        let pipeline = blueprint.finish();
        pipeline.resolve(b).unwrap();
        assert!(upstream.exists());
    }

    #[test]
    fn existing_output_is_a_boundary() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();

        // b's output already exists, so a must not run even though its own
        // output is missing.
        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);
        let b = recorded(
            &mut blueprint,
            &log,
            "b",
            MemoryTarget::seeded("b", "cached"),
            [a],
        );
        let c = recorded(&mut blueprint, &log, "c", MemoryTarget::new("c"), [b]);

        let pipeline = blueprint.finish();
        let resolution = pipeline.resolve(c).unwrap();

        assert_eq!(log.lock().unwrap().clone(), vec!["c"]);
        assert_eq!(resolution.ran(), 1);
        assert_eq!(resolution.skipped(), 1);
    }

    #[test]
    fn second_resolution_performs_no_work() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();

        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);
        let b = recorded(&mut blueprint, &log, "b", MemoryTarget::new("b"), [a]);

        let pipeline = blueprint.finish();

        let first = pipeline.resolve(b).unwrap();
        assert_eq!(first.ran(), 2);
        assert_eq!(log.lock().unwrap().len(), 2);

        let second = pipeline.resolve(b).unwrap();
        assert_eq!(second.ran(), 0);
        assert_eq!(log.lock().unwrap().len(), 2, "no action may run twice");
    }

    #[test]
    fn cycle_is_fatal_before_any_action() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();

        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);
        let b = recorded(&mut blueprint, &log, "b", MemoryTarget::new("b"), [a]);
        // Close the loop behind the builder's back.
        blueprint.graph.add_edge(b.index(), a.index(), ());

        let pipeline = blueprint.finish();
        let err = pipeline.resolve(b).unwrap_err();

        assert!(matches!(err, PipelineError::Cycle(_)));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failure_halts_and_leaves_failed_task_retryable() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();
        let fail = Arc::new(Mutex::new(true));

        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);

        let flaky_target = MemoryTarget::new("flaky");
        let flaky = {
            let fail = fail.clone();
            let log = log.clone();
            blueprint
                .task()
                .name("flaky")
                .depends_on([a])
                .output(flaky_target.clone())
                .run(move |ctx: &TaskContext<'_>| {
                    log.lock().unwrap().push("flaky");
                    if *fail.lock().unwrap() {
                        anyhow::bail!("downstream service unavailable");
                    }
                    ctx.output().open_write()?.commit()?;
                    Ok(())
                })
        };

        let c = recorded(&mut blueprint, &log, "c", MemoryTarget::new("c"), [flaky]);

        let pipeline = blueprint.finish();
        let err = pipeline.resolve(c).unwrap_err();
        assert!(matches!(err, PipelineError::Task(ref name, _) if name == "flaky"));
        assert!(!flaky_target.exists());
        assert_eq!(log.lock().unwrap().clone(), vec!["a", "flaky"]);

        // The next invocation skips `a` and retries from the failure point.
        *fail.lock().unwrap() = false;
        let resolution = pipeline.resolve(c).unwrap();
        assert_eq!(resolution.ran(), 2);
        assert_eq!(resolution.skipped(), 1);
        assert_eq!(log.lock().unwrap().clone(), vec!["a", "flaky", "flaky", "c"]);
    }

    #[test]
    fn action_must_produce_its_output() {
        let mut blueprint = Blueprint::new();
        let lazy = blueprint
            .task()
            .name("lazy")
            .output(MemoryTarget::new("lazy"))
            .run(|_: &TaskContext<'_>| Ok(()));

        let pipeline = blueprint.finish();
        let err = pipeline.resolve(lazy).unwrap_err();
        assert!(matches!(err, PipelineError::Task(ref name, _) if name == "lazy"));
    }

    #[test]
    fn resolving_an_existing_target_ignores_missing_ancestors() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut blueprint = Blueprint::new();

        let a = recorded(&mut blueprint, &log, "a", MemoryTarget::new("a"), []);
        let b = recorded(
            &mut blueprint,
            &log,
            "b",
            MemoryTarget::seeded("b", "done"),
            [a],
        );

        let pipeline = blueprint.finish();
        let resolution = pipeline.resolve(b).unwrap();

        assert_eq!(resolution.ran(), 0);
        assert_eq!(resolution.skipped(), 1);
        assert!(log.lock().unwrap().is_empty());
    }
}
