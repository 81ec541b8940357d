//! Static construction of the task graph.
//!
//! A [`Blueprint`] holds the task definitions and their dependency edges.
//! Tasks are registered through a small builder ([`Blueprint::task`]) and are
//! referred to afterwards by the [`Handle`] returned at registration, so the
//! graph is fully wired before anything runs. Once complete, the blueprint is
//! turned into a [`Pipeline`] which can resolve any task by handle.

use std::borrow::Cow;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::error::PipelineError;
use crate::executor::Resolution;
use crate::target::Target;

/// Result of a single task action.
pub type TaskResult = anyhow::Result<()>;

type ActionFn = Box<dyn Fn(&TaskContext<'_>) -> TaskResult + Send + Sync>;

pub(crate) struct Task {
    pub name: Cow<'static, str>,
    pub dependencies: Vec<NodeIndex>,
    pub target: Box<dyn Target>,
    pub action: ActionFn,
}

/// Everything a task action may touch: the targets of its dependencies on the
/// read side and its own target on the write side.
pub struct TaskContext<'a> {
    pub(crate) inputs: Vec<&'a dyn Target>,
    pub(crate) output: &'a dyn Target,
}

impl<'a> TaskContext<'a> {
    /// Targets of the task's dependencies, in declared order.
    pub fn inputs(&self) -> &[&'a dyn Target] {
        &self.inputs
    }

    /// Target of the sole dependency.
    ///
    /// # Panics
    /// Panics if the task declared no dependencies, which is a wiring bug.
    pub fn input(&self) -> &'a dyn Target {
        *self
            .inputs
            .first()
            .expect("task action asked for an input but declared no dependencies")
    }

    /// The task's own output target.
    pub fn output(&self) -> &'a dyn Target {
        self.output
    }
}

/// A reference to a task registered in a [`Blueprint`].
///
/// Handles are lightweight, copyable tokens. They are used to declare
/// dependencies between tasks and to select the resolution target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) index: NodeIndex,
}

impl Handle {
    /// Returns the underlying `NodeIndex` of the task in the graph.
    pub fn index(&self) -> NodeIndex {
        self.index
    }
}

/// The blueprint for a pipeline.
///
/// Add tasks with the [`Blueprint::task`] builder and wire them together with
/// their handles:
///
/// ```rust
/// use chattermill::{Blueprint, MemoryTarget, TaskContext};
///
/// let mut blueprint = Blueprint::new();
/// let first = blueprint
///     .task()
///     .name("first")
///     .output(MemoryTarget::new("first"))
///     .run(|_: &TaskContext<'_>| Ok(()));
/// blueprint
///     .task()
///     .name("second")
///     .depends_on([first])
///     .output(MemoryTarget::new("second"))
///     .run(|_: &TaskContext<'_>| Ok(()));
/// ```
pub struct Blueprint {
    pub(crate) graph: Graph<Task, ()>,
}

impl Blueprint {
    /// Creates a new, empty blueprint.
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    /// The entry point for registering a task.
    pub fn task(&mut self) -> TaskDef<'_> {
        TaskDef {
            blueprint: self,
            name: None,
            dependencies: Vec::new(),
        }
    }

    /// Seals the graph and returns the executable pipeline.
    pub fn finish(self) -> Pipeline {
        Pipeline { graph: self.graph }
    }

    pub(crate) fn add_task(&mut self, task: Task) -> Handle {
        let dependencies = task.dependencies.clone();
        let index = self.graph.add_node(task);

        for dependency in dependencies {
            self.graph.add_edge(dependency, index, ());
        }

        Handle { index }
    }
}

impl Default for Blueprint {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Blueprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let task = &self.graph[index];
            let name = task.name.replace('"', "\\\"");
            writeln!(f, "    {}[\"{}\"]", index.index(), name)?;
        }

        for edge in self.graph.edge_indices() {
            let (source, target) = self.graph.edge_endpoints(edge).unwrap();
            let locator = self.graph[source].target.locator();
            writeln!(
                f,
                "    {} -- \"{}\" --> {}",
                source.index(),
                locator,
                target.index()
            )?;
        }

        Ok(())
    }
}

pub struct TaskDef<'a> {
    blueprint: &'a mut Blueprint,
    name: Option<Cow<'static, str>>,
    dependencies: Vec<NodeIndex>,
}

impl<'a> TaskDef<'a> {
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declares the tasks whose outputs must exist before this one runs.
    /// The declared order is the order the action sees its inputs in.
    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = Handle>) -> Self {
        self.dependencies
            .extend(dependencies.into_iter().map(|handle| handle.index));
        self
    }

    /// Binds the task's output target.
    pub fn output(self, target: impl Target + 'static) -> TaskBinder<'a> {
        TaskBinder {
            blueprint: self.blueprint,
            name: self.name,
            dependencies: self.dependencies,
            target: Box::new(target),
        }
    }
}

pub struct TaskBinder<'a> {
    blueprint: &'a mut Blueprint,
    name: Option<Cow<'static, str>>,
    dependencies: Vec<NodeIndex>,
    target: Box<dyn Target>,
}

impl<'a> TaskBinder<'a> {
    pub fn run<F>(self, action: F) -> Handle
    where
        F: Fn(&TaskContext<'_>) -> TaskResult + Send + Sync + 'static,
    {
        self.blueprint.add_task(Task {
            name: self
                .name
                .unwrap_or_else(|| std::any::type_name::<F>().into()),
            dependencies: self.dependencies,
            target: self.target,
            action: Box::new(action),
        })
    }
}

/// The sealed task graph, ready to resolve targets.
pub struct Pipeline {
    pub(crate) graph: Graph<Task, ()>,
}

impl Pipeline {
    /// Brings the target task's output into existence.
    ///
    /// Every task in the target's transitive dependency closure whose output
    /// is missing is run exactly once, in dependency order; tasks whose
    /// outputs already exist are skipped without looking further upstream.
    /// The first failing action halts resolution with the task's name in the
    /// error; its output stays absent, so the next resolution retries it.
    pub fn resolve(&self, target: Handle) -> Result<Resolution, PipelineError> {
        crate::executor::resolve(self, target)
    }
}
