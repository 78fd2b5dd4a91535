//! A small state-graph executor.
//!
//! The topology (nodes, fixed edges, conditional edges) is plain data handed
//! to [`GraphBuilder`]; nothing about the trading workflow is built in here.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use tradegraph_models::{StateUpdate, WorkflowState};

use crate::error::AgentError;

/// Sink name: routing here finishes the run.
pub const END: &str = "__end__";

pub const DEFAULT_MAX_STEPS: usize = 100;

/// A unit of work that reads the state and returns a partial update.
#[async_trait]
pub trait Node: Send + Sync {
    async fn run(&self, state: &WorkflowState) -> Result<StateUpdate, AgentError>;
}

pub type RouteFn = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

#[derive(Clone)]
pub enum Edge {
    To(String),
    /// `route` must return one of `targets`.
    Conditional { route: RouteFn, targets: Vec<String> },
}

impl Edge {
    fn targets(&self) -> Vec<&str> {
        match self {
            Edge::To(target) => vec![target.as_str()],
            Edge::Conditional { targets, .. } => targets.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Default)]
pub struct GraphBuilder {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: Option<String>,
    max_steps: Option<usize>,
    problems: Vec<String>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, name: impl Into<String>, node: Arc<dyn Node>) -> Self {
        let name = name.into();
        if name == END {
            self.problems.push(format!("`{END}` is reserved"));
        }
        if self.nodes.insert(name.clone(), node).is_some() {
            self.problems.push(format!("node `{name}` added twice"));
        }
        self
    }

    pub fn edge(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.add_edge(from.into(), Edge::To(to.into()))
    }

    pub fn conditional_edge<F>(self, from: impl Into<String>, targets: &[&str], route: F) -> Self
    where
        F: Fn(&WorkflowState) -> String + Send + Sync + 'static,
    {
        self.add_edge(
            from.into(),
            Edge::Conditional {
                route: Arc::new(route),
                targets: targets.iter().map(|t| t.to_string()).collect(),
            },
        )
    }

    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    fn add_edge(mut self, from: String, edge: Edge) -> Self {
        if self.edges.insert(from.clone(), edge).is_some() {
            self.problems.push(format!("node `{from}` has more than one outgoing edge"));
        }
        self
    }

    pub fn build(mut self) -> Result<Graph, AgentError> {
        let entry = match self.entry.take() {
            Some(entry) if self.nodes.contains_key(&entry) => entry,
            Some(entry) => {
                self.problems.push(format!("entry `{entry}` is not a node"));
                entry
            }
            None => {
                self.problems.push("no entry node".to_string());
                String::new()
            }
        };

        let mut reaches_end = false;
        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                self.problems.push(format!("edge from unknown node `{from}`"));
            }
            for target in edge.targets() {
                if target == END {
                    reaches_end = true;
                } else if !self.nodes.contains_key(target) {
                    self.problems
                        .push(format!("edge `{from}` -> `{target}` targets an unknown node"));
                }
            }
        }
        let mut missing: Vec<&String> = self
            .nodes
            .keys()
            .filter(|name| !self.edges.contains_key(*name))
            .collect();
        missing.sort();
        for name in missing {
            self.problems.push(format!("node `{name}` has no outgoing edge"));
        }
        if !reaches_end {
            self.problems.push(format!("no edge leads to `{END}`"));
        }

        if !self.problems.is_empty() {
            return Err(AgentError::InvalidGraph(self.problems.join("; ")));
        }

        Ok(Graph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
            max_steps: self.max_steps.unwrap_or(DEFAULT_MAX_STEPS),
        })
    }
}

pub struct Graph {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: HashMap<String, Edge>,
    entry: String,
    max_steps: usize,
}

impl Graph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn node_names(&self) -> BTreeSet<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// Begin a run at the entry node.
    pub fn start(&self, state: WorkflowState) -> Execution<'_> {
        Execution {
            graph: self,
            state,
            next: Some(self.entry.clone()),
            steps: 0,
        }
    }

    /// Begin a run at an arbitrary node, e.g. to replay one phase.
    pub fn start_at(&self, node: &str, state: WorkflowState) -> Result<Execution<'_>, AgentError> {
        if !self.nodes.contains_key(node) {
            return Err(AgentError::UnknownNode(node.to_string()));
        }
        Ok(Execution {
            graph: self,
            state,
            next: Some(node.to_string()),
            steps: 0,
        })
    }

    /// Run to completion and return the final state.
    pub async fn invoke(&self, state: WorkflowState) -> Result<WorkflowState, AgentError> {
        let mut execution = self.start(state);
        while execution.step().await?.is_some() {}
        Ok(execution.into_state())
    }

    fn successor(&self, from: &str, state: &WorkflowState) -> Result<Option<String>, AgentError> {
        let edge = self
            .edges
            .get(from)
            .ok_or_else(|| AgentError::InvalidGraph(format!("node `{from}` has no outgoing edge")))?;
        let next = match edge {
            Edge::To(target) => target.clone(),
            Edge::Conditional { route, targets } => {
                let chosen = route(state);
                if !targets.contains(&chosen) {
                    return Err(AgentError::UnknownNode(chosen));
                }
                chosen
            }
        };
        debug!(from, to = %next, "Routing");
        Ok((next != END).then_some(next))
    }
}

/// One completed node.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub node: String,
    pub update: StateUpdate,
}

/// An in-progress run, advanced one node at a time.
pub struct Execution<'g> {
    graph: &'g Graph,
    state: WorkflowState,
    next: Option<String>,
    steps: usize,
}

impl Execution<'_> {
    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn into_state(self) -> WorkflowState {
        self.state
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn next_node(&self) -> Option<&str> {
        self.next.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }

    /// Run the next node, merge its update and pick the successor.
    /// Returns `Ok(None)` once the run has reached [`END`].
    pub async fn step(&mut self) -> Result<Option<StepOutcome>, AgentError> {
        let Some(name) = self.next.clone() else {
            return Ok(None);
        };
        if self.steps >= self.graph.max_steps {
            return Err(AgentError::WorkflowAborted { steps: self.steps });
        }
        let node = self
            .graph
            .nodes
            .get(&name)
            .ok_or_else(|| AgentError::UnknownNode(name.clone()))?;

        info!(node = %name, step = self.steps + 1, "Running node");
        let update = node.run(&self.state).await?;
        self.state.apply(update.clone())?;
        self.steps += 1;
        self.next = self.graph.successor(&name, &self.state)?;

        Ok(Some(StepOutcome { node: name, update }))
    }
}
