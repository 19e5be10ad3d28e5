// src/dag/graph.rs

use std::collections::{HashMap, VecDeque};

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::config::model::{Task, task_name_problem};
use crate::errors::{ClampanyError, Result};

/// DFS marking used by cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Validated planning graph of the tasks.
///
/// Nodes are tasks keyed by name; an edge `dep -> task` exists for every
/// entry in `task.depends_on`. Node indices follow the original input order,
/// so every traversal over the graph is reproducible.
///
/// The graph is built once and never mutated. Tasks injected while a run is
/// in progress live only in the scheduler's bookkeeping.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    index: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    /// Build and validate a graph from a flat task list.
    ///
    /// Fails with:
    /// - [`ClampanyError::InvalidTaskName`] if a name cannot double as an
    ///   output file stem (empty, path separators, ...),
    /// - [`ClampanyError::DuplicateTask`] if two tasks share a name,
    /// - [`ClampanyError::UnknownDependency`] if a `depends_on` entry does
    ///   not resolve,
    /// - [`ClampanyError::CycleDetected`] if the dependency relation is not
    ///   acyclic. The message carries the depends-on chain, e.g.
    ///   `A -> C -> B -> A`.
    pub fn build(tasks: impl IntoIterator<Item = Task>) -> Result<Self> {
        let mut graph: DiGraph<Task, ()> = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        for task in tasks {
            if let Some(reason) = task_name_problem(&task.name) {
                return Err(ClampanyError::InvalidTaskName {
                    name: task.name,
                    reason,
                });
            }
            if index.contains_key(&task.name) {
                return Err(ClampanyError::DuplicateTask(task.name));
            }
            let name = task.name.clone();
            let node = graph.add_node(task);
            index.insert(name, node);
        }

        let mut edges = Vec::new();
        for node in graph.node_indices() {
            let task = &graph[node];
            for dep in task.unique_dependencies() {
                let Some(&dep_node) = index.get(dep) else {
                    return Err(ClampanyError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dep.to_string(),
                    });
                };
                edges.push((dep_node, node));
            }
        }
        for (from, to) in edges {
            graph.update_edge(from, to, ());
        }

        let dag = Self { graph, index };
        dag.detect_cycle()?;
        Ok(dag)
    }

    /// Number of tasks.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All tasks, in original input order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_indices().map(|n| &self.graph[n])
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&n| &self.graph[n])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Direct dependencies of a task, in declaration order.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        self.task(name)
            .map(|t| t.unique_dependencies())
            .unwrap_or_default()
    }

    /// Direct dependents of a task, sorted by name.
    pub fn dependents_of(&self, name: &str) -> Vec<&str> {
        let Some(&node) = self.index.get(name) else {
            return Vec::new();
        };
        let mut dependents: Vec<&str> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .map(|n| self.graph[n].name.as_str())
            .collect();
        dependents.sort_unstable();
        dependents
    }

    /// Deterministic topological order (Kahn's algorithm).
    ///
    /// The initial zero-in-degree set is sorted by name, and the children
    /// freed by each node are appended in name order; the queue itself is
    /// FIFO. The same graph therefore always yields the same order.
    pub fn topo_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| self.graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut roots: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();
        self.sort_by_name(&mut roots);

        let mut queue: VecDeque<NodeIndex> = roots.into();
        let mut order = Vec::with_capacity(self.len());

        while let Some(node) = queue.pop_front() {
            order.push(self.graph[node].name.clone());

            let mut children: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .collect();
            self.sort_by_name(&mut children);

            for child in children {
                let degree = &mut in_degree[child.index()];
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(child);
                }
            }
        }

        if order.len() != self.len() {
            return Err(ClampanyError::CycleDetected(format!(
                "topological sort ordered {} of {} tasks",
                order.len(),
                self.len()
            )));
        }

        Ok(order)
    }

    fn sort_by_name(&self, nodes: &mut [NodeIndex]) {
        nodes.sort_by(|a, b| self.graph[*a].name.cmp(&self.graph[*b].name));
    }

    fn dependency_nodes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.graph[node]
            .unique_dependencies()
            .into_iter()
            .filter_map(|dep| self.index.get(dep).copied())
            .collect()
    }

    /// Three-color DFS over every node, in input order.
    fn detect_cycle(&self) -> Result<()> {
        let mut marks = vec![Mark::Unvisited; self.len()];

        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }

            marks[start.index()] = Mark::OnStack;
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> =
                vec![(start, self.dependency_nodes(start), 0)];

            while let Some(frame) = stack.last_mut() {
                let Some(&next) = frame.1.get(frame.2) else {
                    marks[frame.0.index()] = Mark::Done;
                    stack.pop();
                    continue;
                };
                frame.2 += 1;

                match marks[next.index()] {
                    Mark::Unvisited => {
                        marks[next.index()] = Mark::OnStack;
                        stack.push((next, self.dependency_nodes(next), 0));
                    }
                    Mark::OnStack => {
                        let path: Vec<NodeIndex> = stack.iter().map(|f| f.0).collect();
                        return Err(ClampanyError::CycleDetected(
                            self.describe_cycle(&path, next),
                        ));
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(())
    }

    fn describe_cycle(&self, path: &[NodeIndex], back_to: NodeIndex) -> String {
        let start = path.iter().position(|&n| n == back_to).unwrap_or(0);
        let mut names: Vec<&str> = path[start..]
            .iter()
            .map(|&n| self.graph[n].name.as_str())
            .collect();
        names.push(self.graph[back_to].name.as_str());
        names.join(" -> ")
    }
}
