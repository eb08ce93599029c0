//! Reference graph between fixture entries.
//!
//! An edge `A -> B` means entry `A` holds a reference to entry `B`, so `B`
//! must be constructed first. The construction order is a topological
//! order in which ties between independent entries are broken by encounter
//! order, so identical input always loads identically.
//!
//! # Examples
//!
//! ```rust
//! use fixy::graph::ReferenceGraph;
//!
//! let mut graph = ReferenceGraph::new();
//! graph.add_entry("visit").unwrap();
//! graph.add_entry("pet").unwrap();
//! graph.add_entry("owner").unwrap();
//!
//! graph.add_reference("visit", "pet", "pet").unwrap();
//! graph.add_reference("pet", "owner", "owner").unwrap();
//!
//! assert_eq!(graph.construction_order().unwrap(), vec!["owner", "pet", "visit"]);
//! ```

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::error::{FixyError, FixyResult};

#[derive(Debug, Clone)]
struct Node {
	name: String,
	/// Referenced entries, in field order, without repeats.
	dependencies: Vec<usize>,
	/// Entries referencing this one.
	dependents: Vec<usize>,
}

/// Directed graph of entry references.
#[derive(Debug, Clone, Default)]
pub struct ReferenceGraph {
	nodes: Vec<Node>,
	index: HashMap<String, usize>,
}

impl ReferenceGraph {
	/// Creates an empty graph.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an entry, returning its encounter index.
	///
	/// Returns `None` if the name is already registered.
	pub fn add_entry(&mut self, name: &str) -> Option<usize> {
		if self.index.contains_key(name) {
			return None;
		}
		let idx = self.nodes.len();
		self.nodes.push(Node {
			name: name.to_string(),
			dependencies: Vec::new(),
			dependents: Vec::new(),
		});
		self.index.insert(name.to_string(), idx);
		Some(idx)
	}

	/// Records that `from` references `to` through `field`.
	///
	/// # Errors
	///
	/// Returns [`FixyError::UnknownReference`] if `to` is not registered.
	pub fn add_reference(&mut self, from: &str, field: &str, to: &str) -> FixyResult<()> {
		let unknown = || FixyError::UnknownReference {
			entry: from.to_string(),
			field: field.to_string(),
			target: to.to_string(),
		};
		let from_idx = *self.index.get(from).ok_or_else(unknown)?;
		let to_idx = *self.index.get(to).ok_or_else(unknown)?;

		if !self.nodes[from_idx].dependencies.contains(&to_idx) {
			self.nodes[from_idx].dependencies.push(to_idx);
			self.nodes[to_idx].dependents.push(from_idx);
		}
		Ok(())
	}

	/// Returns the number of entries.
	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	/// Returns true if the graph has no entries.
	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Returns true if `name` is registered.
	pub fn contains(&self, name: &str) -> bool {
		self.index.contains_key(name)
	}

	/// Returns the encounter index of `name`.
	pub fn index_of(&self, name: &str) -> Option<usize> {
		self.index.get(name).copied()
	}

	/// Returns the entries `name` references, in field order.
	pub fn dependencies(&self, name: &str) -> Vec<&str> {
		self.index
			.get(name)
			.map(|&idx| {
				self.nodes[idx]
					.dependencies
					.iter()
					.map(|&dep| self.nodes[dep].name.as_str())
					.collect()
			})
			.unwrap_or_default()
	}

	/// Returns encounter indices in construction order.
	///
	/// # Errors
	///
	/// Returns [`FixyError::CyclicReference`] naming the entries of one
	/// cycle, first entry repeated at the end, if any exists.
	pub fn construction_indices(&self) -> FixyResult<Vec<usize>> {
		let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.dependencies.len()).collect();

		// Min-heap on encounter index.
		let mut ready: BinaryHeap<Reverse<usize>> = in_degree
			.iter()
			.enumerate()
			.filter(|(_, degree)| **degree == 0)
			.map(|(idx, _)| Reverse(idx))
			.collect();

		let mut sorted = Vec::with_capacity(self.nodes.len());
		while let Some(Reverse(idx)) = ready.pop() {
			sorted.push(idx);
			for &dependent in &self.nodes[idx].dependents {
				in_degree[dependent] -= 1;
				if in_degree[dependent] == 0 {
					ready.push(Reverse(dependent));
				}
			}
		}

		if sorted.len() != self.nodes.len() {
			let remaining: HashSet<usize> = in_degree
				.iter()
				.enumerate()
				.filter(|(_, degree)| **degree > 0)
				.map(|(idx, _)| idx)
				.collect();
			return Err(FixyError::CyclicReference {
				entries: self.find_cycle(&remaining),
			});
		}

		Ok(sorted)
	}

	/// Returns entry names in construction order.
	pub fn construction_order(&self) -> FixyResult<Vec<&str>> {
		Ok(self
			.construction_indices()?
			.into_iter()
			.map(|idx| self.nodes[idx].name.as_str())
			.collect())
	}

	/// Finds one cycle among `remaining` with an iterative DFS.
	///
	/// Every node left over by the topological pass lies on or behind a
	/// cycle, so starting from the lowest index always finds one.
	fn find_cycle(&self, remaining: &HashSet<usize>) -> Vec<String> {
		let mut visited = HashSet::new();
		let mut starts: Vec<usize> = remaining.iter().copied().collect();
		starts.sort_unstable();

		for start in starts {
			if visited.contains(&start) {
				continue;
			}

			// (node, next dependency index)
			let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
			let mut on_stack = HashSet::from([start]);
			visited.insert(start);

			while let Some(frame) = stack.last_mut() {
				let idx = frame.0;
				let deps = &self.nodes[idx].dependencies;
				if frame.1 < deps.len() {
					let dep = deps[frame.1];
					frame.1 += 1;
					if !remaining.contains(&dep) {
						continue;
					}

					if on_stack.contains(&dep) {
						let from = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
						let mut cycle: Vec<String> = stack[from..]
							.iter()
							.map(|(n, _)| self.nodes[*n].name.clone())
							.collect();
						cycle.push(self.nodes[dep].name.clone());
						return cycle;
					}

					if visited.insert(dep) {
						on_stack.insert(dep);
						stack.push((dep, 0));
					}
				} else {
					on_stack.remove(&idx);
					stack.pop();
				}
			}
		}

		// Unreachable for a graph that failed the topological pass.
		remaining
			.iter()
			.map(|&idx| self.nodes[idx].name.clone())
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn graph(entries: &[&str], refs: &[(&str, &str)]) -> ReferenceGraph {
		let mut graph = ReferenceGraph::new();
		for entry in entries {
			graph.add_entry(entry).unwrap();
		}
		for (from, to) in refs {
			graph.add_reference(from, "field", to).unwrap();
		}
		graph
	}

	#[rstest]
	fn test_no_references_keeps_encounter_order() {
		let graph = graph(&["c", "a", "b"], &[]);
		assert_eq!(graph.construction_order().unwrap(), vec!["c", "a", "b"]);
	}

	#[rstest]
	fn test_dependencies_come_first() {
		let graph = graph(&["pet", "owner"], &[("pet", "owner")]);
		assert_eq!(graph.construction_order().unwrap(), vec!["owner", "pet"]);
	}

	#[rstest]
	fn test_ties_broken_by_encounter_order() {
		// d depends on a; b and c are independent.
		let graph = graph(&["d", "b", "a", "c"], &[("d", "a")]);
		assert_eq!(
			graph.construction_order().unwrap(),
			vec!["b", "a", "d", "c"]
		);
	}

	#[rstest]
	fn test_diamond() {
		let graph = graph(
			&["top", "left", "right", "base"],
			&[("top", "left"), ("top", "right"), ("left", "base"), ("right", "base")],
		);
		assert_eq!(
			graph.construction_order().unwrap(),
			vec!["base", "left", "right", "top"]
		);
	}

	#[rstest]
	fn test_repeated_reference_counts_once() {
		let graph = graph(&["a", "b"], &[("a", "b"), ("a", "b")]);
		assert_eq!(graph.dependencies("a"), vec!["b"]);
		assert_eq!(graph.construction_order().unwrap(), vec!["b", "a"]);
	}

	#[rstest]
	fn test_self_reference_is_a_cycle() {
		let graph = graph(&["a", "b"], &[("a", "a")]);
		let error = graph.construction_order().unwrap_err();
		assert!(matches!(
			error,
			FixyError::CyclicReference { ref entries } if entries == &["a", "a"]
		));
	}

	#[rstest]
	fn test_indirect_cycle_named() {
		let graph = graph(
			&["x", "a", "b", "c"],
			&[("x", "a"), ("a", "b"), ("b", "c"), ("c", "a")],
		);
		let error = graph.construction_order().unwrap_err();
		assert!(matches!(
			error,
			FixyError::CyclicReference { ref entries } if entries == &["a", "b", "c", "a"]
		));
		assert_eq!(error.entries(), vec!["a", "b", "c"]);
	}

	#[rstest]
	fn test_unknown_reference() {
		let mut graph = graph(&["a"], &[]);
		let error = graph.add_reference("a", "owner", "ghost").unwrap_err();
		assert!(matches!(
			error,
			FixyError::UnknownReference { ref field, ref target, .. } if field == "owner" && target == "ghost"
		));
	}

	#[rstest]
	fn test_duplicate_entry() {
		let mut graph = ReferenceGraph::new();
		assert_eq!(graph.add_entry("a"), Some(0));
		assert_eq!(graph.add_entry("a"), None);
		assert_eq!(graph.index_of("a"), Some(0));
		assert_eq!(graph.len(), 1);
	}

	#[rstest]
	fn test_deep_chain_does_not_overflow() {
		let names: Vec<String> = (0..10_000).map(|i| format!("e{}", i)).collect();
		let mut graph = ReferenceGraph::new();
		for name in &names {
			graph.add_entry(name);
		}
		for pair in names.windows(2) {
			graph.add_reference(&pair[0], "next", &pair[1]).unwrap();
		}
		graph.add_reference(&names[9_999], "next", &names[0]).unwrap();

		let error = graph.construction_order().unwrap_err();
		assert_eq!(error.entries().len(), 10_000);
	}
}
