//! Small DAG and topological linearizer (spec.md §4.2).
//!
//! Used transiently by [`crate::planner::SequencePlanner`] to order the
//! syscalls it grows into a program.

use std::collections::HashMap;

use rand::Rng;

/// Adjacency-matrix-backed directed graph of at most a few dozen vertices
/// — small enough that an adjacency list keyed by vertex index is plenty.
#[derive(Debug, Clone)]
pub struct Dag {
    vertex_count: usize,
    edges: HashMap<usize, Vec<usize>>,
}

impl Dag {
    pub fn new(vertex_count: usize) -> Self {
        let mut edges = HashMap::with_capacity(vertex_count);
        for i in 0..vertex_count {
            edges.insert(i, Vec::new());
        }
        Self { vertex_count, edges }
    }

    pub fn from_matrix(matrix: &[Vec<u8>]) -> Self {
        let mut dag = Self::new(matrix.len());
        for (i, row) in matrix.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v == 1 {
                    dag.add_edge(i, j);
                }
            }
        }
        dag
    }

    pub fn add_edge(&mut self, source: usize, dest: usize) {
        self.edges.entry(source).or_default().push(dest);
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    fn successors(&self, v: usize) -> &[usize] {
        self.edges.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    fn in_degrees(&self) -> Vec<usize> {
        let mut in_degree = vec![0usize; self.vertex_count];
        for v in 0..self.vertex_count {
            for &succ in self.successors(v) {
                in_degree[succ] += 1;
            }
        }
        in_degree
    }

    /// Returns every valid topological ordering via backtracking. Only
    /// meant for the small graphs the planner builds; bounded at
    /// `vertex_count` recursion depth so cyclic input cannot hang (spec.md
    /// §4.2 edge cases).
    pub fn topo_sort(&self) -> Vec<Vec<usize>> {
        let n = self.vertex_count;
        let mut in_degree = self.in_degrees();
        let mut visited = vec![false; n];
        let mut path = Vec::with_capacity(n);
        let mut paths = Vec::new();

        fn recurse(
            dag: &Dag,
            in_degree: &mut [usize],
            visited: &mut [bool],
            path: &mut Vec<usize>,
            paths: &mut Vec<Vec<usize>>,
        ) {
            if path.len() == dag.vertex_count {
                paths.push(path.clone());
                return;
            }
            for v in 0..dag.vertex_count {
                if in_degree[v] == 0 && !visited[v] {
                    path.push(v);
                    visited[v] = true;
                    for &succ in dag.successors(v) {
                        in_degree[succ] -= 1;
                    }
                    recurse(dag, in_degree, visited, path, paths);
                    for &succ in dag.successors(v) {
                        in_degree[succ] += 1;
                    }
                    visited[v] = false;
                    path.pop();
                }
            }
        }

        recurse(self, &mut in_degree, &mut visited, &mut path, &mut paths);
        paths
    }

    /// Returns a single randomized linearization: at each step, picks the
    /// unvisited vertex of minimum current in-degree, breaking ties
    /// uniformly at random. Bounded to `vertex_count` iterations so cyclic
    /// input terminates (possibly with a non-topological order, per
    /// spec.md §4.2).
    pub fn topo_sort_simple(&self, rng: &mut impl Rng) -> Vec<usize> {
        let n = self.vertex_count;
        let mut in_degree = self.in_degrees();
        let mut visited = vec![false; n];
        let mut path = Vec::with_capacity(n);

        for _ in 0..n {
            let next = find_min_in_degree_node(&in_degree, &visited, rng);
            let Some(next) = next else { break };
            visited[next] = true;
            path.push(next);
            for &succ in self.successors(next) {
                in_degree[succ] -= 1;
            }
        }
        path
    }
}

/// Picks the unvisited vertex with minimum in-degree, ties broken
/// uniformly. spec.md §9 flags the original's `minimize = inDegree[ret]`
/// with `ret = -1` as a latent bug that reads `inDegree[-1]`; this
/// implementation follows the spec's own fix: start `minimize` at
/// `usize::MAX` and only read from indices the loop has actually visited.
fn find_min_in_degree_node(in_degree: &[usize], visited: &[bool], rng: &mut impl Rng) -> Option<usize> {
    let mut minimize = usize::MAX;
    let mut candidates = Vec::new();

    for (i, (&deg, &seen)) in in_degree.iter().zip(visited.iter()).enumerate() {
        if seen {
            continue;
        }
        if deg < minimize {
            minimize = deg;
            candidates.clear();
            candidates.push(i);
        } else if deg == minimize {
            candidates.push(i);
        }
    }

    if candidates.is_empty() {
        None
    } else if candidates.len() == 1 {
        Some(candidates[0])
    } else {
        Some(candidates[rng.gen_range(0..candidates.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn topo_sort_simple_on_a_chain_is_deterministic() {
        // scenario 1 from spec.md §8: A = [[0,1,0],[0,0,1],[0,0,0]]
        let matrix = vec![vec![0, 1, 0], vec![0, 0, 1], vec![0, 0, 0]];
        let dag = Dag::from_matrix(&matrix);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(dag.topo_sort_simple(&mut rng), vec![0, 1, 2]);
    }

    #[test]
    fn topo_sort_simple_is_a_valid_linearization() {
        let matrix = vec![
            vec![0, 1, 1, 0],
            vec![0, 0, 0, 1],
            vec![0, 0, 0, 1],
            vec![0, 0, 0, 0],
        ];
        let dag = Dag::from_matrix(&matrix);
        let mut rng = StdRng::seed_from_u64(7);
        let order = dag.topo_sort_simple(&mut rng);
        let mut pos = [0usize; 4];
        for (p, &v) in order.iter().enumerate() {
            pos[v] = p;
        }
        for i in 0..4 {
            for j in 0..4 {
                if matrix[i][j] == 1 {
                    assert!(pos[i] < pos[j], "edge {i}->{j} violated by order {order:?}");
                }
            }
        }
    }

    #[test]
    fn topo_sort_enumerates_all_valid_orders_for_independent_vertices() {
        let matrix = vec![vec![0, 0], vec![0, 0]];
        let dag = Dag::from_matrix(&matrix);
        let mut orders = dag.topo_sort();
        orders.sort();
        assert_eq!(orders, vec![vec![0, 1], vec![1, 0]]);
    }
}
