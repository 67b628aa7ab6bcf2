//! Greedy distance-`p` colouring of a sparsity graph.
//!
//! Two vertices within graph distance `p` of each other are adjacent in the pattern of
//! `A^p` (ignoring numerical cancellation), so a distance-`p` colouring of the graph of
//! `A` is an ordinary colouring of the graph of `A^p`. Probing vectors built from such a
//! colouring recover the diagonal of any matrix whose sparsity is contained in that of
//! `A^p` exactly.

use crate::error::{LogDetError, LogDetErrorKind};

/// An assignment of a colour in `0..num_colors` to every vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coloring {
    colors: Vec<usize>,
    num_colors: usize,
}

impl Coloring {
    /// Wraps an explicit colour assignment, e.g. one produced by an external colouring tool.
    pub fn new(colors: Vec<usize>) -> Result<Self, LogDetError> {
        if colors.is_empty() {
            return Err(LogDetErrorKind::InputError(
                "A colouring must cover at least one vertex.".to_string(),
            )
            .into());
        }
        let num_colors = colors.iter().max().map_or(0, |&c| c + 1);
        Ok(Self { colors, num_colors })
    }

    /// The colour of every vertex.
    pub fn colors(&self) -> &[usize] {
        &self.colors
    }

    pub fn num_colors(&self) -> usize {
        self.num_colors
    }

    /// The number of coloured vertices.
    pub fn dimension(&self) -> usize {
        self.colors.len()
    }

    /// Iterates over the vertices that carry `color`.
    pub fn class(&self, color: usize) -> impl Iterator<Item = usize> + '_ {
        self.colors
            .iter()
            .enumerate()
            .filter(move |&(_, &c)| c == color)
            .map(|(vertex, _)| vertex)
    }

    /// Checks that no two vertices within `distance` of each other share a colour.
    pub fn is_valid_distance_coloring(&self, adjacency: &[Vec<usize>], distance: usize) -> bool {
        if adjacency.len() != self.colors.len() {
            return false;
        }
        let mut walker = BoundedBfs::new(adjacency.len());
        (0..adjacency.len()).all(|v| {
            let mut valid = true;
            walker.visit(adjacency, v, distance, |w| {
                valid &= self.colors[w] != self.colors[v];
            });
            valid
        })
    }
}

/// Depth-limited breadth-first search with stamp-based bookkeeping, so repeated searches
/// reuse the same buffers.
struct BoundedBfs {
    stamp: Vec<usize>,
    frontier: Vec<usize>,
    next: Vec<usize>,
}

impl BoundedBfs {
    fn new(n: usize) -> Self {
        Self {
            stamp: vec![usize::MAX; n],
            frontier: Vec::new(),
            next: Vec::new(),
        }
    }

    /// Calls `f` on every vertex at distance `1..=depth` from `source`.
    fn visit(
        &mut self,
        adjacency: &[Vec<usize>],
        source: usize,
        depth: usize,
        mut f: impl FnMut(usize),
    ) {
        self.stamp[source] = source;
        self.frontier.clear();
        self.frontier.push(source);
        for _ in 0..depth {
            self.next.clear();
            for &u in &self.frontier {
                for &w in &adjacency[u] {
                    if self.stamp[w] != source {
                        self.stamp[w] = source;
                        f(w);
                        self.next.push(w);
                    }
                }
            }
            if self.next.is_empty() {
                break;
            }
            std::mem::swap(&mut self.frontier, &mut self.next);
        }
    }
}

/// Colours the vertices in natural order with the smallest colour not used by any
/// already-coloured vertex within `distance`.
pub fn greedy_distance_coloring(adjacency: &[Vec<usize>], distance: usize) -> Coloring {
    let n = adjacency.len();
    let mut colors = vec![usize::MAX; n];
    let mut forbidden = vec![usize::MAX; n + 1];
    let mut walker = BoundedBfs::new(n);
    let mut num_colors = 0;

    for v in 0..n {
        walker.visit(adjacency, v, distance, |w| {
            if colors[w] != usize::MAX {
                forbidden[colors[w]] = v;
            }
        });
        let mut color = 0;
        while forbidden[color] == v {
            color += 1;
        }
        colors[v] = color;
        num_colors = num_colors.max(color + 1);
    }

    log::debug!("Greedy distance-{distance} colouring of {n} vertices uses {num_colors} colours.");
    Coloring { colors, num_colors }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_graph(n: usize) -> Vec<Vec<usize>> {
        (0..n)
            .map(|i| {
                let mut neighbours = Vec::new();
                if i > 0 {
                    neighbours.push(i - 1);
                }
                if i + 1 < n {
                    neighbours.push(i + 1);
                }
                neighbours
            })
            .collect()
    }

    #[test]
    fn test_diagonal_pattern_needs_one_colour() {
        let adjacency = vec![Vec::new(); 5];
        let coloring = greedy_distance_coloring(&adjacency, 1);
        assert_eq!(coloring.num_colors(), 1);
        assert_eq!(coloring.colors(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_path_graph_colourings() {
        let adjacency = path_graph(10);
        let distance_one = greedy_distance_coloring(&adjacency, 1);
        assert_eq!(distance_one.num_colors(), 2);
        assert!(distance_one.is_valid_distance_coloring(&adjacency, 1));

        let distance_two = greedy_distance_coloring(&adjacency, 2);
        assert_eq!(distance_two.num_colors(), 3);
        assert!(distance_two.is_valid_distance_coloring(&adjacency, 2));
        assert!(!distance_one.is_valid_distance_coloring(&adjacency, 2));
    }

    #[test]
    fn test_explicit_colouring_classes() {
        let coloring = Coloring::new(vec![0, 2, 1, 0]).unwrap();
        assert_eq!(coloring.num_colors(), 3);
        assert_eq!(coloring.dimension(), 4);
        assert_eq!(coloring.class(0).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(coloring.class(2).collect::<Vec<_>>(), vec![1]);
        assert!(Coloring::new(Vec::new()).is_err());
    }
}
