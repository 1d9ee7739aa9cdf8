//! Binary merge tree of the progressive alignment.
//!
//! Stored as a flat array of `2N - 1` nodes: the `N` leaves come first, in input order,
//! and the internal nodes follow in the order they were created, so the root is last.
//! Each internal node records its two children and the shift of the right child
//! with respect to the left one. A leaf has `-1` in all three fields.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub left: isize,
    pub right: isize,
    pub shift: isize,
}

impl Node {
    pub const LEAF: Node = Node {
        left: -1,
        right: -1,
        shift: -1,
    };
    pub fn is_leaf(&self) -> bool {
        self.left < 0
    }
    pub fn children(&self) -> Option<(usize, usize)> {
        if self.is_leaf() {
            None
        } else {
            Some((self.left as usize, self.right as usize))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeTree {
    nodes: Vec<Node>,
    leaves: usize,
}

impl MergeTree {
    /// A tree with `leaves` leaves and no joins yet.
    pub fn new(leaves: usize) -> Self {
        assert!(0 < leaves);
        Self {
            nodes: vec![Node::LEAF; 2 * leaves - 1],
            leaves,
        }
    }
    pub fn join(&mut self, node: usize, left: usize, right: usize, shift: isize) {
        assert!(self.leaves <= node && left < node && right < node);
        self.nodes[node] = Node {
            left: left as isize,
            right: right as isize,
            shift,
        };
    }
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
    pub fn num_of_leaves(&self) -> usize {
        self.leaves
    }
    pub fn root(&self) -> usize {
        self.nodes.len() - 1
    }
    /// `(left, right, shift)` for every node.
    pub fn triples(&self) -> Vec<[isize; 3]> {
        self.nodes
            .iter()
            .map(|n| [n.left, n.right, n.shift])
            .collect()
    }
    /// Absolute shift of every leaf, accumulated from the root.
    /// A negative join shift moves the left subtree instead of the right one,
    /// so no leaf ends up with a negative shift.
    pub fn leaf_shifts(&self) -> Vec<usize> {
        let mut shifts = vec![0; self.leaves];
        self.accumulate_shifts(self.root(), 0, &mut shifts);
        shifts
    }
    fn accumulate_shifts(&self, node: usize, current: usize, shifts: &mut [usize]) {
        match self.nodes[node].children() {
            None if node < self.leaves => shifts[node] = current,
            None => {}
            Some((left, right)) => {
                let shift = self.nodes[node].shift;
                if 0 <= shift {
                    self.accumulate_shifts(left, current, shifts);
                    self.accumulate_shifts(right, current + shift as usize, shifts);
                } else {
                    self.accumulate_shifts(left, current + shift.unsigned_abs(), shifts);
                    self.accumulate_shifts(right, current, shifts);
                }
            }
        }
    }
    /// Leaves in depth-first order, the less shifted child first.
    pub fn order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.leaves);
        self.collect_order(self.root(), &mut order);
        order
    }
    fn collect_order(&self, node: usize, order: &mut Vec<usize>) {
        match self.nodes[node].children() {
            None if node < self.leaves => order.push(node),
            None => {}
            Some((left, right)) if 0 <= self.nodes[node].shift => {
                self.collect_order(left, order);
                self.collect_order(right, order);
            }
            Some((left, right)) => {
                self.collect_order(right, order);
                self.collect_order(left, order);
            }
        }
    }
    /// Box-drawing picture of the tree, one line per leaf in `order()`.
    /// All lines have the same width.
    pub fn draw(&self) -> Vec<String> {
        self.draw_node(self.root(), false).0
    }
    fn draw_node(&self, node: usize, put_root_down: bool) -> (Vec<String>, usize) {
        let (left, right) = match self.nodes[node].children() {
            Some(children) => children,
            None => return (vec!["─".to_string()], 0),
        };
        let (top, bottom) = if 0 <= self.nodes[node].shift {
            (left, right)
        } else {
            (right, left)
        };
        let (fig1, start1) = self.draw_node(top, true);
        let (fig2, start2) = self.draw_node(bottom, false);
        let width = width_of(&fig1).max(width_of(&fig2));
        let height1 = fig1.len();
        let mut fig: Vec<_> = pad_figure(fig1, start1, width)
            .into_iter()
            .chain(pad_figure(fig2, start2, width))
            .collect();
        let start2 = start2 + height1;
        let start = match (start2 - start1 < 2, put_root_down) {
            (true, true) => start2,
            (true, false) => start1,
            (false, true) => start2 - 1,
            (false, false) => start1 + 1,
        };
        for (i, line) in fig.iter_mut().enumerate() {
            let head = if i == start && i == start1 {
                '┬'
            } else if i == start && i == start2 {
                '┴'
            } else if i == start {
                '┤'
            } else if i == start1 {
                '┌'
            } else if start1 < i && i < start2 {
                '│'
            } else if i == start2 {
                '└'
            } else {
                ' '
            };
            line.insert(0, head);
        }
        (fig, start)
    }
}

fn width_of(fig: &[String]) -> usize {
    fig.first().map(|x| x.chars().count()).unwrap_or(0)
}

// Right-justify every line; the line holding the subtree root is extended with a branch.
fn pad_figure(fig: Vec<String>, start: usize, width: usize) -> Vec<String> {
    fig.into_iter()
        .enumerate()
        .map(|(i, line)| {
            let fill = if i == start { '─' } else { ' ' };
            let pad = width.saturating_sub(line.chars().count());
            std::iter::repeat(fill).take(pad).chain(line.chars()).collect()
        })
        .collect()
}
