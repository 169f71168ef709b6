//! Structural analytics
//!
//! Auxiliary views used for reporting; none of the pipeline's invariants
//! depend on them.

use crate::store::KnowledgeGraph;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

impl KnowledgeGraph {
    /// Nodes with no incoming edges
    #[must_use]
    pub fn root_nodes(&self) -> Vec<String> {
        self.nodes_without(Direction::Incoming)
    }

    /// Nodes with no outgoing edges
    #[must_use]
    pub fn leaf_nodes(&self) -> Vec<String> {
        self.nodes_without(Direction::Outgoing)
    }

    /// Normalized betweenness centrality per node, in store order
    ///
    /// Brandes' algorithm over unweighted shortest paths; parallel edges
    /// with different relationships count once.
    #[must_use]
    pub fn betweenness_centrality(&self) -> Vec<(String, f64)> {
        let order: Vec<NodeIndex> = self.index.values().copied().collect();
        let n = order.len();
        let position: HashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(i, &ix)| (ix, i)).collect();

        let adjacency: Vec<Vec<usize>> = order
            .iter()
            .map(|&ix| {
                let mut out: Vec<usize> = self
                    .inner
                    .neighbors_directed(ix, Direction::Outgoing)
                    .filter_map(|t| position.get(&t).copied())
                    .collect();
                out.sort_unstable();
                out.dedup();
                out
            })
            .collect();

        let mut score = vec![0.0_f64; n];
        for s in 0..n {
            let mut stack = Vec::with_capacity(n);
            let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
            let mut sigma = vec![0.0_f64; n];
            let mut dist: Vec<Option<usize>> = vec![None; n];
            sigma[s] = 1.0;
            dist[s] = Some(0);

            let mut queue = VecDeque::from([s]);
            while let Some(v) = queue.pop_front() {
                stack.push(v);
                let Some(dv) = dist[v] else { continue };
                for &w in &adjacency[v] {
                    if dist[w].is_none() {
                        dist[w] = Some(dv + 1);
                        queue.push_back(w);
                    }
                    if dist[w] == Some(dv + 1) {
                        sigma[w] += sigma[v];
                        preds[w].push(v);
                    }
                }
            }

            let mut delta = vec![0.0_f64; n];
            while let Some(w) = stack.pop() {
                for &v in &preds[w] {
                    delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
                }
                if w != s {
                    score[w] += delta[w];
                }
            }
        }

        if n > 2 {
            #[allow(clippy::cast_precision_loss)]
            let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
            for value in &mut score {
                *value *= scale;
            }
        }

        order
            .iter()
            .zip(score)
            .map(|(&ix, value)| (self.inner[ix].id.clone(), value))
            .collect()
    }

    /// The `top_n` most central nodes; ties keep store order
    #[must_use]
    pub fn central_nodes(&self, top_n: usize) -> Vec<String> {
        let mut ranked = self.betweenness_centrality();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().take(top_n).map(|(id, _)| id).collect()
    }

    fn nodes_without(&self, direction: Direction) -> Vec<String> {
        self.index
            .iter()
            .filter(|(_, ix)| {
                self.inner
                    .neighbors_directed(**ix, direction)
                    .next()
                    .is_none()
            })
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::edge::{EdgeAttrs, IS_COMPONENT_OF};
    use crate::node::KnowledgeNode;
    use crate::store::KnowledgeGraph;

    fn chain(ids: &[&str]) -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new();
        for id in ids {
            g.add_node(*id, KnowledgeNode::titled(id.to_uppercase()));
        }
        for pair in ids.windows(2) {
            g.add_edge(pair[0], pair[1], EdgeAttrs::relation(IS_COMPONENT_OF));
        }
        g
    }

    #[test]
    fn roots_and_leaves_of_chain() {
        let g = chain(&["a", "b", "c"]);
        assert_eq!(g.root_nodes(), vec!["a".to_string()]);
        assert_eq!(g.leaf_nodes(), vec!["c".to_string()]);
    }

    #[test]
    fn isolated_node_is_root_and_leaf() {
        let mut g = KnowledgeGraph::new();
        g.add_node("solo", KnowledgeNode::new());
        assert_eq!(g.root_nodes(), vec!["solo".to_string()]);
        assert_eq!(g.leaf_nodes(), vec!["solo".to_string()]);
    }

    #[test]
    fn middle_of_chain_is_most_central() {
        let g = chain(&["a", "b", "c"]);
        let scores = g.betweenness_centrality();
        // one pair (a, c) of 2 ordered pairs excluding b passes through b
        assert!((scores[1].1 - 0.5).abs() < 1e-9);
        assert_eq!(scores[0].1, 0.0);
        assert_eq!(g.central_nodes(1), vec!["b".to_string()]);
    }

    #[test]
    fn central_nodes_ties_keep_store_order() {
        let mut g = KnowledgeGraph::new();
        g.add_node("x", KnowledgeNode::new());
        g.add_node("y", KnowledgeNode::new());
        assert_eq!(g.central_nodes(5), vec!["x".to_string(), "y".to_string()]);
    }
}
