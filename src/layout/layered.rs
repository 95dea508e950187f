use std::collections::{BTreeMap, VecDeque};

use crate::error::LayoutError;
use crate::layout::{RankEngine, Slot};

/// Longest-path ranking, one top-down barycenter sweep, ranks centered on the
/// widest one. Ties keep insertion order, so the output is stable.
pub(super) struct Engine;

impl RankEngine for Engine {
    fn slots(
        &self,
        node_count: usize,
        relations: &[(usize, usize)],
    ) -> Result<Vec<Slot>, LayoutError> {
        let ranks = longest_path_ranks(node_count, relations);

        let mut layers_map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, rank) in ranks.iter().enumerate() {
            layers_map.entry(*rank).or_default().push(index);
        }
        let mut layers: Vec<Vec<usize>> = layers_map.into_values().collect();

        let mut column = vec![0_usize; node_count];
        for (idx, layer) in layers.iter_mut().enumerate() {
            if idx > 0 {
                order_by_barycenter(layer, relations, &ranks, &column);
            }
            for (col, &node) in layer.iter().enumerate() {
                column[node] = col;
            }
        }

        let widest = layers.iter().map(Vec::len).max().unwrap_or(1);
        let mut slots = vec![Slot { rank: 0, order: 0.0 }; node_count];
        for layer in &layers {
            let offset = (widest - layer.len()) as f32 / 2.0;
            for (col, &node) in layer.iter().enumerate() {
                slots[node] = Slot {
                    rank: ranks[node],
                    order: offset + col as f32,
                };
            }
        }

        Ok(slots)
    }
}

fn longest_path_ranks(node_count: usize, relations: &[(usize, usize)]) -> Vec<usize> {
    let mut ranks = vec![0_usize; node_count];
    let mut indegree = vec![0_usize; node_count];
    let mut outgoing: Vec<Vec<usize>> = vec![Vec::new(); node_count];

    for &(source, target) in relations {
        if source == target {
            continue;
        }
        indegree[target] += 1;
        outgoing[source].push(target);
    }

    let mut queue: VecDeque<usize> = (0..node_count).filter(|&i| indegree[i] == 0).collect();
    let mut visited = vec![false; node_count];

    while let Some(node) = queue.pop_front() {
        visited[node] = true;
        for &target in &outgoing[node] {
            ranks[target] = ranks[target].max(ranks[node] + 1);
            indegree[target] -= 1;
            if indegree[target] == 0 {
                queue.push_back(target);
            }
        }
    }

    // Nodes on a cycle never reach indegree zero; hang them below their
    // deepest ranked parent.
    for node in 0..node_count {
        if visited[node] {
            continue;
        }
        ranks[node] = relations
            .iter()
            .filter(|&&(source, target)| target == node && source != node)
            .map(|&(source, _)| ranks[source] + 1)
            .max()
            .unwrap_or(0);
    }

    ranks
}

fn order_by_barycenter(
    layer: &mut [usize],
    relations: &[(usize, usize)],
    ranks: &[usize],
    column: &[usize],
) {
    let keys: Vec<(usize, f32)> = layer
        .iter()
        .enumerate()
        .map(|(current, &node)| {
            let parents: Vec<usize> = relations
                .iter()
                .filter(|&&(source, target)| target == node && ranks[source] < ranks[node])
                .map(|&(source, _)| column[source])
                .collect();
            let key = if parents.is_empty() {
                current as f32
            } else {
                parents.iter().sum::<usize>() as f32 / parents.len() as f32
            };
            (node, key)
        })
        .collect();

    let mut sorted = keys;
    sorted.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (slot, (node, _)) in layer.iter_mut().zip(sorted) {
        *slot = node;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_centers_root_over_children() {
        let slots = Engine.slots(4, &[(0, 1), (0, 2), (0, 3)]).unwrap();
        assert_eq!(slots[0], Slot { rank: 0, order: 1.0 });
        assert_eq!(slots[1], Slot { rank: 1, order: 0.0 });
        assert_eq!(slots[2], Slot { rank: 1, order: 1.0 });
        assert_eq!(slots[3], Slot { rank: 1, order: 2.0 });
    }

    #[test]
    fn longest_path_wins() {
        // 0 -> 1 -> 2 and a shortcut 0 -> 2
        let ranks = longest_path_ranks(3, &[(0, 1), (1, 2), (0, 2)]);
        assert_eq!(ranks, [0, 1, 2]);
    }

    #[test]
    fn cycles_do_not_hang() {
        let ranks = longest_path_ranks(3, &[(0, 1), (1, 2), (2, 1)]);
        assert_eq!(ranks[0], 0);
        assert!(ranks[1] >= 1);
        assert!(ranks[2] >= 1);
    }

    #[test]
    fn children_follow_parent_columns() {
        // Two roots; the second root's child is listed first.
        let slots = Engine.slots(4, &[(1, 2), (0, 3)]).unwrap();
        assert!(slots[3].order < slots[2].order);
    }
}
