use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use log::debug;
use rust_sugiyama::configure::Config;

use crate::error::LayoutError;
use crate::layout::{RankEngine, Slot};

const LEVEL_EPSILON: f32 = 1e-3;

/// Delegates to the `rust-sugiyama` crate and maps its coordinates back onto
/// rank/order slots. Each connected component is placed to the right of the
/// previous one; nodes without relations are appended last.
pub(super) struct Engine;

impl RankEngine for Engine {
    fn slots(
        &self,
        node_count: usize,
        relations: &[(usize, usize)],
    ) -> Result<Vec<Slot>, LayoutError> {
        let mut edges = Vec::with_capacity(relations.len());
        let mut connected = vec![false; node_count];
        for &(source, target) in relations {
            // Self-loops carry no ranking information.
            if source == target {
                continue;
            }
            edges.push((vertex_id(source)?, vertex_id(target)?));
            connected[source] = true;
            connected[target] = true;
        }

        let mut slots: Vec<Option<Slot>> = vec![None; node_count];
        let mut next_order = 0.0_f32;

        if !edges.is_empty() {
            debug!(
                "applying sugiyama layout to {} nodes and {} edges",
                node_count,
                edges.len()
            );

            let engine_edges = edges.clone();
            let components = std::panic::catch_unwind(move || {
                let config = Config {
                    minimum_length: 1,
                    vertex_spacing: 1.0,
                    ..Default::default()
                };
                rust_sugiyama::from_edges(&engine_edges, &config)
            })
            .map_err(|payload| LayoutError::Engine(panic_message(&*payload)))?;

            for (coords, _, _) in &components {
                let placed: Vec<(usize, f32, f32)> = coords
                    .iter()
                    .map(|&(id, (x, y))| (id as usize, x as f32, y as f32))
                    .filter(|&(index, _, _)| index < node_count)
                    .collect();
                if placed.is_empty() {
                    continue;
                }

                let levels = rank_levels(&placed, &edges);
                let min_x = placed
                    .iter()
                    .map(|&(_, x, _)| x)
                    .fold(f32::INFINITY, f32::min);

                let mut by_rank: BTreeMap<usize, Vec<(usize, f32)>> = BTreeMap::new();
                for &(index, x, y) in &placed {
                    let rank = levels
                        .iter()
                        .position(|level| (level - y).abs() < LEVEL_EPSILON)
                        .unwrap_or(0);
                    by_rank.entry(rank).or_default().push((index, x));
                }

                let mut max_order = next_order;
                for (rank, members) in by_rank {
                    for (index, x) in in_index_order(members) {
                        let order = next_order + (x - min_x);
                        max_order = max_order.max(order);
                        slots[index] = Some(Slot { rank, order });
                    }
                }
                next_order = max_order + 1.0;
            }
        }

        let mut result = Vec::with_capacity(node_count);
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(slot) => result.push(slot),
                None if connected[index] => {
                    return Err(LayoutError::Engine(format!(
                        "engine returned no position for node #{index}"
                    )));
                }
                None => {
                    result.push(Slot {
                        rank: 0,
                        order: next_order,
                    });
                    next_order += 1.0;
                }
            }
        }

        Ok(result)
    }
}

/// Distinct y values of one component, ordered so that edge sources come
/// before their targets whatever sign the engine uses for depth.
fn rank_levels(placed: &[(usize, f32, f32)], edges: &[(u32, u32)]) -> Vec<f32> {
    let mut levels: Vec<f32> = placed.iter().map(|&(_, _, y)| y).collect();
    levels.sort_by(f32::total_cmp);
    levels.dedup_by(|a, b| (*a - *b).abs() < LEVEL_EPSILON);

    let depth: HashMap<usize, f32> = placed.iter().map(|&(index, _, y)| (index, y)).collect();
    let descending = edges
        .iter()
        .find_map(|&(source, target)| {
            Some((
                *depth.get(&(source as usize))?,
                *depth.get(&(target as usize))?,
            ))
        })
        .is_some_and(|(source, target)| source > target);

    if descending {
        levels.reverse();
    }
    levels
}

/// Keep the engine's x positions for a rank but hand them out by node index,
/// so siblings read in insertion order whichever way the engine swept.
fn in_index_order(mut members: Vec<(usize, f32)>) -> Vec<(usize, f32)> {
    let mut xs: Vec<f32> = members.iter().map(|&(_, x)| x).collect();
    xs.sort_by(f32::total_cmp);
    members.sort_by_key(|&(index, _)| index);
    members
        .into_iter()
        .zip(xs)
        .map(|((index, _), x)| (index, x))
        .collect()
}

fn vertex_id(index: usize) -> Result<u32, LayoutError> {
    u32::try_from(index)
        .map_err(|_| LayoutError::Engine(format!("node index {index} exceeds engine limits")))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "engine panicked with unknown error".to_string()
    }
}
