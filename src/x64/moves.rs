//! Sequentialization of parallel moves.
//!
//! All copies feeding the phis of one control-flow edge happen at once. The
//! sequence returned here performs them one by one: a move is emitted once
//! no pending move still reads its destination, and when only cycles remain
//! one destination is saved into the scratch location first.

use super::regs::Location;

/// Order `moves` (source, destination) so that no source is overwritten before it is read.
///
/// Destinations must be distinct. Moves whose source equals their
/// destination are dropped.
pub fn sequentialize(moves: &[(Location, Location)], scratch: Location) -> Vec<(Location, Location)> {
    let mut pending: Vec<(Location, Location)> = moves
        .iter()
        .copied()
        .filter(|(src, dst)| src != dst)
        .collect();
    let mut ordered = Vec::with_capacity(pending.len() + 1);

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|&(_, dst)| !pending.iter().any(|&(src, _)| src == dst));
        match ready {
            Some(index) => ordered.push(pending.remove(index)),
            None => {
                let (_, blocked) = pending[0];
                ordered.push((blocked, scratch));
                for mv in pending.iter_mut() {
                    if mv.0 == blocked {
                        mv.0 = scratch;
                    }
                }
            }
        }
    }
    ordered
}
