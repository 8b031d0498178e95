//! The isolation rule: find the links the bridge graph cannot do without.
//!
//! Only islands needing more than one bridge take part. An island needing exactly one bridge is a leaf in every
//! solution, so it can never be the only way between two other islands.
//!
//! The islands live in an arena. Each entry carries a union-find parent and an intrusive circular `next` list, so
//! the members of a merged component can be enumerated without any side table. A single walk follows one untried
//! link at a time. Reaching a component already on the walk closes a loop, and everything on the loop is merged:
//! no single link of a loop is needed. A component with no untried link left is retired, and the link the walk
//! entered it by is forced, since nothing else reaches it. Islands the walk never reaches cannot be joined at all.
//!
//! On boards with castles an island only has to reach some castle, not every other island. Castles join the arena
//! and a hub node is linked to each of them, and the walk starts at the hub. A castle always shares a component with
//! the hub, so a retired component holds no castle, and the link into it is still the only way to one.

use ndarray::Array2;

use crate::board::Board;
use crate::location::Location;
use crate::mask::{group, Mask, NONZERO, ZERO};
use crate::shape::Direction;

struct Node {
    parent: usize,
    // next member of the same component, circular
    next: usize,
    links: Vec<usize>,
    // links before this index have been tried
    cursor: usize,
}

impl Node {
    fn new(slot: usize) -> Self {
        Self { parent: slot, next: slot, links: Vec::new(), cursor: 0 }
    }
}

struct Link {
    ends: (usize, usize),
    // tile and forward direction on the board; `None` for hub links
    run: Option<(Location, Direction)>,
}

struct Arena {
    nodes: Vec<Node>,
    links: Vec<Link>,
    hub: Option<usize>,
}

impl Arena {
    fn new(board: &Board, layer: &Array2<Mask>) -> Self {
        let mut slot_of = vec![None; board.islands.len()];
        let mut nodes = Vec::new();
        let mut castles = Vec::new();
        for (id, island) in board.islands.iter().enumerate() {
            let castle = island.color.is_some();
            if castle || island.population.is_some_and(|population| population > 1) {
                if castle {
                    castles.push(nodes.len());
                }
                slot_of[id] = Some(nodes.len());
                nodes.push(Node::new(nodes.len()));
            }
        }

        let mut links = Vec::new();
        let hub = (!castles.is_empty()).then(|| {
            let hub = nodes.len();
            nodes.push(Node::new(hub));
            for castle in castles {
                nodes[hub].links.push(links.len());
                nodes[castle].links.push(links.len());
                links.push(Link { ends: (hub, castle), run: None });
            }
            hub
        });

        for (id, island) in board.islands.iter().enumerate() {
            let Some(a) = slot_of[id] else { continue };
            for at in &island.tiles {
                for direction in Direction::FORWARD_VARIANTS {
                    if group(layer[at.as_index()], *direction) & NONZERO == 0 {
                        continue;
                    }
                    let Some(b) = board.far_end(*at, *direction)
                        .and_then(|far| board.tiles[far.as_index()].island)
                        .and_then(|far_id| slot_of[far_id]) else { continue };

                    nodes[a].links.push(links.len());
                    nodes[b].links.push(links.len());
                    links.push(Link { ends: (a, b), run: Some((*at, *direction)) });
                }
            }
        }

        Self { nodes, links, hub }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.nodes[node].parent != node {
            let grandparent = self.nodes[self.nodes[node].parent].parent;
            self.nodes[node].parent = grandparent;
            node = grandparent;
        }
        node
    }

    /// Merge the components of `a` and `b`, returning the surviving representative.
    fn union(&mut self, a: usize, b: usize) -> usize {
        let (a, b) = (self.find(a), self.find(b));
        if a == b {
            return a;
        }

        self.nodes[b].parent = a;
        // splice the two member rings into one
        let next_a = self.nodes[a].next;
        self.nodes[a].next = self.nodes[b].next;
        self.nodes[b].next = next_a;
        a
    }

    /// Take the next untried link of any member of `component`.
    fn untried_link(&mut self, component: usize, tried: &mut [bool]) -> Option<usize> {
        let mut member = component;
        loop {
            let node = &mut self.nodes[member];
            while node.cursor < node.links.len() {
                let link = node.links[node.cursor];
                node.cursor += 1;
                if !tried[link] {
                    tried[link] = true;
                    return Some(link);
                }
            }

            member = node.next;
            if member == component {
                return None;
            }
        }
    }
}

/// Prove which links must carry a bridge for `layer` to stay connected.
///
/// Returns the forced links that still allow zero bridges, as a tile and forward direction, or `None` if the
/// islands cannot be connected at all. With castles, connected means every island reaches a castle.
pub(crate) fn forced_links(board: &Board, layer: &Array2<Mask>) -> Option<Vec<(Location, Direction)>> {
    let mut arena = Arena::new(board, layer);
    let count = arena.nodes.len();
    if count <= 1 {
        return Some(Vec::new());
    }

    let mut tried = vec![false; arena.links.len()];
    let mut on_walk = vec![false; count];
    let mut retired = vec![false; count];
    let mut forced = Vec::new();

    // component and the link the walk entered it by
    let start = arena.hub.unwrap_or(0);
    let mut walk: Vec<(usize, Option<usize>)> = vec![(start, None)];
    on_walk[start] = true;

    while let Some(&(top, via)) = walk.last() {
        let current = arena.find(top);
        let Some(link) = arena.untried_link(current, &mut tried) else {
            walk.pop();
            on_walk[current] = false;
            retired[current] = true;
            if let Some(link) = via {
                forced.push(link);
            }
            continue;
        };

        let (a, b) = arena.links[link].ends;
        let (a, b) = (arena.find(a), arena.find(b));
        let other = if a == current { b } else { a };
        if other == current || retired[other] {
            continue;
        }

        if !on_walk[other] {
            on_walk[other] = true;
            walk.push((other, Some(link)));
            continue;
        }

        // a loop back to `other`; fold everything above it into one component
        let mut merged = other;
        while let Some(&(entry, entry_via)) = walk.last() {
            let entry = arena.find(entry);
            walk.pop();
            on_walk[entry] = false;
            merged = arena.union(merged, entry);
            if entry == other {
                on_walk[merged] = true;
                walk.push((merged, entry_via));
                break;
            }
        }
    }

    if (0..count).any(|node| !retired[arena.find(node)]) {
        return None;
    }

    Some(forced.into_iter()
        .filter_map(|link| arena.links[link].run)
        .filter(|(at, direction)| group(layer[at.as_index()], *direction) & ZERO != 0)
        .collect())
}
