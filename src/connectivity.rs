use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use crate::cell::{Color, Island, IslandId};

/// Whether the bridges in `links` join `islands` as a finished board requires.
///
/// Without castles every island must end up in one component. With castles, every component must hold castles of
/// exactly one colour and all castles of a colour must share a component.
pub(crate) fn is_connected(islands: &[Island], links: impl IntoIterator<Item = (IslandId, IslandId)>) -> bool {
    if islands.len() <= 1 {
        return true;
    }

    let mut components = UnionFind::<usize>::new(islands.len());
    for (a, b) in links {
        components.union(a, b);
    }

    let castles = islands.iter()
        .enumerate()
        .filter_map(|(id, island)| island.color.map(|color| (id, color)));

    let mut color_of_component: HashMap<usize, Color> = HashMap::new();
    let mut component_of_color: HashMap<Color, usize> = HashMap::new();
    for (id, color) in castles {
        let component = components.find(id);
        if *color_of_component.entry(component).or_insert(color) != color {
            return false;
        }
        if *component_of_color.entry(color).or_insert(component) != component {
            return false;
        }
    }

    if color_of_component.is_empty() {
        let first = components.find(0);
        return (1..islands.len()).all(|id| components.find(id) == first);
    }

    (0..islands.len()).all(|id| color_of_component.contains_key(&components.find(id)))
}
