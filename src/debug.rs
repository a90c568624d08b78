use std::{collections::VecDeque, fmt};

use crate::{AvlMap, NodeId};

impl<K: Ord, V> AvlMap<K, V> {
    /// Writes a Graphviz rendering of the tree to `w`.
    ///
    /// Nodes are labeled `key:balance`. Missing children are drawn as
    /// points so that the left/right distinction survives the layout.
    pub fn dotgraph<W>(&self, name: &str, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        K: fmt::Display,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item {
            Node(NodeId),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        for _depth in 0.. {
            use fmt::Write;
            let remaining = queue.len();
            if remaining == 0 {
                break;
            }

            write!(w, "{{rank=same; ")?;

            for _ in 0..remaining {
                let node = match queue.pop_front() {
                    Some(Item::Node(node)) => node,
                    Some(Item::Missing(id)) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => unreachable!("queue drained mid-row"),
                };

                let key = self.arena[node].key();
                let balance = self.arena[node].balance();
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{balance}\"]; ")?;

                for child in [self.arena[node].left(), self.arena[node].right()] {
                    match child {
                        Some(child) => {
                            let child_key = self.arena[child].key();

                            queue.push_back(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }
                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
