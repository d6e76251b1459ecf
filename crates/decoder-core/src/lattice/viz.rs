//! Graph renderings of a lattice for Graphviz and aiSee.

use std::io::Write;

use super::Lattice;

impl Lattice {
    pub fn dump_dot(&self, w: &mut impl Write, title: &str) -> std::io::Result<()> {
        writeln!(w, "digraph \"{}\" {{", escape(title))?;
        writeln!(w, "rankdir = LR")?;
        for node in self.nodes() {
            let mut attrs = format!(
                "label = \"{} [{},{}]\"",
                escape(node.word.spelling()),
                node.begin_time,
                node.end_time
            );
            if Some(node.id) == self.initial || Some(node.id) == self.terminal {
                attrs.push_str(", shape = doublecircle");
            }
            writeln!(w, "node{} [ {attrs} ];", node.id)?;
        }
        for edge in self.edges() {
            writeln!(
                w,
                "node{} -> node{} [ label = \"{}, {}\" ];",
                edge.from, edge.to, edge.acoustic_score, edge.lm_score
            )?;
        }
        writeln!(w, "}}")
    }

    pub fn dump_aisee(&self, w: &mut impl Write, title: &str) -> std::io::Result<()> {
        writeln!(w, "graph: {{")?;
        writeln!(w, "title: \"{}\"", escape(title))?;
        writeln!(w, "display_edge_labels: yes")?;
        writeln!(w, "orientation: left_to_right")?;
        for node in self.nodes() {
            let color = if Some(node.id) == self.initial || Some(node.id) == self.terminal {
                " color: green"
            } else {
                ""
            };
            writeln!(
                w,
                "node: {{ title: \"{}\" label: \"{} [{},{}]\"{color} }}",
                node.id,
                escape(node.word.spelling()),
                node.begin_time,
                node.end_time
            )?;
        }
        for edge in self.edges() {
            writeln!(
                w,
                "edge: {{ sourcename: \"{}\" targetname: \"{}\" label: \"{}, {}\" }}",
                edge.from, edge.to, edge.acoustic_score, edge.lm_score
            )?;
        }
        writeln!(w, "}}")
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
