//! DOT rendering of the frozen execution graph, for offline inspection.

use std::fmt::Write;

use crate::metadata::SystemStage;
use crate::scheduler::{EdgeKind, SystemScheduler};

/// Pure function from the frozen graph to DOT text.
///
/// Systems are grouped into one cluster per stage; node labels carry the
/// popcounts of the read/write masks, parallel-eligible systems are filled
/// light blue and serialized systems light coral. Explicit edges render
/// solid, inferred edges dashed.
pub(crate) fn render(scheduler: &SystemScheduler) -> String {
    let mut out = String::new();
    out.push_str("digraph SystemSchedule {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [shape=box, style=filled];\n\n");

    for stage in SystemStage::ALL {
        let members = &scheduler.stage_nodes[stage.index()];
        if members.is_empty() {
            continue;
        }
        let _ = writeln!(out, "  subgraph cluster_{} {{", stage.index());
        let _ = writeln!(out, "    label=\"{}\";", stage.name());
        out.push_str("    style=filled;\n");
        out.push_str("    color=lightgrey;\n\n");

        for &id in members {
            let metadata = &scheduler.nodes[id as usize].metadata;
            let color = if metadata.parallel_eligible {
                "lightblue"
            } else {
                "lightcoral"
            };

            let mut label = metadata.name.clone();
            if !metadata.reads.is_empty() || !metadata.writes.is_empty() {
                label.push_str("\\n");
                if !metadata.reads.is_empty() {
                    let _ = write!(label, "R:{}", metadata.reads.count());
                }
                if !metadata.writes.is_empty() {
                    if !metadata.reads.is_empty() {
                        label.push(' ');
                    }
                    let _ = write!(label, "W:{}", metadata.writes.count());
                }
            }

            let _ = writeln!(out, "    s{id} [label=\"{label}\", fillcolor={color}];");
        }
        out.push_str("  }\n\n");
    }

    out.push_str("  // Dependencies\n");
    for (id, node) in scheduler.nodes.iter().enumerate() {
        for (target, kind) in &node.out_edges {
            let style = match kind {
                EdgeKind::Explicit => "solid",
                EdgeKind::Implicit => "dashed",
            };
            let _ = writeln!(out, "  s{id} -> s{target} [style={style}];");
        }
    }

    out.push_str("}\n");
    out
}
