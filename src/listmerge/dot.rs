//! Helper code to render an oplog's DAG with graphviz, to show whats going on in a
//! document. Made as an aide to debugging; compilation is behind a feature flag
//! (dot_export).

use std::fmt::Write as _;

use crate::operation::OpKind;
use crate::oplog::OpLog;

impl OpLog {
    /// Render the operation DAG as graphviz DOT. Each op is a node; edges point from an
    /// op up to its parents (rankdir puts parents below). Ops with several parents go
    /// through a small synthetic merge node so the fan-in is visible at a glance.
    pub fn to_dot_graph(&self) -> String {
        let mut out = String::new();
        out.push_str("strict digraph {\n");
        out.push_str("\trankdir=\"BT\"\n");
        out.push_str("\tlabelloc=\"t\"\n");
        out.push_str("\tnode [shape=box style=filled]\n");
        out.push_str("\tedge [color=\"#333333\"]\n");
        out.push_str("\tROOT [fillcolor=red label=<ROOT>]\n");

        for (lv, entry) in self.ops.iter().enumerate() {
            let label = match entry.op.kind {
                OpKind::Ins => {
                    let content = entry.op.content.unwrap();
                    format!("{} (INS '{}' at {})", lv, content, entry.op.pos)
                }
                OpKind::Del => format!("{} (DEL {})", lv, entry.op.pos),
            };
            out.write_fmt(format_args!("\t{} [fillcolor=\"#eeeeee\" label=<{}>]\n", lv, label)).unwrap();

            match entry.parents.as_slice() {
                [] => {
                    out.write_fmt(format_args!("\t{} -> ROOT\n", lv)).unwrap();
                }
                [parent] => {
                    out.write_fmt(format_args!("\t{} -> {}\n", lv, parent)).unwrap();
                }
                parents => {
                    // Fold the fan-in through a synthetic merge node.
                    out.write_fmt(format_args!(
                        "\tmerge{} [fillcolor=\"#84a7e8\" shape=ellipse label=\"\"]\n", lv)).unwrap();
                    out.write_fmt(format_args!("\t{} -> merge{}\n", lv, lv)).unwrap();
                    for p in parents {
                        out.write_fmt(format_args!("\tmerge{} -> {}\n", lv, p)).unwrap();
                    }
                }
            }
        }

        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod test {
    use crate::oplog::OpLog;

    #[test]
    fn renders_ops_and_merge_nodes() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("seph");
        let b = oplog.get_or_create_agent_id("mike");
        oplog.add_insert_at(a, &[], 0, "a"); // 0
        oplog.add_insert_at(b, &[], 0, "b"); // 1
        oplog.add_delete_at(a, &[0, 1], 0..1); // 2, merges the two branches

        let dot = oplog.to_dot_graph();
        assert!(dot.contains("rankdir=\"BT\""));
        assert!(dot.contains("0 (INS 'a' at 0)"));
        assert!(dot.contains("2 (DEL 0)"));
        assert!(dot.contains("\t0 -> ROOT\n"));
        assert!(dot.contains("\t2 -> merge2\n"));
        assert!(dot.contains("\tmerge2 -> 0\n"));
        assert!(dot.contains("\tmerge2 -> 1\n"));
    }

    #[test]
    #[ignore]
    fn write_graph_to_disk() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("seph");
        let b = oplog.get_or_create_agent_id("mike");
        oplog.add_insert_at(a, &[], 0, "aaa");
        oplog.add_insert_at(b, &[], 0, "b");
        oplog.add_delete_at(a, &[2, 3], 0..2);

        std::fs::write("dag.dot", oplog.to_dot_graph()).unwrap();
        println!("Graph written to dag.dot");
    }
}
