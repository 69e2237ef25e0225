use std::collections::HashMap;

use pokin_types::{Indicator, IndicatorRow, NodeKind, Target, TreeNode};

/// Folds node x indicator x target rows into nodes with nested indicators.
///
/// Nodes and indicators are deduplicated by id and kept in first-seen order.
/// Targets are appended as they arrive, repeats included.
#[derive(Debug, Default)]
pub struct IndicatorTreeBuilder {
    nodes: Vec<TreeNode>,
    node_index: HashMap<i64, usize>,
    // Parallel to `nodes`: indicator id -> position in that node's list.
    indicator_index: Vec<HashMap<String, usize>>,
    skipped: usize,
}

impl IndicatorTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the row has no node to attach to and was skipped.
    pub fn push(&mut self, row: IndicatorRow) -> bool {
        let Some(node_id) = row.node_id else {
            self.skipped += 1;
            return false;
        };

        let node_pos = match self.node_index.get(&node_id) {
            Some(&pos) => pos,
            None => {
                let pos = self.nodes.len();
                self.nodes.push(TreeNode {
                    program_code: Some(row.program_code.clone()),
                    tagging_id: Some(row.tagging_id),
                    id: node_id,
                    year: row.node_year,
                    name: row.node_name.clone().unwrap_or_default(),
                    org_unit_code: row.org_unit_code.clone().unwrap_or_default(),
                    org_unit_name: row.org_unit_name.clone().unwrap_or_default(),
                    kind: row.node_kind.as_deref().map(NodeKind::parse).unwrap_or_default(),
                    ..TreeNode::default()
                });
                self.node_index.insert(node_id, pos);
                self.indicator_index.push(HashMap::new());
                pos
            }
        };

        let Some(indicator_id) = row.indicator_id else {
            return true;
        };

        let indicators = &mut self.nodes[node_pos].indicators;
        let ind_pos = match self.indicator_index[node_pos].get(&indicator_id) {
            Some(&pos) => pos,
            None => {
                let pos = indicators.len();
                self.indicator_index[node_pos].insert(indicator_id.clone(), pos);
                indicators.push(Indicator {
                    id: indicator_id,
                    name: row.indicator_name.unwrap_or_default(),
                    targets: Vec::new(),
                });
                pos
            }
        };

        if let Some(target_id) = row.target_id {
            indicators[ind_pos].targets.push(Target {
                id: target_id,
                value: row.target_value.unwrap_or_default(),
                unit: row.target_unit.unwrap_or_default(),
                year: row.target_year,
            });
        }
        true
    }

    /// Rows dropped because their node id was NULL.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn finish(self) -> Vec<TreeNode> {
        self.nodes
    }
}
