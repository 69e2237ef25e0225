use pokin_store::{DataError, ReportSource};
use pokin_types::{Classification, NodeKind, TreeNode};

/// Which classification a node kind is entitled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassificationSlot {
    AreaOfGovernance,
    Program,
}

impl ClassificationSlot {
    pub fn for_kind(kind: &NodeKind) -> Option<Self> {
        if kind.is_strategic() {
            Some(ClassificationSlot::AreaOfGovernance)
        } else if kind.is_tactical() {
            Some(ClassificationSlot::Program)
        } else {
            None
        }
    }

    pub fn assign(self, node: &mut TreeNode, c: Classification) {
        match self {
            ClassificationSlot::AreaOfGovernance => node.area_of_governance = c,
            ClassificationSlot::Program => node.program = c,
        }
    }
}

/// Single-row lookup for the slot. `Ok(None)` means nothing linked, not a failure.
pub async fn lookup(
    source: &dyn ReportSource,
    node_id: i64,
    slot: ClassificationSlot,
) -> Result<Option<Classification>, DataError> {
    match slot {
        ClassificationSlot::AreaOfGovernance => source.area_of_governance(node_id).await,
        ClassificationSlot::Program => source.program(node_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_strategic_and_tactical_kinds_get_a_slot() {
        assert_eq!(
            ClassificationSlot::for_kind(&NodeKind::StrategicRegional),
            Some(ClassificationSlot::AreaOfGovernance)
        );
        assert_eq!(
            ClassificationSlot::for_kind(&NodeKind::Tactical),
            Some(ClassificationSlot::Program)
        );
        for kind in [
            NodeKind::Operational,
            NodeKind::OperationalRegional,
            NodeKind::Other("Sub Operational".into()),
            NodeKind::default(),
        ] {
            assert_eq!(ClassificationSlot::for_kind(&kind), None);
        }
    }
}
