use std::collections::{HashMap, HashSet};

use pokin_types::{QuarterSplit, StaffAssignment, WorkPlan, WorkPlanRow};

/// A staff id that showed up under more than one name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StaffNameConflict {
    pub staff_id: String,
    pub kept_name: String,
    pub other_name: String,
}

/// Folds the work-plan join rows of one node into staff assignments.
///
/// Staff are keyed by staff id alone and work plans by work-plan id within a staff
/// member. Both lists keep first-seen order. Budget amounts of repeated rows are summed
/// into the existing work plan; a row repeating an already counted budget line adds
/// nothing.
#[derive(Debug, Default)]
pub struct StaffPlanAggregator {
    staff: Vec<StaffAssignment>,
    staff_index: HashMap<String, usize>,
    // Parallel to `staff`: work-plan id -> position in that staff member's list.
    plan_index: Vec<HashMap<String, usize>>,
    counted_lines: HashSet<(String, String)>,
    // Distinct work-plan ids across all staff, in arrival order.
    plan_ids: Vec<String>,
    seen_plan_ids: HashSet<String>,
    conflicts: Vec<StaffNameConflict>,
}

impl StaffPlanAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: WorkPlanRow) {
        let staff_pos = self.staff_position(&row);
        let amount = self.countable_amount(&row);

        match self.plan_index[staff_pos].get(&row.work_plan_id) {
            Some(&plan_pos) => {
                self.staff[staff_pos].work_plans[plan_pos].budget += amount;
            }
            None => {
                if self.seen_plan_ids.insert(row.work_plan_id.clone()) {
                    self.plan_ids.push(row.work_plan_id.clone());
                }
                let plans = &mut self.staff[staff_pos].work_plans;
                self.plan_index[staff_pos].insert(row.work_plan_id.clone(), plans.len());
                plans.push(WorkPlan {
                    id: row.work_plan_id,
                    title: row.work_plan_title,
                    sub_activity_code: row.sub_activity_code.unwrap_or_default(),
                    sub_activity_name: row.sub_activity_name.unwrap_or_default(),
                    budget: amount,
                    note: row.note.unwrap_or_default(),
                    quarters: QuarterSplit::default(),
                });
            }
        }
    }

    /// Distinct work-plan ids in first-seen order.
    pub fn work_plan_ids(&self) -> Vec<String> {
        self.plan_ids.clone()
    }

    /// Sets every work plan's quarter split from `quarters_for(work_plan_id)`.
    pub fn attach_quarters<F>(&mut self, mut quarters_for: F)
    where
        F: FnMut(&str) -> QuarterSplit,
    {
        for wp in self.staff.iter_mut().flat_map(|s| s.work_plans.iter_mut()) {
            wp.quarters = quarters_for(&wp.id);
        }
    }

    pub fn conflicts(&self) -> &[StaffNameConflict] {
        &self.conflicts
    }

    pub fn is_empty(&self) -> bool {
        self.staff.is_empty()
    }

    pub fn finish(self) -> Vec<StaffAssignment> {
        self.staff
    }

    fn staff_position(&mut self, row: &WorkPlanRow) -> usize {
        if let Some(&pos) = self.staff_index.get(&row.staff_id) {
            let kept = &self.staff[pos].staff_name;
            if *kept != row.staff_name
                && !self
                    .conflicts
                    .iter()
                    .any(|c| c.staff_id == row.staff_id && c.other_name == row.staff_name)
            {
                self.conflicts.push(StaffNameConflict {
                    staff_id: row.staff_id.clone(),
                    kept_name: kept.clone(),
                    other_name: row.staff_name.clone(),
                });
            }
            return pos;
        }

        let pos = self.staff.len();
        self.staff.push(StaffAssignment {
            staff_name: row.staff_name.clone(),
            staff_id: row.staff_id.clone(),
            work_plans: Vec::new(),
        });
        self.staff_index.insert(row.staff_id.clone(), pos);
        self.plan_index.push(HashMap::new());
        pos
    }

    fn countable_amount(&mut self, row: &WorkPlanRow) -> i64 {
        if let Some(line) = &row.budget_line_id {
            let key = (row.work_plan_id.clone(), line.clone());
            if !self.counted_lines.insert(key) {
                return 0;
            }
        }
        row.budget.unwrap_or(0)
    }
}
