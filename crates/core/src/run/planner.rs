//! Task planning: expanding a selection against the catalog into a flat,
//! ordered list of variant tasks.

use tracing::debug;

use crate::catalog::ScriptsCatalog;

use super::types::{RunSelection, VariantTask};

/// Expands the enabled parts of `selection` into one task per declared
/// variant, in (group, script, variant) order.
///
/// Ids unknown to the catalog are dropped silently. The selection and the
/// catalog are edited independently, so drift between them is tolerated
/// rather than treated as an error.
pub fn plan_tasks(selection: &RunSelection, catalog: &ScriptsCatalog) -> Vec<VariantTask> {
    let mut tasks = Vec::new();
    for group_sel in selection.groups.iter().filter(|g| g.enabled) {
        let Some(group) = catalog.group(&group_sel.group_id) else {
            debug!(group_id = %group_sel.group_id, "selection group not in catalog, skipping");
            continue;
        };
        for script_sel in group_sel.scripts.iter().filter(|s| s.enabled) {
            let Some(script) = group.script(&script_sel.script_id) else {
                debug!(
                    group_id = %group_sel.group_id,
                    script_id = %script_sel.script_id,
                    "selection script not in catalog, skipping"
                );
                continue;
            };
            let variant_count = script.variants.len();
            for (variant_index, variant) in script.variants.iter().enumerate() {
                tasks.push(VariantTask {
                    group_id: group_sel.group_id.clone(),
                    script_id: script_sel.script_id.clone(),
                    variant_id: variant.id.clone(),
                    sql_file: variant.sql_file.clone(),
                    lane: script.execution_lane,
                    columns_profile_id: script.columns_profile_id.clone(),
                    variant_index,
                    variant_count,
                });
            }
        }
    }
    tasks
}
