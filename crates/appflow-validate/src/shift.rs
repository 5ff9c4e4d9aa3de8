//! Keeping validations aligned with repeating-group rows.

use appflow_binding::groups::descendants;
use appflow_binding::{Result, RowShift, match_instance, resolve_group, shift_instance_id};
use appflow_model::Component;

use crate::result::{ComponentValidations, Validations};

/// Drop the validations of row `index` of a group instance and move the
/// validations of later rows down by one.
///
/// Covers every component below the group, including copies inside
/// nested groups. Other pages and components outside the group are left
/// alone.
pub fn remove_group_validations_by_index(
    validations: &mut Validations,
    layout_id: &str,
    layout: &[Component],
    group_instance: &str,
    index: usize,
) -> Result<()> {
    let group = resolve_group(layout, group_instance)?;
    let Some(page) = validations.layout_mut(layout_id) else {
        return Ok(());
    };

    let bases: Vec<&str> = descendants(layout, &group.component.id)
        .into_iter()
        .map(|component| component.id.as_str())
        .collect();

    let mut moved: Vec<(String, ComponentValidations)> = Vec::new();
    let keys: Vec<String> = page.keys().cloned().collect();
    for key in keys {
        let Some((base, _)) = match_instance(&key, &bases) else {
            continue;
        };
        match shift_instance_id(&key, base, &group.parent_rows, index) {
            RowShift::Keep => {}
            RowShift::Drop => {
                page.remove(&key);
            }
            RowShift::Rename(renamed) => {
                if let Some(entry) = page.remove(&key) {
                    moved.push((renamed, entry));
                }
            }
        }
    }
    let count = moved.len();
    page.extend(moved);

    tracing::debug!(
        layout = layout_id,
        group = group_instance,
        index,
        shifted = count,
        "removed group row validations"
    );
    Ok(())
}
