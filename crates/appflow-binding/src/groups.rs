//! Repeating-group row arithmetic over form data.

use appflow_model::layout::{self, Component, ComponentKind};
use appflow_model::{RepeatingGroup, RepeatingGroups};

use crate::codec::FormData;
use crate::error::{BindingError, Result};
use crate::nodes::{index_binding, instance_id, match_instance, row_suffix};
use crate::path::FieldPath;

/// What happens to a row-addressed key when a row is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowShift {
    /// Not in the affected group, or in an earlier row.
    Keep,
    /// Belongs to the deleted row.
    Drop,
    /// Belongs to a later row and moves down by one.
    Rename(String),
}

/// Shift a row-suffixed id after deleting row `deleted` of a group.
///
/// `id` is a rendered copy of `base`; `parent_rows` are the rows of the
/// group instance that lost a row, so the affected suffix position is
/// `parent_rows.len()`.
pub fn shift_instance_id(id: &str, base: &str, parent_rows: &[usize], deleted: usize) -> RowShift {
    let Some(mut rows) = row_suffix(id, base) else {
        return RowShift::Keep;
    };
    let position = parent_rows.len();
    if rows.len() <= position || rows[..position] != *parent_rows {
        return RowShift::Keep;
    }
    match rows[position] {
        row if row == deleted => RowShift::Drop,
        row if row > deleted => {
            rows[position] = row - 1;
            RowShift::Rename(instance_id(base, &rows))
        }
        _ => RowShift::Keep,
    }
}

/// A group instance id split into its layout component and parent rows.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupInstance<'a> {
    pub component: &'a Component,
    pub parent_rows: Vec<usize>,
    /// Group binding with the parent rows filled in.
    pub binding: String,
}

/// Resolve a group instance id such as `child-2` to its component and
/// indexed binding.
pub fn resolve_group<'a>(layout: &'a [Component], instance: &str) -> Result<GroupInstance<'a>> {
    let (component, parent_rows) = split_instance(layout, instance)
        .ok_or_else(|| BindingError::UnknownGroup {
            id: instance.to_string(),
        })?;
    if !component.is_repeating_group() {
        return Err(BindingError::NotRepeating {
            id: component.id.clone(),
        });
    }
    let binding = resolve_group_binding(layout, component, &parent_rows)?;
    Ok(GroupInstance {
        component,
        parent_rows,
        binding,
    })
}

/// Find the component behind an instance id by peeling `-N` suffixes.
fn split_instance<'a>(layout: &'a [Component], instance: &str) -> Option<(&'a Component, Vec<usize>)> {
    let mut candidate = instance;
    loop {
        if let Some(component) = layout::find(layout, candidate) {
            let rows = row_suffix(instance, &component.id)?;
            return Some((component, rows));
        }
        let (head, tail) = candidate.rsplit_once('-')?;
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        candidate = head;
    }
}

/// Group binding of `component` with each enclosing repeating group's row
/// filled in from `parent_rows`.
pub fn resolve_group_binding(
    layout: &[Component],
    component: &Component,
    parent_rows: &[usize],
) -> Result<String> {
    let repeating_ancestors = repeating_ancestors(layout, &component.id);
    if repeating_ancestors.len() != parent_rows.len() {
        return Err(BindingError::UnknownGroup {
            id: instance_id(&component.id, parent_rows),
        });
    }

    let mut rewrites: Vec<(String, usize)> = Vec::new();
    let rewrite = |binding: &str, rewrites: &[(String, usize)]| {
        rewrites
            .iter()
            .fold(binding.to_string(), |current, (group, row)| index_binding(&current, group, *row))
    };
    for (ancestor, row) in repeating_ancestors.iter().zip(parent_rows) {
        let binding = ancestor.group_binding().unwrap_or_default();
        let indexed = rewrite(binding, &rewrites);
        rewrites.push((indexed, *row));
    }

    let own = component.group_binding().ok_or_else(|| BindingError::NotRepeating {
        id: component.id.clone(),
    })?;
    Ok(rewrite(own, &rewrites))
}

/// Enclosing repeating groups of `id`, outermost first.
fn repeating_ancestors<'a>(layout: &'a [Component], id: &str) -> Vec<&'a Component> {
    let mut chain = Vec::new();
    let mut current = id;
    while let Some(parent) = layout::parent_group(layout, current) {
        if parent.is_repeating_group() {
            chain.push(parent);
        }
        current = &parent.id;
    }
    chain.reverse();
    chain
}

/// Every component below `group_id`, at any depth.
pub fn descendants<'a>(layout: &'a [Component], group_id: &str) -> Vec<&'a Component> {
    let mut found = Vec::new();
    let mut pending = vec![group_id];
    while let Some(current) = pending.pop() {
        for child in layout::group_children(layout, current) {
            if child.kind == ComponentKind::Group {
                pending.push(&child.id);
            }
            found.push(child);
        }
    }
    found
}

/// Delete row `index` of the repeating group instance `instance`.
///
/// Removes every form data key of that row, including keys of groups
/// nested in it, and moves all later rows down by one. Nested group state
/// keyed by the deleted row is dropped and later rows' state renamed.
pub fn remove_group_row(
    form_data: &mut FormData,
    groups: &mut RepeatingGroups,
    layout: &[Component],
    instance: &str,
    index: usize,
) -> Result<()> {
    let group = resolve_group(layout, instance)?;
    let count = groups.count(instance);
    if index >= count {
        return Err(BindingError::RowOutOfRange {
            id: instance.to_string(),
            index,
            count,
        });
    }

    let group_path = FieldPath::parse(&group.binding)?;
    let position = group_path.len() - 1;
    let mut shifted = FormData::new();
    for (key, value) in std::mem::take(form_data) {
        let Ok(path) = FieldPath::parse(&key) else {
            shifted.insert(key, value);
            continue;
        };
        match path.row_in(&group_path) {
            Some(row) if row == index => {}
            Some(row) if row > index => {
                shifted.insert(path.with_index_at(position, row - 1).to_string(), value);
            }
            _ => {
                shifted.insert(key, value);
            }
        }
    }
    *form_data = shifted;

    let nested: Vec<&str> = descendants(layout, &group.component.id)
        .into_iter()
        .filter(|component| component.is_repeating_group())
        .map(|component| component.id.as_str())
        .collect();
    let keys: Vec<String> = groups.iter().map(|(id, _)| id.to_string()).collect();
    let mut renamed = Vec::new();
    for key in keys {
        let Some((base, _)) = match_instance(&key, &nested) else {
            continue;
        };
        match shift_instance_id(&key, base, &group.parent_rows, index) {
            RowShift::Keep => {}
            RowShift::Drop => {
                groups.remove(&key);
            }
            RowShift::Rename(new_key) => {
                if let Some(state) = groups.remove(&key) {
                    renamed.push((new_key, state));
                }
            }
        }
    }
    for (key, state) in renamed {
        groups.set(key, state);
    }

    groups.decrement(instance);
    tracing::debug!(group = %instance, row = index, "removed repeating group row");
    Ok(())
}

/// Derive row counts for every repeating group from form data.
///
/// A group's count is one past the highest row index present, so a group
/// with no data has zero rows. Nested groups get one entry per parent row.
pub fn init_repeating_groups(layout: &[Component], form_data: &FormData) -> RepeatingGroups {
    let paths: Vec<FieldPath> = form_data
        .keys()
        .filter_map(|key| FieldPath::parse(key).ok())
        .collect();
    let mut groups = RepeatingGroups::new();
    for component in layout {
        if component.is_repeating_group() && repeating_ancestors(layout, &component.id).is_empty() {
            count_rows(layout, component, &[], &[], &paths, &mut groups);
        }
    }
    groups
}

fn count_rows(
    layout: &[Component],
    group: &Component,
    rows: &[usize],
    rewrites: &[(String, usize)],
    paths: &[FieldPath],
    out: &mut RepeatingGroups,
) {
    let binding = rewrites
        .iter()
        .fold(group.group_binding().unwrap_or_default().to_string(), |current, (g, row)| {
            index_binding(&current, g, *row)
        });
    let Ok(group_path) = FieldPath::parse(&binding) else {
        tracing::warn!(group = %group.id, binding = %binding, "invalid group binding");
        return;
    };

    let count = paths
        .iter()
        .filter_map(|path| path.row_in(&group_path))
        .max()
        .map_or(0, |max| max + 1);
    let id = instance_id(&group.id, rows);
    out.set(
        id,
        RepeatingGroup {
            count,
            base_group_id: (!rows.is_empty()).then(|| group.id.clone()),
        },
    );

    let nested: Vec<&Component> = descendants(layout, &group.id)
        .into_iter()
        .filter(|child| {
            child.is_repeating_group()
                && repeating_ancestors(layout, &child.id).last().map(|parent| &parent.id) == Some(&group.id)
        })
        .collect();
    for row in 0..count {
        let mut child_rows = rows.to_vec();
        child_rows.push(row);
        let mut child_rewrites = rewrites.to_vec();
        child_rewrites.push((binding.clone(), row));
        for child in &nested {
            count_rows(layout, child, &child_rows, &child_rewrites, paths, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Vec<Component> {
        vec![
            Component::new("g", ComponentKind::Group)
                .repeating("G", 10)
                .with_children(["f", "g2"]),
            Component::new("f", ComponentKind::Other("Input".into())).with_binding("simpleBinding", "G.F"),
            Component::new("g2", ComponentKind::Group)
                .repeating("G.G2", 10)
                .with_children(["x"]),
            Component::new("x", ComponentKind::Other("Input".into())).with_binding("simpleBinding", "G.G2.X"),
        ]
    }

    fn form(entries: &[(&str, &str)]) -> FormData {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn shift_instance_ids() {
        assert_eq!(shift_instance_id("x-1-0", "x", &[], 1), RowShift::Drop);
        assert_eq!(
            shift_instance_id("x-2-0", "x", &[], 1),
            RowShift::Rename("x-1-0".into())
        );
        assert_eq!(shift_instance_id("x-0-3", "x", &[], 1), RowShift::Keep);
        assert_eq!(shift_instance_id("x-0-3", "x", &[0], 1), RowShift::Rename("x-0-2".into()));
        assert_eq!(shift_instance_id("x-1-3", "x", &[0], 1), RowShift::Keep);
    }

    #[test]
    fn resolves_nested_instance_binding() {
        let layout = layout();
        let group = resolve_group(&layout, "g2-3").unwrap();
        assert_eq!(group.component.id, "g2");
        assert_eq!(group.parent_rows, vec![3]);
        assert_eq!(group.binding, "G[3].G2");

        assert!(matches!(
            resolve_group(&layout, "nope-1"),
            Err(BindingError::UnknownGroup { .. })
        ));
        assert!(matches!(
            resolve_group(&layout, "f"),
            Err(BindingError::NotRepeating { .. })
        ));
    }

    #[test]
    fn init_counts_nested_rows() {
        let data = form(&[
            ("G[0].F", "a"),
            ("G[1].F", "b"),
            ("G[1].G2[0].X", "x"),
            ("G[1].G2[2].X", "z"),
        ]);
        let groups = init_repeating_groups(&layout(), &data);
        assert_eq!(groups.count("g"), 2);
        assert_eq!(groups.count("g2-0"), 0);
        assert_eq!(groups.count("g2-1"), 3);
        assert_eq!(
            groups.get("g2-1").and_then(|g| g.base_group_id.as_deref()),
            Some("g2")
        );
    }

    #[test]
    fn removing_last_row_leaves_no_ghosts() {
        let layout = layout();
        let mut data = form(&[("G[0].F", "a"), ("G[1].F", "b")]);
        let mut groups = init_repeating_groups(&layout, &data);
        remove_group_row(&mut data, &mut groups, &layout, "g", 1).unwrap();
        assert_eq!(data, form(&[("G[0].F", "a")]));
        assert_eq!(groups.count("g"), 1);
    }

    #[test]
    fn removing_nested_row_only_touches_that_instance() {
        let layout = layout();
        let mut data = form(&[
            ("G[0].G2[0].X", "a0"),
            ("G[0].G2[1].X", "a1"),
            ("G[1].G2[0].X", "b0"),
            ("G[1].G2[1].X", "b1"),
        ]);
        let mut groups = init_repeating_groups(&layout, &data);
        remove_group_row(&mut data, &mut groups, &layout, "g2-1", 0).unwrap();
        assert_eq!(
            data,
            form(&[("G[0].G2[0].X", "a0"), ("G[0].G2[1].X", "a1"), ("G[1].G2[0].X", "b1")])
        );
        assert_eq!(groups.count("g2-0"), 2);
        assert_eq!(groups.count("g2-1"), 1);
    }

    #[test]
    fn row_out_of_range_is_rejected() {
        let layout = layout();
        let mut data = form(&[("G[0].F", "a")]);
        let mut groups = init_repeating_groups(&layout, &data);
        let error = remove_group_row(&mut data, &mut groups, &layout, "g", 4).unwrap_err();
        assert!(matches!(error, BindingError::RowOutOfRange { count: 1, .. }));
    }
}
