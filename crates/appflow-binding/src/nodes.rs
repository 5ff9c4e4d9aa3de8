//! Expansion of a layout page into rendered nodes.
//!
//! Components inside a repeating group are rendered once per row. Each
//! rendered copy gets an id with the row numbers appended (`field-0`,
//! `field-1-2` for a group nested in a group) and its bindings rewritten
//! so `Group.Field` becomes `Group[row].Field`.

use std::collections::{BTreeMap, BTreeSet};

use appflow_model::layout::{self, Component, ComponentKind};
use appflow_model::RepeatingGroups;

/// Id of a rendered copy of `base` in the given rows.
pub fn instance_id(base: &str, rows: &[usize]) -> String {
    let mut id = base.to_string();
    for row in rows {
        id.push('-');
        id.push_str(&row.to_string());
    }
    id
}

/// Row numbers appended to `base` in `id`, if `id` is a copy of `base`.
///
/// `row_suffix("field-1-2", "field")` is `Some([1, 2])`;
/// `row_suffix("field", "field")` is `Some([])`.
pub fn row_suffix(id: &str, base: &str) -> Option<Vec<usize>> {
    let rest = id.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    rest.strip_prefix('-')?
        .split('-')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}

/// Match a rendered id against candidate layout ids.
///
/// The longest matching base wins, so `name-2-0` resolves to a component
/// called `name-2` when one exists rather than to `name`.
pub fn match_instance<'a>(id: &str, bases: &[&'a str]) -> Option<(&'a str, Vec<usize>)> {
    bases
        .iter()
        .filter_map(|base| row_suffix(id, base).map(|rows| (*base, rows)))
        .max_by_key(|(base, _)| base.len())
}

/// Rewrite `binding` into row `row` of the group bound at `group_binding`.
///
/// Only bindings equal to the group binding or below it are touched.
pub fn index_binding(binding: &str, group_binding: &str, row: usize) -> String {
    let Some(rest) = binding.strip_prefix(group_binding) else {
        return binding.to_string();
    };
    if rest.is_empty() || rest.starts_with('.') {
        format!("{group_binding}[{row}]{rest}")
    } else {
        binding.to_string()
    }
}

/// Reference to an enclosing group node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub id: String,
    pub base_id: String,
}

/// A component as rendered, with row-specific id and bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub base_id: String,
    /// Rows of every enclosing repeating group, outermost first.
    pub rows: Vec<usize>,
    /// Enclosing groups, outermost first.
    pub ancestors: Vec<GroupRef>,
    /// Bindings with row indices filled in.
    pub bindings: BTreeMap<String, String>,
    pub component: Component,
}

impl Node {
    pub fn kind(&self) -> &ComponentKind {
        &self.component.kind
    }

    /// Hidden when the node, its layout component or any enclosing group is.
    pub fn is_hidden(&self, hidden: &BTreeSet<String>) -> bool {
        hidden.contains(&self.id)
            || hidden.contains(&self.base_id)
            || self
                .ancestors
                .iter()
                .any(|group| hidden.contains(&group.id) || hidden.contains(&group.base_id))
    }

    /// Binding key (e.g. `simpleBinding`) for a rewritten binding path.
    pub fn binding_key_for(&self, path: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|(_, bound)| bound.as_str() == path)
            .map(|(key, _)| key.as_str())
    }
}

/// Expand a page into its rendered nodes, in layout order.
pub fn expand_layout(layout: &[Component], groups: &RepeatingGroups) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut walker = Walker {
        layout,
        groups,
        nodes: &mut nodes,
    };
    for component in layout {
        if layout::parent_group(layout, &component.id).is_none() {
            walker.visit(component, &Scope::default());
        }
    }
    nodes
}

/// Row context inherited from enclosing groups.
#[derive(Debug, Clone, Default)]
struct Scope {
    rows: Vec<usize>,
    ancestors: Vec<GroupRef>,
    /// Indexed group bindings paired with the row to insert.
    rewrites: Vec<(String, usize)>,
}

impl Scope {
    fn rewrite(&self, binding: &str) -> String {
        self.rewrites
            .iter()
            .fold(binding.to_string(), |current, (group, row)| {
                index_binding(&current, group, *row)
            })
    }
}

struct Walker<'a> {
    layout: &'a [Component],
    groups: &'a RepeatingGroups,
    nodes: &'a mut Vec<Node>,
}

impl Walker<'_> {
    fn visit(&mut self, component: &Component, scope: &Scope) {
        let id = instance_id(&component.id, &scope.rows);
        let bindings: BTreeMap<String, String> = component
            .data_model_bindings
            .iter()
            .map(|(key, path)| (key.clone(), scope.rewrite(path)))
            .collect();

        self.nodes.push(Node {
            id: id.clone(),
            base_id: component.id.clone(),
            rows: scope.rows.clone(),
            ancestors: scope.ancestors.clone(),
            bindings: bindings.clone(),
            component: component.clone(),
        });

        if component.kind != ComponentKind::Group {
            return;
        }

        let mut inner = scope.clone();
        inner.ancestors.push(GroupRef {
            id: id.clone(),
            base_id: component.id.clone(),
        });
        let children = layout::group_children(self.layout, &component.id);

        let group_binding = component
            .is_repeating_group()
            .then(|| bindings.get(layout::GROUP_BINDING).cloned())
            .flatten();
        let Some(group_binding) = group_binding else {
            for child in children {
                self.visit(child, &inner);
            }
            return;
        };

        for row in 0..self.groups.count(&id) {
            let mut row_scope = inner.clone();
            row_scope.rows.push(row);
            row_scope.rewrites.push((group_binding.clone(), row));
            for child in &children {
                self.visit(child, &row_scope);
            }
        }
    }
}
