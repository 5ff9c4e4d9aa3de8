//! Tests for repeating-group row deletion.

use appflow_binding::{BindingError, FormData, expand_layout, init_repeating_groups, remove_group_row, resolve_group};
use appflow_model::{Component, ComponentKind};

fn input(id: &str, binding: &str) -> Component {
    Component::new(id, ComponentKind::Other("Input".into())).with_binding("simpleBinding", binding)
}

fn layout() -> Vec<Component> {
    vec![
        input("title", "Title"),
        Component::new("g", ComponentKind::Group)
            .repeating("G", 10)
            .with_children(["name", "g2"]),
        input("name", "G.Name"),
        Component::new("g2", ComponentKind::Group)
            .repeating("G.G2", 10)
            .with_children(["value"]),
        input("value", "G.G2.Value"),
        Component::new("other", ComponentKind::Group)
            .repeating("Other", 10)
            .with_children(["o"]),
        input("o", "Other.O"),
    ]
}

fn form(entries: &[(&str, &str)]) -> FormData {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

fn render(data: &FormData) -> String {
    data.iter()
        .map(|(key, value)| format!("{key} = {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Row deletion
// =============================================================================

#[test]
fn test_delete_middle_row_with_nested_group() {
    let layout = layout();
    let mut data = form(&[
        ("Title", "t"),
        ("G[0].Name", "row0"),
        ("G[1].Name", "row1"),
        ("G[1].G2[0].Value", "row1-a"),
        ("G[1].G2[1].Value", "row1-b"),
        ("G[2].Name", "row2"),
        ("Other[0].O", "untouched"),
        ("Other[2].O", "untouched too"),
    ]);
    let mut groups = init_repeating_groups(&layout, &data);
    assert_eq!(groups.count("g"), 3);
    assert_eq!(groups.count("g2-1"), 2);

    remove_group_row(&mut data, &mut groups, &layout, "g", 1).unwrap();

    insta::assert_snapshot!(render(&data), @r"
    G[0].Name = row0
    G[1].Name = row2
    Other[0].O = untouched
    Other[2].O = untouched too
    Title = t
    ");
    assert_eq!(groups.count("g"), 2);
    assert!(!groups.contains("g2-2"));
    assert_eq!(groups.count("g2-1"), 0);
    assert!(
        data.keys()
            .filter(|key| key.starts_with("G["))
            .all(|key| !key.contains("[2]"))
    );
}

#[test]
fn test_delete_row_shifts_nested_group_state() {
    let layout = layout();
    let mut data = form(&[
        ("G[0].Name", "a"),
        ("G[1].Name", "b"),
        ("G[2].G2[0].Value", "c0"),
        ("G[2].G2[1].Value", "c1"),
    ]);
    let mut groups = init_repeating_groups(&layout, &data);
    assert_eq!(groups.count("g2-2"), 2);

    remove_group_row(&mut data, &mut groups, &layout, "g", 0).unwrap();

    assert_eq!(
        data,
        form(&[
            ("G[0].Name", "b"),
            ("G[1].G2[0].Value", "c0"),
            ("G[1].G2[1].Value", "c1"),
        ])
    );
    assert_eq!(groups.count("g2-1"), 2);
    assert!(!groups.contains("g2-2"));

    let ids: Vec<String> = expand_layout(&layout, &groups)
        .into_iter()
        .map(|node| node.id)
        .collect();
    assert!(ids.contains(&"value-1-1".to_string()));
    assert!(!ids.iter().any(|id| id.starts_with("name-2")));
}

#[test]
fn test_delete_only_row() {
    let layout = layout();
    let mut data = form(&[("G[0].Name", "only"), ("G[0].G2[0].Value", "v")]);
    let mut groups = init_repeating_groups(&layout, &data);

    remove_group_row(&mut data, &mut groups, &layout, "g", 0).unwrap();

    assert!(data.is_empty());
    assert_eq!(groups.count("g"), 0);
    assert!(!groups.contains("g2-0"));
}

// =============================================================================
// Group instance resolution
// =============================================================================

#[test]
fn test_resolve_nested_group_instance() {
    let layout = layout();
    let resolved = resolve_group(&layout, "g2-1").unwrap();
    assert_eq!(resolved.component.id, "g2");
    assert_eq!(resolved.parent_rows, vec![1]);
    assert_eq!(resolved.binding, "G[1].G2");
    assert_eq!(resolved, resolve_group(&layout, "g2-1").unwrap());
    assert_ne!(resolved, resolve_group(&layout, "g2-0").unwrap());
}

#[test]
fn test_resolve_rejects_non_repeating_and_unknown() {
    let layout = layout();
    assert!(matches!(
        resolve_group(&layout, "title"),
        Err(BindingError::NotRepeating { .. })
    ));
    assert!(matches!(
        resolve_group(&layout, "missing-0"),
        Err(BindingError::UnknownGroup { .. })
    ));
}
