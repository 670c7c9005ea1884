//! Property tests for path-trie template resolution.

use proptest::prelude::*;
use specsift::trie::PathTrie;

const SEGMENTS: &[&str] = &["users", "items", "orders", "v1", "detail"];

/// A template segment: `Some(i)` is the literal `SEGMENTS[i]`, `None` is a
/// `{param}` wildcard.
type Template = Vec<Option<usize>>;

fn template_strategy() -> impl Strategy<Value = Template> {
    prop::collection::vec(
        prop_oneof![Just(None), (0..SEGMENTS.len()).prop_map(Some)],
        1..4,
    )
}

fn render_template(template: &Template) -> String {
    template
        .iter()
        .enumerate()
        .map(|(position, segment)| match segment {
            Some(index) => format!("/{}", SEGMENTS[*index]),
            None => format!("/{{p{}}}", position),
        })
        .collect()
}

fn render_path(path: &[usize]) -> String {
    path.iter().map(|index| format!("/{}", SEGMENTS[*index])).collect()
}

fn template_matches(template: &Template, path: &[usize]) -> bool {
    template.len() == path.len()
        && template
            .iter()
            .zip(path)
            .all(|(segment, concrete)| segment.map_or(true, |index| index == *concrete))
}

fn param_count(template: &Template) -> usize {
    template.iter().filter(|segment| segment.is_none()).count()
}

proptest! {
    /// For any set of inserted templates, lookup of a concrete path returns
    /// a matching template with the fewest parameter segments — and an
    /// exact literal match always outranks any parameterized match.
    #[test]
    fn lookup_returns_most_specific_template(
        templates in prop::collection::vec(template_strategy(), 1..8),
        path in prop::collection::vec(0..SEGMENTS.len(), 1..4),
    ) {
        let mut trie = PathTrie::new();
        for template in &templates {
            let rendered = render_template(template);
            trie.insert(&rendered, rendered.clone());
        }

        let result = trie.get_value(&render_path(&path)).cloned();
        let matching: Vec<&Template> =
            templates.iter().filter(|template| template_matches(template, &path)).collect();

        match result {
            None => prop_assert!(matching.is_empty()),
            Some(found) => {
                let found_template = templates
                    .iter()
                    .find(|template| render_template(template) == found)
                    .expect("returned value corresponds to an inserted template");
                prop_assert!(template_matches(found_template, &path));

                let min_params =
                    matching.iter().map(|template| param_count(template)).min().unwrap();
                prop_assert_eq!(param_count(found_template), min_params);

                if matching.iter().any(|template| param_count(template) == 0) {
                    prop_assert_eq!(param_count(found_template), 0);
                }
            }
        }
    }

    /// Inserting the same template twice never creates a new node the
    /// second time.
    #[test]
    fn reinsertion_never_creates_nodes(template in template_strategy()) {
        let mut trie = PathTrie::new();
        let rendered = render_template(&template);
        prop_assert!(trie.insert(&rendered, 1u32));
        prop_assert!(!trie.insert(&rendered, 2u32));
        prop_assert_eq!(trie.get_value(&rendered).copied(), Some(2u32));
    }
}

/// The documented resolution example: the template with the fewest
/// parameter segments wins, and exact matches win outright.
#[test]
fn documented_specificity_example() {
    let mut trie = PathTrie::new();
    trie.insert("/api/{p1}/items", "A");
    trie.insert("/api/items", "B");
    trie.insert("/api/{p1}/{p2}", "C");

    assert_eq!(trie.get_value("/api/1/items"), Some(&"A"));
    assert_eq!(trie.get_value("/api/items"), Some(&"B"));
    assert_eq!(trie.get_value("/api/1/2"), Some(&"C"));
}
