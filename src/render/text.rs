use crate::entities::ontology::HierarchyEdge;
use crate::sources::ols::LabelMap;

/// One label per line; `with_iri` prefixes each with its IRI and a tab.
pub fn labels(labels: &LabelMap, with_iri: bool) -> String {
    labels
        .iter()
        .map(|(iri, label)| {
            if with_iri {
                format!("{iri}\t{label}")
            } else {
                label.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `child<TAB>parent` rows; roots have an empty parent column.
pub fn hierarchy(edges: &[HierarchyEdge]) -> String {
    edges
        .iter()
        .map(|edge| format!("{}\t{}", edge.child, edge.parent.as_deref().unwrap_or_default()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn pairs(rows: &[(String, String)]) -> String {
    rows.iter()
        .map(|(left, right)| format!("{left}\t{right}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn lines(values: &[String]) -> String {
    values.join("\n")
}
