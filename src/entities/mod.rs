//! Ontology-level workflows used by the CLI and the crate-root shortcuts.

pub(crate) mod ontology;
