use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Hierarchy, TaxId};
use crate::error::AggregateError;

/// A named, provenance-tagged collection of gene symbols.
///
/// Equality (and hashing) covers every field, not only the identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GeneSet {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genes: BTreeSet<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub organism: Option<TaxId>,
    #[serde(default)]
    pub hierarchy: Hierarchy,
}

impl GeneSet {
    pub fn new<I, S>(id: impl Into<String>, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            name: None,
            description: None,
            genes: genes.into_iter().map(Into::into).collect(),
            link: None,
            organism: None,
            hierarchy: Hierarchy::empty(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_organism(mut self, organism: Option<TaxId>) -> Self {
        self.organism = organism;
        self
    }

    pub fn with_hierarchy(mut self, hierarchy: Hierarchy) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    pub fn size(&self) -> usize {
        self.genes.len()
    }

    /// Display label: `[ h1, h2 ] id name`, with the hierarchy and name parts optional.
    pub fn cname(&self, source: bool, name: bool) -> String {
        let mut label = self.id.clone();
        if source && !self.hierarchy.is_empty() {
            label = format!("[ {} ] {label}", self.hierarchy.components().join(", "));
        }
        if name {
            if let Some(value) = self.name.as_deref().filter(|value| !value.is_empty()) {
                label.push(' ');
                label.push_str(value);
            }
        }
        label
    }

    /// Legacy `(label, genes)` pair.
    pub fn to_odict(&self, source: bool, name: bool) -> (String, BTreeSet<String>) {
        (self.cname(source, name), self.genes.clone())
    }
}

/// Input accepted when building a [`GeneSets`].
#[derive(Debug, Clone)]
pub enum GeneSetsInput {
    /// Legacy `id -> genes` mapping; only id and genes are populated.
    Legacy(BTreeMap<String, Vec<String>>),
    Records(Vec<GeneSet>),
}

/// A set of [`GeneSet`] values with aggregate queries over the members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneSets(BTreeSet<GeneSet>);

impl GeneSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_input(input: GeneSetsInput) -> Self {
        match input {
            GeneSetsInput::Legacy(mapping) => mapping
                .into_iter()
                .map(|(id, genes)| GeneSet::new(id, genes))
                .collect(),
            GeneSetsInput::Records(records) => records.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneSet> {
        self.0.iter()
    }

    pub fn contains(&self, geneset: &GeneSet) -> bool {
        self.0.contains(geneset)
    }

    pub fn insert(&mut self, geneset: GeneSet) -> bool {
        self.0.insert(geneset)
    }

    /// Set union; members already present are kept as they are.
    pub fn update(&mut self, other: GeneSets) {
        self.0.extend(other.0);
    }

    pub fn set_hierarchy(&mut self, hierarchy: &Hierarchy) {
        let members = std::mem::take(&mut self.0);
        self.0 = members
            .into_iter()
            .map(|geneset| geneset.with_hierarchy(hierarchy.clone()))
            .collect();
    }

    /// Gene sets in the legacy `label -> genes` form. Metadata other than the
    /// label and genes is dropped.
    pub fn to_odict(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.0
            .iter()
            .map(|geneset| geneset.to_odict(true, true))
            .collect()
    }

    pub fn common_org(&self) -> Result<Option<TaxId>, AggregateError> {
        if self.is_empty() {
            return Err(AggregateError::Empty);
        }
        let organisms = self
            .0
            .iter()
            .map(|geneset| geneset.organism.clone())
            .collect::<BTreeSet<_>>();
        only_option(organisms).map_err(|organisms| {
            AggregateError::MultipleOrganisms(
                organisms
                    .into_iter()
                    .map(|organism| organism.map(String::from).unwrap_or_else(|| "None".to_string()))
                    .collect(),
            )
        })
    }

    pub fn hierarchies(&self) -> Result<BTreeSet<Hierarchy>, AggregateError> {
        if self.is_empty() {
            return Err(AggregateError::Empty);
        }
        Ok(self
            .0
            .iter()
            .map(|geneset| geneset.hierarchy.clone())
            .collect())
    }

    /// Longest prefix on which every member's hierarchy agrees.
    pub fn common_hierarchy(&self) -> Result<Hierarchy, AggregateError> {
        let hierarchies = self.hierarchies()?;
        let mut current = hierarchies.iter().map(Hierarchy::len).max().unwrap_or(0);
        let truncate = |len: usize| {
            hierarchies
                .iter()
                .map(|hierarchy| hierarchy.truncated(len))
                .collect::<BTreeSet<_>>()
        };
        let mut prefixes = truncate(current);
        while prefixes.len() > 1 {
            current -= 1;
            prefixes = truncate(current);
        }
        match only_option(prefixes) {
            Ok(common) if !common.is_empty() => Ok(common),
            _ => Err(AggregateError::NoCommonHierarchy(
                hierarchies.iter().map(ToString::to_string).collect(),
            )),
        }
    }

    /// One collection per exact hierarchy value.
    pub fn split_by_hierarchy(&self) -> Vec<GeneSets> {
        let mut groups = BTreeMap::<Hierarchy, GeneSets>::new();
        for geneset in &self.0 {
            groups
                .entry(geneset.hierarchy.clone())
                .or_default()
                .insert(geneset.clone());
        }
        groups.into_values().collect()
    }
}

impl FromIterator<GeneSet> for GeneSets {
    fn from_iter<T: IntoIterator<Item = GeneSet>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<GeneSet> for GeneSets {
    fn extend<T: IntoIterator<Item = GeneSet>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl IntoIterator for GeneSets {
    type Item = GeneSet;
    type IntoIter = std::collections::btree_set::IntoIter<GeneSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a GeneSets {
    type Item = &'a GeneSet;
    type IntoIter = std::collections::btree_set::Iter<'a, GeneSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn only_option<T: Ord>(values: BTreeSet<T>) -> Result<T, BTreeSet<T>> {
    if values.len() != 1 {
        return Err(values);
    }
    values.into_iter().next().ok_or_else(BTreeSet::new)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn kegg(id: &str, hierarchy: &[&str]) -> GeneSet {
        GeneSet::new(id, ["TP53", "EGFR"])
            .with_organism(Some("9606".parse().unwrap()))
            .with_hierarchy(Hierarchy::new(hierarchy.iter().copied()).unwrap())
    }

    #[test]
    fn cname_formats_hierarchy_and_name() {
        let gs = kegg("hsa00010", &["KEGG", "metabolism"]).with_name("Glycolysis");
        assert_eq!(gs.cname(true, true), "[ KEGG, metabolism ] hsa00010 Glycolysis");
        assert_eq!(gs.cname(false, true), "hsa00010 Glycolysis");
        assert_eq!(gs.cname(true, false), "[ KEGG, metabolism ] hsa00010");
        assert_eq!(GeneSet::new("x", ["A"]).cname(true, true), "x");
    }

    #[test]
    fn common_hierarchy_takes_shared_prefix() {
        let sets: GeneSets = [kegg("a", &["KEGG"]), kegg("b", &["KEGG", "extra"])]
            .into_iter()
            .collect();
        assert_eq!(sets.common_hierarchy().unwrap(), Hierarchy::new(["KEGG"]).unwrap());
    }

    #[test]
    fn common_hierarchy_rejects_divergent_roots() {
        let sets: GeneSets = [kegg("a", &["KEGG"]), kegg("b", &["GO", "biological_process"])]
            .into_iter()
            .collect();
        assert_matches!(
            sets.common_hierarchy(),
            Err(AggregateError::NoCommonHierarchy(_))
        );
        assert_matches!(GeneSets::new().common_hierarchy(), Err(AggregateError::Empty));
    }

    #[test]
    fn common_org_requires_single_value() {
        let human: GeneSets = [kegg("a", &["KEGG"]), kegg("b", &["KEGG"])].into_iter().collect();
        assert_eq!(human.common_org().unwrap().unwrap().as_str(), "9606");

        let mut mixed = human.clone();
        mixed.insert(kegg("c", &["KEGG"]).with_organism(Some("10090".parse().unwrap())));
        assert_matches!(mixed.common_org(), Err(AggregateError::MultipleOrganisms(_)));
        assert_matches!(GeneSets::new().common_org(), Err(AggregateError::Empty));
    }

    #[test]
    fn set_hierarchy_rewrites_members() {
        let mut sets: GeneSets = [kegg("a", &["KEGG"]), kegg("b", &["GO"])].into_iter().collect();
        let target = Hierarchy::new(["custom"]).unwrap();
        sets.set_hierarchy(&target);
        assert_eq!(sets.hierarchies().unwrap().into_iter().collect::<Vec<_>>(), vec![target]);
    }
}
