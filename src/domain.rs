use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GenesetError;

/// Remote domain holding every gene set collection and the catalog.
pub const SERVER_DOMAIN: &str = "gene_sets";

const FILE_PREFIX: &str = "gs_";
const FILE_SEPARATOR: &str = "_._";
const FILE_EXTENSION: &str = ".json.gz";

/// Ordered category labels locating a collection, e.g. `GO/biological_process`.
///
/// Components never contain `_.` or `._`, which keeps the storage filename
/// encoding unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Hierarchy(Vec<String>);

impl Hierarchy {
    pub fn new<I, S>(components: I) -> Result<Self, GenesetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let components = components
            .into_iter()
            .map(Into::into)
            .collect::<Vec<String>>();
        for component in &components {
            let is_valid = !component.is_empty()
                && !component.contains(FILE_SEPARATOR)
                && !component.contains("_.")
                && !component.contains("._")
                && !component.contains(['/', '\\', '@', '\n', '\t']);
            if !is_valid {
                return Err(GenesetError::InvalidHierarchy(components.join("/")));
            }
        }
        Ok(Self(components))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The first `len` components (all of them when shorter).
    pub fn truncated(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    pub fn starts_with(&self, prefix: &Hierarchy) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl FromStr for Hierarchy {
    type Err = GenesetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }
        Self::new(trimmed.split('/').map(str::trim))
    }
}

impl TryFrom<Vec<String>> for Hierarchy {
    type Error = GenesetError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Hierarchy> for Vec<String> {
    fn from(value: Hierarchy) -> Self {
        value.0
    }
}

/// NCBI taxonomy identifier, e.g. `9606`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaxId(String);

impl TaxId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaxId {
    type Err = GenesetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_string();
        let is_valid = !normalized.is_empty() && normalized.chars().all(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(GenesetError::InvalidTaxId(value.to_string()));
        }
        Ok(Self(normalized))
    }
}

impl TryFrom<String> for TaxId {
    type Error = GenesetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaxId> for String {
    fn from(value: TaxId) -> Self {
        value.0
    }
}

/// Identity of a persisted collection: `(hierarchy, organism)`.
///
/// The textual form is `h1/h2@taxid`, with `@taxid` omitted for
/// organism-agnostic collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionKey {
    pub hierarchy: Hierarchy,
    pub organism: Option<TaxId>,
}

impl CollectionKey {
    pub fn new(hierarchy: Hierarchy, organism: Option<TaxId>) -> Self {
        Self {
            hierarchy,
            organism,
        }
    }

    pub fn filename(&self) -> String {
        let mut parts = self
            .hierarchy
            .components()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        parts.push(self.organism.as_ref().map(TaxId::as_str).unwrap_or(""));
        format!("{FILE_PREFIX}{}{FILE_EXTENSION}", parts.join(FILE_SEPARATOR))
    }

    /// Inverse of [`CollectionKey::filename`]; `None` for anything that is not a
    /// gene set record.
    pub fn parse_filename(filename: &str) -> Option<Self> {
        let body = filename
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?;
        let mut parts = body.split(FILE_SEPARATOR).collect::<Vec<_>>();
        let organism = parts.pop()?;
        let organism = if organism.is_empty() {
            None
        } else {
            Some(organism.parse().ok()?)
        };
        let hierarchy = Hierarchy::new(parts).ok()?;
        Some(Self {
            hierarchy,
            organism,
        })
    }
}

pub fn is_genesets_file(filename: &str) -> bool {
    filename.starts_with(FILE_PREFIX) && filename.ends_with(FILE_EXTENSION)
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.organism {
            Some(organism) => write!(f, "{}@{}", self.hierarchy, organism),
            None => write!(f, "{}", self.hierarchy),
        }
    }
}

impl FromStr for CollectionKey {
    type Err = GenesetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (hierarchy, organism) = match trimmed.rsplit_once('@') {
            Some((hierarchy, organism)) => (hierarchy, Some(organism.parse::<TaxId>()?)),
            None => (trimmed, None),
        };
        let hierarchy = hierarchy
            .parse::<Hierarchy>()
            .map_err(|_| GenesetError::InvalidCollection(value.to_string()))?;
        Ok(Self {
            hierarchy,
            organism,
        })
    }
}
