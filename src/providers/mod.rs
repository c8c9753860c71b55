//! Producers of hierarchy-tagged gene set collections.

pub mod gmt;
pub mod go;
pub mod kegg;
pub mod omim;

use crate::error::GenesetError;
use crate::geneset::GeneSets;

pub trait GeneSetSource {
    /// Short label used in progress messages, e.g. `kegg:9606`.
    fn name(&self) -> String;

    fn produce(&self) -> Result<GeneSets, GenesetError>;
}
