//! The registry of species this portal supports.
//!
//! Gene documents and homology groups coming back from the remote
//! gene-information service cover many more organisms than the portal
//! renders; everything downstream (homology trimming, interval search
//! species qualifiers, dataset species facets) filters against this table.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One supported species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Species {
    /// Canonical lowercase name used in URLs and filters.
    pub name: &'static str,
    /// NCBI taxonomy id.
    pub taxid: u32,
    /// Two-letter gene-symbol prefix.
    pub prefix: &'static str,
    /// Genome assembly used for interval queries (empty when unavailable).
    pub assembly: &'static str,
    /// Full genus/species name.
    pub genus: &'static str,
    /// A well-known gene id used for sample links in the UI.
    pub sample_gene: u32,
}

/// All species supported by the portal, in display order.
pub const SPECIES: &[Species] = &[
    Species {
        name: "human",
        taxid: 9606,
        prefix: "Hs",
        assembly: "hg19",
        genus: "Homo sapiens",
        sample_gene: 1017, // CDK2
    },
    Species {
        name: "mouse",
        taxid: 10090,
        prefix: "Mm",
        assembly: "mm9",
        genus: "Mus musculus",
        sample_gene: 12566,
    },
    Species {
        name: "rat",
        taxid: 10116,
        prefix: "Rn",
        assembly: "rn4",
        genus: "Rattus norvegicus",
        sample_gene: 362817,
    },
    Species {
        name: "fruitfly",
        taxid: 7227,
        prefix: "Dm",
        assembly: "dm3",
        genus: "Drosophila melanogaster",
        sample_gene: 42453,
    },
    Species {
        name: "nematode",
        taxid: 6239,
        prefix: "Ce",
        assembly: "ce7",
        genus: "Caenorhabditis elegans",
        sample_gene: 172677,
    },
    Species {
        name: "zebrafish",
        taxid: 7955,
        prefix: "Dr",
        assembly: "danRer6",
        genus: "Danio rerio",
        sample_gene: 406715,
    },
    Species {
        name: "thale-cress",
        taxid: 3702,
        prefix: "At",
        assembly: "", // no genomic data for arabidopsis right now
        genus: "Arabidopsis thaliana",
        sample_gene: 837405,
    },
    Species {
        name: "frog",
        taxid: 8364,
        prefix: "Xt",
        assembly: "xenTro2",
        genus: "Xenopus tropicalis",
        sample_gene: 493498,
    },
    Species {
        name: "pig",
        taxid: 9823,
        prefix: "Ss",
        assembly: "susScr2",
        genus: "Sus scrofa",
        sample_gene: 397593, // AMBP
    },
];

/// Species subset carried by the dataset service.
pub const DATASET_SPECIES: &[&str] = &["human", "mouse", "rat", "pig"];

static BY_NAME: Lazy<HashMap<&'static str, &'static Species>> =
    Lazy::new(|| SPECIES.iter().map(|s| (s.name, s)).collect());

static BY_TAXID: Lazy<HashMap<u32, &'static Species>> =
    Lazy::new(|| SPECIES.iter().map(|s| (s.taxid, s)).collect());

impl Species {
    /// Look up a species by its canonical name.
    pub fn by_name(name: &str) -> Option<&'static Species> {
        BY_NAME.get(name).copied()
    }

    /// Look up a species by NCBI taxonomy id.
    pub fn by_taxid(taxid: u32) -> Option<&'static Species> {
        BY_TAXID.get(&taxid).copied()
    }

    /// All supported taxonomy ids, in registry order.
    pub fn all_taxids() -> Vec<u32> {
        SPECIES.iter().map(|s| s.taxid).collect()
    }

    /// Comma-joined taxid list for remote-service `species` parameters.
    pub fn default_species_param() -> String {
        SPECIES
            .iter()
            .map(|s| s.taxid.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parse a genome position that may carry thousands separators.
///
/// ```
/// use genehub_core::species::safe_genome_pos;
/// assert_eq!(safe_genome_pos("1000").unwrap(), 1000);
/// assert_eq!(safe_genome_pos("55,000,000").unwrap(), 55_000_000);
/// ```
pub fn safe_genome_pos(s: &str) -> crate::Result<u64> {
    let cleaned: String = s.chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<u64>()
        .map_err(|_| crate::Error::InvalidInput(format!("invalid genome position: {s:?}")))
}
