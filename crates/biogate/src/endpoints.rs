//! Registry of known upstream endpoints.

use std::collections::BTreeMap;
use std::fmt;

/// What kind of data an endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    /// Literature search and annotation.
    Literature,
    /// Clinical trial registries.
    ClinicalTrials,
    /// Gene and protein annotation.
    Genes,
    /// Variant annotation.
    Variants,
    /// Drugs and chemicals.
    Drugs,
    /// Regulatory data such as adverse events and labels.
    Regulatory,
    /// Cancer genomics portals.
    CancerGenomics,
    /// Genome browsers and reference data.
    Reference,
    /// Anything else.
    Other,
}

impl EndpointCategory {
    /// Returns a stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointCategory::Literature => "literature",
            EndpointCategory::ClinicalTrials => "clinical_trials",
            EndpointCategory::Genes => "genes",
            EndpointCategory::Variants => "variants",
            EndpointCategory::Drugs => "drugs",
            EndpointCategory::Regulatory => "regulatory",
            EndpointCategory::CancerGenomics => "cancer_genomics",
            EndpointCategory::Reference => "reference",
            EndpointCategory::Other => "other",
        }
    }
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata about one upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// Base URL.
    pub url: String,
    /// Domain key used for rate limiting and circuit breaking.
    pub domain: String,
    /// Data category.
    pub category: EndpointCategory,
    /// Short description.
    pub description: String,
    /// Published rate limit, if any.
    pub rate_limit: Option<String>,
    /// Whether an API key or login is required.
    pub authentication: Option<String>,
    /// Licensing or data-use notes.
    pub compliance_notes: Option<String>,
}

impl EndpointInfo {
    /// Creates an endpoint without optional metadata.
    pub fn new(
        url: impl Into<String>,
        domain: impl Into<String>,
        category: EndpointCategory,
        description: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            domain: domain.into(),
            category,
            description: description.into(),
            rate_limit: None,
            authentication: None,
            compliance_notes: None,
        }
    }

    /// Sets the published rate limit.
    pub fn rate_limit(mut self, limit: impl Into<String>) -> Self {
        self.rate_limit = Some(limit.into());
        self
    }

    /// Sets the authentication requirement.
    pub fn authentication(mut self, auth: impl Into<String>) -> Self {
        self.authentication = Some(auth.into());
        self
    }

    /// Sets compliance notes.
    pub fn compliance_notes(mut self, notes: impl Into<String>) -> Self {
        self.compliance_notes = Some(notes.into());
        self
    }
}

/// Table of endpoint keys to endpoint metadata.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, EndpointInfo>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in biomedical endpoints.
    pub fn builtin() -> Self {
        use EndpointCategory::*;

        let mut registry = Self::new();
        registry.register(
            "pubtator3_search",
            EndpointInfo::new(
                "https://www.ncbi.nlm.nih.gov/research/pubtator3-api/search/",
                "pubtator3",
                Literature,
                "PubTator3 entity-annotated literature search",
            )
            .rate_limit("3 requests/second")
            .compliance_notes("NCBI usage policy applies"),
        );
        registry.register(
            "pubtator3_autocomplete",
            EndpointInfo::new(
                "https://www.ncbi.nlm.nih.gov/research/pubtator3-api/entity/autocomplete/",
                "pubtator3",
                Literature,
                "PubTator3 entity autocomplete",
            )
            .rate_limit("3 requests/second"),
        );
        registry.register(
            "clinicaltrials_search",
            EndpointInfo::new(
                "https://clinicaltrials.gov/api/v2/studies",
                "clinicaltrials",
                ClinicalTrials,
                "ClinicalTrials.gov v2 study search",
            )
            .rate_limit("50 requests/minute"),
        );
        registry.register(
            "mygene_query",
            EndpointInfo::new(
                "https://mygene.info/v3/query",
                "mygene",
                Genes,
                "MyGene.info gene query",
            )
            .rate_limit("1000 requests/day without key"),
        );
        registry.register(
            "myvariant_query",
            EndpointInfo::new(
                "https://myvariant.info/v1/query",
                "myvariant",
                Variants,
                "MyVariant.info variant query",
            )
            .rate_limit("1000 requests/day without key"),
        );
        registry.register(
            "mychem_query",
            EndpointInfo::new(
                "https://mychem.info/v1/query",
                "mychem",
                Drugs,
                "MyChem.info drug and chemical query",
            ),
        );
        registry.register(
            "openfda_adverse_events",
            EndpointInfo::new(
                "https://api.fda.gov/drug/event.json",
                "openfda",
                Regulatory,
                "OpenFDA drug adverse event reports",
            )
            .rate_limit("240 requests/minute")
            .authentication("optional API key raises daily limit")
            .compliance_notes("Reports are not verified; not for clinical decisions"),
        );
        registry.register(
            "openfda_drug_labels",
            EndpointInfo::new(
                "https://api.fda.gov/drug/label.json",
                "openfda",
                Regulatory,
                "OpenFDA structured product labels",
            )
            .rate_limit("240 requests/minute")
            .authentication("optional API key raises daily limit"),
        );
        registry.register(
            "cbioportal_api",
            EndpointInfo::new(
                "https://www.cbioportal.org/api",
                "cbioportal",
                CancerGenomics,
                "cBioPortal cancer genomics REST API",
            )
            .authentication("optional bearer token"),
        );
        registry.register(
            "ensembl_rest",
            EndpointInfo::new(
                "https://rest.ensembl.org",
                "ensembl",
                Reference,
                "Ensembl REST API",
            )
            .rate_limit("15 requests/second"),
        );
        registry
    }

    /// Adds or replaces an endpoint.
    pub fn register(&mut self, key: impl Into<String>, info: EndpointInfo) -> &mut Self {
        self.endpoints.insert(key.into(), info);
        self
    }

    /// Returns the endpoint registered under `key`.
    pub fn get(&self, key: &str) -> Option<&EndpointInfo> {
        self.endpoints.get(key)
    }

    /// Returns true if `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.endpoints.contains_key(key)
    }

    /// Returns every registered key in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Returns the endpoints belonging to `category`.
    pub fn by_category(
        &self,
        category: EndpointCategory,
    ) -> impl Iterator<Item = (&str, &EndpointInfo)> {
        self.endpoints
            .iter()
            .filter(move |(_, info)| info.category == category)
            .map(|(key, info)| (key.as_str(), info))
    }

    /// Returns the number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
