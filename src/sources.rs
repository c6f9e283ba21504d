//! Source registry: the institution and bursary websites the scraper targets.
//!
//! The built-in registry covers the main South African universities, TVET
//! colleges and bursary providers. Operators can replace it with a YAML file:
//!
//! ```yaml
//! sources:
//!   - name: University of Cape Town
//!     url: https://www.uct.ac.za
//!     type: university
//!     admissionsUrl: https://www.uct.ac.za/apply
//!     active: true
//! ```

use crate::models::{Source, SourceType};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument, warn};

/// On-disk shape of a registry file.
#[derive(Debug, Deserialize, Serialize)]
pub struct SourceRegistry {
    pub sources: Vec<Source>,
}

impl SourceRegistry {
    /// Sources that take part in a scrape run, in registry order.
    pub fn active(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter().filter(|s| s.active)
    }
}

fn src(
    name: &str,
    url: &str,
    source_type: SourceType,
    page: Option<&str>,
    active: bool,
) -> Source {
    let page = page.map(str::to_string);
    let (admissions_url, application_url) = match source_type.class() {
        crate::models::SourceClass::Institution => (page, None),
        crate::models::SourceClass::Bursary => (None, page),
    };
    Source {
        name: name.to_string(),
        url: url.to_string(),
        source_type,
        admissions_url,
        application_url,
        active,
        location: None,
    }
}

/// The registry compiled into the binary.
pub fn builtin() -> SourceRegistry {
    use SourceType::*;
    SourceRegistry {
        sources: vec![
            src(
                "University of Cape Town",
                "https://www.uct.ac.za",
                University,
                Some("https://www.uct.ac.za/apply"),
                true,
            ),
            src(
                "University of the Witwatersrand",
                "https://www.wits.ac.za",
                University,
                Some("https://www.wits.ac.za/applications/"),
                true,
            ),
            src(
                "University of Pretoria",
                "https://www.up.ac.za",
                University,
                Some("https://www.up.ac.za/online-application"),
                true,
            ),
            src(
                "Stellenbosch University",
                "https://www.sun.ac.za",
                University,
                Some("https://www.sun.ac.za/english/maties/apply"),
                true,
            ),
            src(
                "University of Johannesburg",
                "https://www.uj.ac.za",
                University,
                Some("https://www.uj.ac.za/admission-aid/undergraduate/"),
                true,
            ),
            src(
                "Cape Peninsula University of Technology",
                "https://www.cput.ac.za",
                University,
                Some("https://www.cput.ac.za/study/apply"),
                true,
            ),
            src(
                "False Bay TVET College",
                "https://www.falsebaycollege.co.za",
                Tvet,
                None,
                true,
            ),
            src(
                "Boston City Campus",
                "https://www.boston.co.za",
                College,
                None,
                true,
            ),
            src(
                "NSFAS",
                "https://www.nsfas.org.za",
                Government,
                Some("https://my.nsfas.org.za"),
                true,
            ),
            src(
                "Funza Lushaka Bursary",
                "https://www.funzalushaka.doe.gov.za",
                Government,
                None,
                true,
            ),
            src(
                "Sasol Bursaries",
                "https://www.sasol.com",
                Private,
                Some("https://www.sasol.com/careers/bursaries"),
                true,
            ),
            src(
                "Allan Gray Orbis Foundation",
                "https://www.allangrayorbis.org",
                Private,
                None,
                false,
            ),
        ],
    }
}

/// Load a registry from a YAML file.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load(path: impl AsRef<Path>) -> Result<SourceRegistry, Box<dyn Error>> {
    let content = fs::read_to_string(path.as_ref()).await?;
    let registry: SourceRegistry = serde_yaml::from_str(&content)?;
    if registry.sources.is_empty() {
        warn!("Source registry is empty; scrape runs will produce nothing");
    }
    info!(
        total = registry.sources.len(),
        active = registry.active().count(),
        "Loaded source registry"
    );
    Ok(registry)
}

/// Load the registry from `path` when given, otherwise use [`builtin`].
pub async fn load_or_builtin(path: Option<&str>) -> Result<SourceRegistry, Box<dyn Error>> {
    match path {
        Some(p) => load(p).await,
        None => {
            let registry = builtin();
            info!(
                total = registry.sources.len(),
                active = registry.active().count(),
                "Using built-in source registry"
            );
            Ok(registry)
        }
    }
}
