//! THREDDS catalogs as the source of published model runs.
//!
//! A node's catalog document lists one dataset per model run. The newest
//! dataset name matching a product's filename pattern is what that node
//! has published.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use slamon_model::{Node, Product};
use tracing::debug;
use url::Url;

use super::filename_pattern::FilenamePattern;
use crate::ports::{CatalogError, CatalogSource, NodeFetch};

pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);

static CATALOG_ROOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?catalog[\s>/]")
        .expect("catalog root regex should compile")
});

static DATASET_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<(?:[A-Za-z_][\w.-]*:)?dataset\s[^>]*?\bname\s*=\s*(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("dataset name regex should compile")
});

/// Names of all datasets listed in a THREDDS catalog document, with the
/// predefined XML entities decoded.
pub fn dataset_names(document: &str) -> impl Iterator<Item = Cow<'_, str>> {
    DATASET_NAME.captures_iter(document).filter_map(|captures| {
        captures
            .get(1)
            .or_else(|| captures.get(2))
            .map(|name| unescape(name.as_str()))
    })
}

fn unescape(value: &str) -> Cow<'_, str> {
    if !value.contains('&') {
        return Cow::Borrowed(value);
    }
    // `&amp;` last so `&amp;lt;` stays `&lt;`.
    Cow::Owned(
        value
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    )
}

/// `url` with scheme, host and port taken from `base`, if any.
pub fn rebase(url: &Url, base: Option<&Url>) -> Url {
    let Some(base) = base else {
        return url.clone();
    };
    let mut rebased = base.clone();
    rebased.set_path(url.path());
    rebased.set_query(url.query());
    rebased
}

/// Reads the latest model runs from THREDDS catalog documents over HTTP.
#[derive(Clone)]
pub struct ThreddsCatalog {
    http: reqwest::Client,
}

impl fmt::Debug for ThreddsCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreddsCatalog").finish_non_exhaustive()
    }
}

impl ThreddsCatalog {
    pub fn new() -> Result<Self, CatalogError> {
        Self::with_timeout(CATALOG_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CatalogError::Client)?;
        Ok(Self { http })
    }

    async fn download(&self, node: &Node, url: &Url) -> Result<String, CatalogError> {
        let mut request = self.http.get(url.clone());
        if let Some(key) = &node.api_key {
            request = request.bearer_auth(key);
        }

        let response =
            request
                .send()
                .await
                .map_err(|source| CatalogError::Transport {
                    url: url.to_string(),
                    source,
                })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let document =
            response
                .text()
                .await
                .map_err(|source| CatalogError::Transport {
                    url: url.to_string(),
                    source,
                })?;
        debug!("Fetched {} from {}", url, node.name);
        Ok(document)
    }
}

/// Latest run per product found in one catalog document.
pub fn scan_catalog(
    url: &Url,
    document: &str,
    products: &[&Product],
    fetch: &mut NodeFetch,
) {
    if !CATALOG_ROOT.is_match(document) {
        let error = Arc::new(CatalogError::Malformed {
            url: url.to_string(),
            reason: "no catalog element".to_string(),
        });
        for product in products {
            fetch.insert(product.name().to_string(), Err(Arc::clone(&error)));
        }
        return;
    }

    let names: Vec<Cow<'_, str>> = dataset_names(document).collect();
    for product in products {
        let outcome = FilenamePattern::compile(product.filename_pattern())
            .map(|pattern| pattern.latest(names.iter().map(|name| name.as_ref())))
            .map_err(Arc::new);
        fetch.insert(product.name().to_string(), outcome);
    }
}

#[async_trait]
impl CatalogSource for ThreddsCatalog {
    async fn fetch(&self, node: &Node, products: &[Product]) -> NodeFetch {
        let mut by_url: BTreeMap<Url, Vec<&Product>> = BTreeMap::new();
        for product in products {
            by_url
                .entry(rebase(product.catalog_url(), node.base_url.as_ref()))
                .or_default()
                .push(product);
        }

        let mut fetch = NodeFetch::new();
        for (url, sharing) in by_url {
            match self.download(node, &url).await {
                Ok(document) => scan_catalog(&url, &document, &sharing, &mut fetch),
                Err(err) => {
                    let error = Arc::new(err);
                    for product in sharing {
                        fetch.insert(product.name().to_string(), Err(Arc::clone(&error)));
                    }
                }
            }
        }
        fetch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::utc;
    use chrono::TimeDelta;
    use slamon_model::{Cadence, Publication};

    const CATALOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<catalog xmlns="http://www.unidata.ucar.edu/namespaces/thredds/InvCatalog/v1.0" version="1.0.1">
  <service name="all" serviceType="Compound" base="">
    <service name="odap" serviceType="OpenDAP" base="/thredds/dodsC/" />
  </service>
  <dataset name="mepslatest" ID="mepslatest">
    <metadata inherited="true">
      <serviceName>all</serviceName>
    </metadata>
    <dataset name="meps_det_2_5km_20240301T06Z.ncml" ID="mepslatest/meps_det_2_5km_20240301T06Z.ncml" urlPath="mepslatest/meps_det_2_5km_20240301T06Z.ncml">
      <dataSize units="Kbytes">42</dataSize>
    </dataset>
    <dataset name="meps_det_2_5km_20240301T09Z.ncml" ID="mepslatest/meps_det_2_5km_20240301T09Z.ncml" />
    <dataset ID="mepslatest/meps_lagged_6_h_subset_2_5km_20240301T03Z.ncml" name='meps_lagged_6_h_subset_2_5km_20240301T03Z.ncml' />
    <dataset name="meps_det_2_5km_20240229T21Z.ncml" />
  </dataset>
</catalog>
"#;

    fn product(name: &str, pattern: &str) -> Product {
        Product::builder(name, "component")
            .cadence(Cadence::every(3).unwrap())
            .expected_latency(TimeDelta::hours(3))
            .catalog_url(
                Url::parse("https://thredds.met.no/thredds/catalog/mepslatest/catalog.xml")
                    .unwrap(),
            )
            .filename_pattern(pattern)
            .build()
            .unwrap()
    }

    #[test]
    fn lists_every_named_dataset() {
        let names: Vec<_> = dataset_names(CATALOG).collect();
        assert_eq!(
            names,
            vec![
                "mepslatest",
                "meps_det_2_5km_20240301T06Z.ncml",
                "meps_det_2_5km_20240301T09Z.ncml",
                "meps_lagged_6_h_subset_2_5km_20240301T03Z.ncml",
                "meps_det_2_5km_20240229T21Z.ncml",
            ]
        );
    }

    #[test]
    fn entities_in_dataset_names_are_decoded() {
        let document = r#"<catalog>
  <dataset name="a&amp;b_&lt;1&gt;" />
  <dataset name='it&apos;s &quot;x&quot;' />
  <dataset name="literal&amp;lt;" />
</catalog>"#;
        let names: Vec<_> = dataset_names(document).collect();
        assert_eq!(names, vec!["a&b_<1>", "it's \"x\"", "literal&lt;"]);
        assert!(matches!(names[0], Cow::Owned(_)));
        assert!(matches!(unescape("plain.nc"), Cow::Borrowed("plain.nc")));
    }

    #[test]
    fn products_sharing_a_catalog_each_get_their_latest_run() {
        let deterministic = product("MEPS deterministic", "meps_det_2_5km_%Y%m%dT%HZ.ncml");
        let ensemble = product(
            "MEPS ensemble",
            "meps_lagged_6_h_subset_2_5km_%Y%m%dT%HZ.ncml",
        );
        let missing = product("Arome Arctic", "arome_arctic_pp_2_5km_%Y%m%dT%HZ.nc");
        let url = deterministic.catalog_url().clone();

        let mut fetch = NodeFetch::new();
        scan_catalog(&url, CATALOG, &[&deterministic, &ensemble, &missing], &mut fetch);

        assert_eq!(
            *fetch["MEPS deterministic"].as_ref().unwrap(),
            Some(Publication::new(utc(2024, 3, 1, 9, 0)))
        );
        assert_eq!(
            *fetch["MEPS ensemble"].as_ref().unwrap(),
            Some(Publication::new(utc(2024, 3, 1, 3, 0)))
        );
        assert_eq!(*fetch["Arome Arctic"].as_ref().unwrap(), None);
    }

    #[test]
    fn non_catalog_documents_are_malformed() {
        let deterministic = product("MEPS deterministic", "meps_det_2_5km_%Y%m%dT%HZ.ncml");
        let url = deterministic.catalog_url().clone();
        let mut fetch = NodeFetch::new();
        scan_catalog(&url, "<html>maintenance</html>", &[&deterministic], &mut fetch);
        assert!(matches!(
            fetch["MEPS deterministic"].as_ref().unwrap_err().as_ref(),
            CatalogError::Malformed { .. }
        ));
    }

    #[test]
    fn bad_pattern_only_fails_its_own_product() {
        let good = product("good", "meps_det_2_5km_%Y%m%dT%HZ.ncml");
        let bad = product("bad", "meps_det_%Q.ncml");
        let url = good.catalog_url().clone();
        let mut fetch = NodeFetch::new();
        scan_catalog(&url, CATALOG, &[&good, &bad], &mut fetch);
        assert!(fetch["good"].is_ok());
        assert!(matches!(
            fetch["bad"].as_ref().unwrap_err().as_ref(),
            CatalogError::Pattern { .. }
        ));
    }

    #[test]
    fn base_url_replaces_the_origin() {
        let url =
            Url::parse("https://thredds.met.no/thredds/catalog/mepslatest/catalog.xml?x=1")
                .unwrap();
        assert_eq!(rebase(&url, None), url);

        let base = Url::parse("http://thredds-b.internal:8080/").unwrap();
        assert_eq!(
            rebase(&url, Some(&base)).as_str(),
            "http://thredds-b.internal:8080/thredds/catalog/mepslatest/catalog.xml?x=1"
        );
    }
}
