//! Products monitored when the configuration does not list its own.

use chrono::TimeDelta;
use slamon_model::{Cadence, ModelError, Product};
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "slamon.toml";

/// Name given to a node entry that does not set one.
pub const DEFAULT_NODE_NAME: &str = "node";

const MEPS_CATALOG: &str =
    "https://thredds.met.no/thredds/catalog/mepslatest/catalog.xml";
const METPP_CATALOG: &str =
    "https://thredds.met.no/thredds/catalog/metpplatest/catalog.xml";
const AROME_ARCTIC_CATALOG: &str =
    "https://thredds.met.no/thredds/catalog/aromearcticlatest/catalog.xml";

struct BuiltinProduct {
    name: &'static str,
    component_id: &'static str,
    cadence_step: u32,
    expected_latency: TimeDelta,
    catalog_url: &'static str,
    filename_pattern: &'static str,
}

fn table() -> [BuiltinProduct; 5] {
    [
        BuiltinProduct {
            name: "MEPS deterministic",
            component_id: "bcsflmrp5rgk",
            cadence_step: 3,
            expected_latency: TimeDelta::hours(3),
            catalog_url: MEPS_CATALOG,
            filename_pattern: "meps_det_2_5km_%Y%m%dT%HZ.ncml",
        },
        BuiltinProduct {
            name: "MEPS deterministic post processed",
            component_id: "hdt6qj6f7zv5",
            cadence_step: 1,
            expected_latency: TimeDelta::minutes(45),
            catalog_url: METPP_CATALOG,
            filename_pattern: "met_forecast_1_0km_nordic_%Y%m%dT%HZ.nc",
        },
        BuiltinProduct {
            name: "MEPS ensemble",
            component_id: "6bb2dq9t7vx9",
            cadence_step: 3,
            expected_latency: TimeDelta::hours(5) + TimeDelta::minutes(10),
            catalog_url: MEPS_CATALOG,
            filename_pattern: "meps_lagged_6_h_subset_2_5km_%Y%m%dT%HZ.ncml",
        },
        BuiltinProduct {
            name: "Arome Arctic deterministic",
            component_id: "5w7hh6w1f3fr",
            cadence_step: 6,
            expected_latency: TimeDelta::hours(3) + TimeDelta::minutes(30),
            catalog_url: AROME_ARCTIC_CATALOG,
            filename_pattern: "arome_arctic_extracted_2_5km_%Y%m%dT%HZ.nc",
        },
        BuiltinProduct {
            name: "Arome Arctic deterministic post processed",
            component_id: "n1wsnn6gr8p9",
            cadence_step: 6,
            expected_latency: TimeDelta::hours(3) + TimeDelta::minutes(30),
            catalog_url: AROME_ARCTIC_CATALOG,
            filename_pattern: "arome_arctic_pp_2_5km_%Y%m%dT%HZ.nc",
        },
    ]
}

/// The MET Norway products on thredds.met.no with their statuspage.io
/// components.
pub fn builtin_products() -> Result<Vec<Product>, ModelError> {
    table()
        .into_iter()
        .map(|entry| {
            let catalog_url = Url::parse(entry.catalog_url).map_err(|err| {
                ModelError::invalid_input(format!(
                    "catalog url of {}: {err}",
                    entry.name
                ))
            })?;
            Product::builder(entry.name, entry.component_id)
                .cadence(Cadence::every(entry.cadence_step)?)
                .expected_latency(entry.expected_latency)
                .catalog_url(catalog_url)
                .filename_pattern(entry.filename_pattern)
                .build()
        })
        .collect()
}
