//! Multi-node consensus on the newest publication visible everywhere.
//!
//! Visitors may be routed to any node, so only the laggard's view is safe to
//! advertise. A node without an observation makes the product-wide answer
//! unknown.

use std::collections::BTreeMap;

use slamon_model::Publication;

/// Minimum of all observations, or `None` if any node saw nothing or there
/// are no nodes at all.
pub fn resolve<I>(observations: I) -> Option<Publication>
where
    I: IntoIterator<Item = Option<Publication>>,
{
    let mut consensus: Option<Publication> = None;
    for observation in observations {
        let publication = observation?;
        consensus = Some(consensus.map_or(publication, |kept| kept.min(publication)));
    }
    consensus
}

/// Per product, per node latest observation for one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    nodes: Vec<String>,
    observations: BTreeMap<String, BTreeMap<String, Option<Publication>>>,
}

impl ObservationTable {
    /// A table expecting an observation from each of `nodes`; anything not
    /// recorded counts as absent.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            observations: BTreeMap::new(),
        }
    }

    pub fn record(
        &mut self,
        product: &str,
        node: &str,
        observation: Option<Publication>,
    ) {
        self.observations
            .entry(product.to_string())
            .or_default()
            .insert(node.to_string(), observation);
    }

    /// What every node reported for `product`, in node order.
    pub fn observations(
        &self,
        product: &str,
    ) -> impl Iterator<Item = (&str, Option<Publication>)> + '_ {
        let per_node = self.observations.get(product);
        self.nodes.iter().map(move |node| {
            let observation =
                per_node.and_then(|map| map.get(node).copied().flatten());
            (node.as_str(), observation)
        })
    }

    pub fn consensus(&self, product: &str) -> Option<Publication> {
        resolve(self.observations(product).map(|(_, observation)| observation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(hour: u32) -> Publication {
        Publication::new(Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap())
    }

    #[test]
    fn laggard_wins() {
        let consensus = resolve([Some(at(10)), Some(at(10)), Some(at(9))]);
        assert_eq!(consensus, Some(at(9)));
    }

    #[test]
    fn any_absent_node_makes_consensus_absent() {
        assert_eq!(resolve([Some(at(10)), None, Some(at(10))]), None);
        assert_eq!(resolve([None]), None);
    }

    #[test]
    fn empty_node_set_has_no_consensus() {
        assert_eq!(resolve(Vec::<Option<Publication>>::new()), None);
    }

    #[test]
    fn consensus_never_exceeds_any_observation() {
        let samples = [
            vec![Some(at(3)), Some(at(6)), Some(at(0))],
            vec![Some(at(12))],
            vec![Some(at(21)), Some(at(21))],
            vec![Some(at(5)), Some(at(4)), Some(at(23)), Some(at(4))],
        ];
        for sample in samples {
            let consensus = resolve(sample.clone()).unwrap();
            for observation in sample.iter().flatten() {
                assert!(consensus <= *observation);
            }
            assert!(sample.contains(&Some(consensus)));
        }
    }

    #[test]
    fn table_treats_unrecorded_nodes_as_absent() {
        let mut table = ObservationTable::new(["a", "b", "c"]);
        table.record("MEPS", "a", Some(at(10)));
        table.record("MEPS", "b", Some(at(10)));
        assert_eq!(table.consensus("MEPS"), None);

        table.record("MEPS", "c", Some(at(9)));
        assert_eq!(table.consensus("MEPS"), Some(at(9)));
        assert_eq!(table.consensus("unknown"), None);

        let seen: Vec<_> = table.observations("MEPS").collect();
        assert_eq!(
            seen,
            vec![("a", Some(at(10))), ("b", Some(at(10))), ("c", Some(at(9)))]
        );
    }
}
