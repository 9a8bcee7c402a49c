//! Counter path strings: `\\<machine>\<category>(<instance>)\<counter>`.
//!
//! The instance group is optional. Either the instance or the counter may be
//! the `#ALL#` sentinel, which [`CounterPath::expand`] resolves against a
//! [`CounterCatalog`]:
//!
//! | instance | counter | expands to |
//! |---|---|---|
//! | `#ALL#` | `#ALL#` | every counter of every instance |
//! | name / absent | `#ALL#` | every counter of that instance |
//! | `#ALL#` | name | that counter on every instance |
//! | name / absent | name | exactly one counter |
//!
//! Instances are visited in lexicographic order. `_Total` is not filtered here.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::source::{CounterCatalog, CounterId};

/// Reserved segment value meaning "every instance" or "every counter".
pub const ALL: &str = "#ALL#";

/// One instance or counter segment of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Literal(String),
    All,
}

impl Selector {
    fn parse(segment: &str) -> Self {
        if segment == ALL {
            Self::All
        } else {
            Self::Literal(segment.to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(name) => Some(name),
            Self::All => None,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::All => f.write_str(ALL),
        }
    }
}

/// A parsed, possibly wildcarded, counter path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterPath {
    pub machine: String,
    pub category: String,
    pub instance: Option<Selector>,
    pub counter: Selector,
}

impl CounterPath {
    pub fn parse(path: &str) -> Result<Self> {
        let malformed = |reason| Error::MalformedCounterPath {
            path: path.to_string(),
            reason,
        };

        let rest = path
            .strip_prefix("\\\\")
            .ok_or_else(|| malformed("missing leading \\\\"))?;
        let segments: Vec<&str> = rest.split('\\').collect();
        let [machine, middle, counter] = segments[..] else {
            return Err(malformed("expected machine, category and counter segments"));
        };

        let (category, instance) = match (middle.find('('), middle.find(')')) {
            (None, None) => (middle, None),
            (Some(open), Some(close))
                if close == middle.len() - 1
                    && open < close
                    && middle.matches('(').count() == 1
                    && middle.matches(')').count() == 1 =>
            {
                (&middle[..open], Some(&middle[open + 1..close]))
            }
            _ => return Err(malformed("unbalanced instance parentheses")),
        };

        if category.is_empty() {
            return Err(malformed("empty category"));
        }
        if counter.is_empty() {
            return Err(malformed("empty counter"));
        }

        Ok(Self {
            machine: machine.to_string(),
            category: category.to_string(),
            // `Category()` names no instance at all.
            instance: instance.filter(|i| !i.is_empty()).map(Selector::parse),
            counter: Selector::parse(counter),
        })
    }

    /// Whether this path names exactly one counter.
    pub fn is_concrete(&self) -> bool {
        !self.counter.is_all() && !self.instance.as_ref().is_some_and(Selector::is_all)
    }

    /// Resolve wildcards into concrete counter identities.
    pub fn expand(&self, catalog: &dyn CounterCatalog) -> Result<Vec<CounterId>> {
        let machine = self.machine.as_str();
        let category = self.category.as_str();
        let id = |instance: Option<&str>, counter: &str| {
            CounterId::new(machine, category, instance, counter)
        };

        let ids = match (&self.instance, &self.counter) {
            (Some(Selector::All), Selector::All) => {
                let mut ids = Vec::new();
                for instance in catalog.sorted_instances(machine, category)? {
                    for counter in catalog.counters(machine, category, Some(instance.as_str()))? {
                        ids.push(id(Some(instance.as_str()), &counter));
                    }
                }
                ids
            }
            (Some(Selector::All), Selector::Literal(counter)) => catalog
                .sorted_instances(machine, category)?
                .iter()
                .map(|instance| id(Some(instance.as_str()), counter))
                .collect(),
            (instance, Selector::All) => {
                let instance = instance.as_ref().and_then(Selector::as_literal);
                catalog
                    .counters(machine, category, instance)?
                    .iter()
                    .map(|counter| id(instance, counter))
                    .collect()
            }
            (instance, Selector::Literal(counter)) => {
                vec![id(instance.as_ref().and_then(Selector::as_literal), counter)]
            }
        };

        debug!("expanded {self} into {} counter(s)", ids.len());
        Ok(ids)
    }
}

impl FromStr for CounterPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\\\\{}\\{}", self.machine, self.category)?;
        if let Some(instance) = &self.instance {
            write!(f, "({instance})")?;
        }
        write!(f, "\\{}", self.counter)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::MetricSource;
    use std::collections::BTreeMap;

    // -----------------------------------------------------------------------
    // In-memory catalog
    // -----------------------------------------------------------------------

    /// Catalog of fixed readings keyed by category, instance and counter.
    #[derive(Default)]
    pub(crate) struct MapCatalog {
        /// category -> instance ("" for none) -> ordered (counter, value)
        pub(crate) categories: BTreeMap<String, Vec<(String, Vec<(String, f64)>)>>,
    }

    impl MapCatalog {
        pub(crate) fn with(
            mut self,
            category: &str,
            instance: Option<&str>,
            counters: &[(&str, f64)],
        ) -> Self {
            let instances = self.categories.entry(category.to_string()).or_default();
            instances.push((
                instance.unwrap_or("").to_string(),
                counters
                    .iter()
                    .map(|(name, v)| (name.to_string(), *v))
                    .collect(),
            ));
            self
        }

        fn lookup(&self, category: &str, instance: Option<&str>) -> Result<&[(String, f64)]> {
            let instance = instance.unwrap_or("");
            self.categories
                .get(category)
                .and_then(|insts| insts.iter().find(|(name, _)| name == instance))
                .map(|(_, counters)| counters.as_slice())
                .ok_or_else(|| Error::unavailable(format!("{category}({instance})")))
        }
    }

    pub(crate) struct FixedSource {
        id: CounterId,
        value: f64,
    }

    impl MetricSource for FixedSource {
        fn read(&self) -> Result<f64> {
            Ok(self.value)
        }

        fn id(&self) -> Option<&CounterId> {
            Some(&self.id)
        }
    }

    impl CounterCatalog for MapCatalog {
        fn instances(&self, _machine: &str, category: &str) -> Result<Vec<String>> {
            let insts = self
                .categories
                .get(category)
                .ok_or_else(|| Error::unavailable(category.to_string()))?;
            // Reverse insertion order so callers must sort.
            Ok(insts
                .iter()
                .rev()
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, _)| name.clone())
                .collect())
        }

        fn counters(
            &self,
            _machine: &str,
            category: &str,
            instance: Option<&str>,
        ) -> Result<Vec<String>> {
            Ok(self
                .lookup(category, instance)?
                .iter()
                .map(|(name, _)| name.clone())
                .collect())
        }

        fn open(&self, id: &CounterId) -> Result<Box<dyn MetricSource>> {
            let value = self
                .lookup(&id.category, id.instance.as_deref())?
                .iter()
                .find(|(name, _)| *name == id.counter)
                .map(|(_, v)| *v)
                .ok_or_else(|| Error::unavailable(id.to_string()))?;
            Ok(Box::new(FixedSource {
                id: id.clone(),
                value,
            }))
        }
    }

    fn processor_catalog() -> MapCatalog {
        MapCatalog::default()
            .with("Processor", Some("_Total"), &[("% Processor Time", 20.0), ("% Idle Time", 80.0)])
            .with("Processor", Some("0"), &[("% Processor Time", 10.0), ("% Idle Time", 90.0)])
            .with("Processor", Some("1"), &[("% Processor Time", 30.0), ("% Idle Time", 70.0)])
            .with("Memory", None, &[("Available Bytes", 1.0), ("Committed Bytes", 2.0)])
    }

    fn rendered(ids: &[CounterId]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    #[test]
    fn parse_full_path() {
        let p = CounterPath::parse("\\\\.\\Processor(_Total)\\% Processor Time").unwrap();
        assert_eq!(p.machine, ".");
        assert_eq!(p.category, "Processor");
        assert_eq!(p.instance, Some(Selector::Literal("_Total".into())));
        assert_eq!(p.counter, Selector::Literal("% Processor Time".into()));
        assert!(p.is_concrete());
    }

    #[test]
    fn parse_without_instance() {
        let p: CounterPath = "\\\\host\\Memory\\Available Bytes".parse().unwrap();
        assert_eq!(p.machine, "host");
        assert_eq!(p.category, "Memory");
        assert_eq!(p.instance, None);
        assert_eq!(p.counter.as_literal(), Some("Available Bytes"));
    }

    #[test]
    fn parse_sentinels() {
        let p = CounterPath::parse("\\\\.\\Processor(#ALL#)\\#ALL#").unwrap();
        assert_eq!(p.instance, Some(Selector::All));
        assert_eq!(p.counter, Selector::All);
        assert!(!p.is_concrete());
    }

    #[test]
    fn parse_empty_parens_means_no_instance() {
        let p = CounterPath::parse("\\\\.\\Memory()\\#ALL#").unwrap();
        assert_eq!(p.instance, None);
    }

    #[test]
    fn display_round_trips_canonical_form() {
        for s in [
            "\\\\.\\Processor(_Total)\\% Processor Time",
            "\\\\.\\Memory\\Available Bytes",
            "\\\\srv\\PhysicalDisk(#ALL#)\\#ALL#",
        ] {
            assert_eq!(CounterPath::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn malformed_paths_are_rejected() {
        for s in [
            "",
            "\\",
            ".\\Processor\\x",
            "\\\\.\\Processor",
            "\\\\.\\Processor\\a\\b",
            "\\\\.\\Processor(0\\x",
            "\\\\.\\Processor0)\\x",
            "\\\\.\\Processor)0(\\x",
            "\\\\.\\Processor(0)(1)\\x",
            "\\\\.\\Processor(0)tail\\x",
            "\\\\.\\(0)\\x",
            "\\\\.\\Processor(0)\\",
        ] {
            match CounterPath::parse(s) {
                Err(Error::MalformedCounterPath { path, .. }) => assert_eq!(path, s),
                other => panic!("{s:?} should be malformed, got {other:?}"),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    #[test]
    fn expand_concrete() {
        let p = CounterPath::parse("\\\\.\\Processor(0)\\% Idle Time").unwrap();
        let ids = p.expand(&processor_catalog()).unwrap();
        assert_eq!(rendered(&ids), vec!["\\\\.\\Processor(0)\\% Idle Time"]);
    }

    #[test]
    fn expand_all_counters_of_instance_in_category_order() {
        let p = CounterPath::parse("\\\\.\\Processor(1)\\#ALL#").unwrap();
        let ids = p.expand(&processor_catalog()).unwrap();
        assert_eq!(
            rendered(&ids),
            vec![
                "\\\\.\\Processor(1)\\% Processor Time",
                "\\\\.\\Processor(1)\\% Idle Time",
            ]
        );
    }

    #[test]
    fn expand_all_counters_without_instance() {
        let p = CounterPath::parse("\\\\.\\Memory\\#ALL#").unwrap();
        let ids = p.expand(&processor_catalog()).unwrap();
        assert_eq!(
            rendered(&ids),
            vec![
                "\\\\.\\Memory\\Available Bytes",
                "\\\\.\\Memory\\Committed Bytes",
            ]
        );
    }

    #[test]
    fn expand_all_instances_sorted_including_total() {
        let p = CounterPath::parse("\\\\.\\Processor(#ALL#)\\% Processor Time").unwrap();
        let ids = p.expand(&processor_catalog()).unwrap();
        assert_eq!(
            rendered(&ids),
            vec![
                "\\\\.\\Processor(0)\\% Processor Time",
                "\\\\.\\Processor(1)\\% Processor Time",
                "\\\\.\\Processor(_Total)\\% Processor Time",
            ]
        );
    }

    #[test]
    fn expand_all_by_all() {
        let p = CounterPath::parse("\\\\.\\Processor(#ALL#)\\#ALL#").unwrap();
        let ids = p.expand(&processor_catalog()).unwrap();
        assert_eq!(ids.len(), 6);
        assert_eq!(ids[0].instance.as_deref(), Some("0"));
        assert_eq!(ids[1].instance.as_deref(), Some("0"));
        assert_eq!(ids[5].instance.as_deref(), Some("_Total"));
        assert_eq!(ids[5].counter, "% Idle Time");
    }

    #[test]
    fn expand_unknown_category_fails() {
        let p = CounterPath::parse("\\\\.\\Nope(#ALL#)\\x").unwrap();
        assert!(p.expand(&processor_catalog()).is_err());
    }
}
