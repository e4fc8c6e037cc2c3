// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Argument marshalling: `"k=v, k=v"` markup <-> key/value map, and a
//! typed setting read/write helper (§4.8).

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Key/value argument map. Backed by a `BTreeMap` so serialization is
/// deterministic (iteration order == insertion's sorted key order),
/// which keeps the factory's dedup key stable across calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args(BTreeMap<String, String>);

impl Args {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into `self`; `self`'s values win for keys present
    /// in both (used by the factory's "discovered ∪ caller-supplied"
    /// merge in §4.7 step 3, where discovered args take priority and
    /// caller-supplied only fills gaps).
    pub fn merge_missing_from(&mut self, other: &Args) {
        for (k, v) in other.iter() {
            self.0.entry(k.to_string()).or_insert_with(|| v.to_string());
        }
    }

    /// `kwargs -> markup`: `key=value` pairs separated by `", "`, in
    /// the map's iteration order.
    pub fn serialize(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `markup -> kwargs`: a two-state scan (`in_key`, `in_value`).
    /// Commas terminate a pair, `=` separates key from value,
    /// surrounding whitespace is trimmed, and empty keys are discarded.
    pub fn parse(markup: &str) -> Args {
        enum State {
            InKey,
            InValue,
        }

        let mut map = BTreeMap::new();
        let mut key = String::new();
        let mut value = String::new();
        let mut state = State::InKey;

        let flush = |key: &mut String, value: &mut String, map: &mut BTreeMap<String, String>| {
            let trimmed_key = key.trim().to_string();
            let trimmed_value = value.trim().to_string();
            if !trimmed_key.is_empty() {
                map.insert(trimmed_key, trimmed_value);
            }
            key.clear();
            value.clear();
        };

        for ch in markup.chars() {
            match state {
                State::InKey => match ch {
                    '=' => state = State::InValue,
                    ',' => {
                        flush(&mut key, &mut value, &mut map);
                        state = State::InKey;
                    }
                    _ => key.push(ch),
                },
                State::InValue => match ch {
                    ',' => {
                        flush(&mut key, &mut value, &mut map);
                        state = State::InKey;
                    }
                    _ => value.push(ch),
                },
            }
        }
        flush(&mut key, &mut value, &mut map);

        Args(map)
    }
}

impl fmt::Display for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl From<&str> for Args {
    fn from(markup: &str) -> Self {
        Args::parse(markup)
    }
}

/// Read a typed setting from its string form.
pub fn read_setting<T: FromStr>(args: &Args, key: &str) -> Result<Option<T>> {
    match args.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| Error::InvalidSetting {
                setting: key.to_string(),
                reason: format!("could not parse '{raw}'"),
            }),
    }
}

/// Write a typed setting into its string form.
pub fn write_setting<T: fmt::Display>(args: &mut Args, key: &str, value: T) {
    args.insert(key.to_string(), value.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_round_trips_for_clean_keys_and_values() {
        let cases = [
            "driver=hackrf, serial=12345",
            "a=1",
            "",
            "x=1, y=2, z=3",
        ];
        for markup in cases {
            let parsed = Args::parse(markup);
            let reserialized = parsed.serialize();
            let reparsed = Args::parse(&reserialized);
            assert_eq!(parsed, reparsed, "round trip failed for {markup:?}");
        }
    }

    #[test]
    fn whitespace_is_trimmed_and_empty_keys_dropped() {
        let parsed = Args::parse(" driver = hackrf , , serial=007 ");
        assert_eq!(parsed.get("driver"), Some("hackrf"));
        assert_eq!(parsed.get("serial"), Some("007"));
        assert_eq!(parsed.iter().count(), 2);
    }

    #[test]
    fn merge_missing_from_prefers_self_for_shared_keys() {
        let mut discovered = Args::parse("driver=hackrf, serial=111");
        let caller = Args::parse("serial=222, label=mine");
        discovered.merge_missing_from(&caller);
        assert_eq!(discovered.get("serial"), Some("111"));
        assert_eq!(discovered.get("label"), Some("mine"));
    }

    #[test]
    fn typed_setting_round_trips() {
        let mut args = Args::new();
        write_setting(&mut args, "bitpack", true);
        write_setting(&mut args, "buffers", 16u32);
        assert_eq!(read_setting::<bool>(&args, "bitpack").unwrap(), Some(true));
        assert_eq!(read_setting::<u32>(&args, "buffers").unwrap(), Some(16));
        assert_eq!(read_setting::<u32>(&args, "missing").unwrap(), None);
    }

    #[test]
    fn typed_setting_rejects_unparseable_value() {
        let mut args = Args::new();
        args.insert("buffers", "not-a-number");
        assert!(read_setting::<u32>(&args, "buffers").is_err());
    }
}
