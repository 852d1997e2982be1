//! Multi-dimensional resource quantities.
//!
//! A [`Resource`] maps resource type names (`vcore`, `memory`, custom types)
//! to quantities. Types that are not present read as zero. Limits that may be
//! absent are modelled as `Option<Resource>`, with `None` meaning unbounded.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Quantity of a single resource type.
pub type Quantity = i64;

/// Resource vector keyed by resource type name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Resource {
    resources: BTreeMap<String, Quantity>,
}

impl Resource {
    /// Empty (all-zero) resource.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
        }
    }

    /// Build a resource from `(type, quantity)` pairs.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Quantity)>,
        K: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Quantity of one type, zero when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> Quantity {
        self.resources.get(name).copied().unwrap_or_default()
    }

    /// Set the quantity of one type.
    pub fn set(&mut self, name: impl Into<String>, quantity: Quantity) {
        self.resources.insert(name.into(), quantity);
    }

    /// Iterate over `(type, quantity)` pairs in type order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Quantity)> {
        self.resources.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True when every quantity is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.resources.values().all(|v| *v == 0)
    }

    /// Add `delta` in place.
    pub fn add_to(&mut self, delta: &Self) {
        for (name, quantity) in &delta.resources {
            let entry = self.resources.entry(name.clone()).or_default();
            *entry = entry.saturating_add(*quantity);
        }
    }

    /// Subtract `delta` in place, clamping each type at zero.
    ///
    /// Returns true when at least one type had to be clamped.
    pub fn sub_from_clamped(&mut self, delta: &Self) -> bool {
        let mut clamped = false;
        for (name, quantity) in &delta.resources {
            let entry = self.resources.entry(name.clone()).or_default();
            *entry = entry.saturating_sub(*quantity);
            if *entry < 0 {
                *entry = 0;
                clamped = true;
            }
        }
        clamped
    }

    /// Would `self + delta` stay within `limit`?
    ///
    /// Only the types named by `limit` are constrained. A sum that overflows
    /// never fits.
    #[must_use]
    pub fn fits_in_with(&self, delta: &Self, limit: &Self) -> bool {
        limit.resources.iter().all(|(name, max)| {
            self.get(name)
                .checked_add(delta.get(name))
                .is_some_and(|total| total <= *max)
        })
    }

    /// Remaining capacity under `limit` given `usage`, never negative.
    ///
    /// Only the types named by `limit` appear in the result.
    #[must_use]
    pub fn headroom(limit: &Self, usage: &Self) -> Self {
        limit
            .resources
            .iter()
            .map(|(name, max)| (name.clone(), max.saturating_sub(usage.get(name)).max(0)))
            .collect()
    }

    /// Component-wise minimum where a missing operand, or a type missing from
    /// one operand, is treated as unbounded.
    #[must_use]
    pub fn component_wise_min_permissive(
        left: Option<&Self>,
        right: Option<&Self>,
    ) -> Option<Self> {
        match (left, right) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (Some(left), Some(right)) => {
                let mut merged = left.clone();
                for (name, quantity) in &right.resources {
                    merged
                        .resources
                        .entry(name.clone())
                        .and_modify(|current| *current = (*current).min(*quantity))
                        .or_insert(*quantity);
                }
                Some(merged)
            }
        }
    }
}

impl<K: Into<String>> FromIterator<(K, Quantity)> for Resource {
    fn from_iter<I: IntoIterator<Item = (K, Quantity)>>(iter: I) -> Self {
        Self {
            resources: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, quantity)) in self.resources.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {quantity}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res(pairs: &[(&str, Quantity)]) -> Resource {
        Resource::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_add_and_clamped_sub() {
        let mut usage = res(&[("vcore", 4)]);
        usage.add_to(&res(&[("vcore", 2), ("memory", 10)]));
        assert_eq!(usage.get("vcore"), 6);
        assert_eq!(usage.get("memory"), 10);

        assert!(!usage.sub_from_clamped(&res(&[("vcore", 6)])));
        assert_eq!(usage.get("vcore"), 0);
        assert!(usage.sub_from_clamped(&res(&[("memory", 11)])));
        assert_eq!(usage.get("memory"), 0);
        assert!(usage.is_zero());
    }

    #[test]
    fn test_fits_in_with_only_constrains_named_types() {
        let usage = res(&[("vcore", 4), ("memory", 100)]);
        let limit = res(&[("vcore", 10)]);
        assert!(usage.fits_in_with(&res(&[("vcore", 6), ("memory", 5000)]), &limit));
        assert!(!usage.fits_in_with(&res(&[("vcore", 7)]), &limit));
    }

    #[test]
    fn test_zero_limit_blocks_usage() {
        let limit = res(&[("gpu", 0)]);
        assert!(!Resource::new().fits_in_with(&res(&[("gpu", 1)]), &limit));
        assert!(Resource::new().fits_in_with(&res(&[("vcore", 1)]), &limit));
    }

    #[test]
    fn test_headroom_never_negative() {
        let limit = res(&[("vcore", 10), ("memory", 50)]);
        let usage = res(&[("vcore", 4), ("memory", 80)]);
        let headroom = Resource::headroom(&limit, &usage);
        assert_eq!(headroom, res(&[("vcore", 6), ("memory", 0)]));
    }

    #[test]
    fn test_component_wise_min_permissive() {
        let a = res(&[("vcore", 6), ("memory", 100)]);
        let b = res(&[("vcore", 3), ("gpu", 1)]);
        let min = Resource::component_wise_min_permissive(Some(&a), Some(&b)).unwrap();
        assert_eq!(min, res(&[("vcore", 3), ("memory", 100), ("gpu", 1)]));
        assert_eq!(Resource::component_wise_min_permissive(None, Some(&a)), Some(a.clone()));
        assert_eq!(Resource::component_wise_min_permissive(None, None), None);
    }

    #[test]
    fn test_quantities_near_max_do_not_overflow() {
        let limit = res(&[("memory", Quantity::MAX)]);
        let mut usage = res(&[("memory", Quantity::MAX)]);
        assert!(!usage.fits_in_with(&res(&[("memory", 1)]), &limit));
        assert!(usage.fits_in_with(&res(&[("memory", 0)]), &limit));

        usage.add_to(&res(&[("memory", 1)]));
        assert_eq!(usage.get("memory"), Quantity::MAX);
        assert!(!usage.sub_from_clamped(&res(&[("memory", Quantity::MAX)])));
        assert!(usage.is_zero());

        let headroom = Resource::headroom(&limit, &res(&[("memory", 1)]));
        assert_eq!(headroom.get("memory"), Quantity::MAX - 1);
    }

    #[test]
    fn test_display_and_serde() {
        let r = res(&[("vcore", 4), ("memory", 1024)]);
        assert_eq!(r.to_string(), "{memory: 1024, vcore: 4}");
        let json = serde_json::to_string(&r).unwrap();
        assert_eq!(json, r#"{"memory":1024,"vcore":4}"#);
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
