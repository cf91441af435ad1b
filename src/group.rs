//! Group aggregator (C6): multi-key histograms, plus the precomputed cache of
//! enumerated key subsets that the group planner (C7) rewrites queries
//! against. The cache is never recomputed wholesale after load — every write
//! nudges it by exactly ±1 per affected key tuple (§4.8).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::dictionary::Dictionaries;
use crate::model::Account;
use crate::store::AccountStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupFieldKind {
    Sex,
    Status,
    Country,
    City,
    Interests,
    Joined,
    Birth,
}

impl GroupFieldKind {
    pub fn name(self) -> &'static str {
        match self {
            GroupFieldKind::Sex => "sex",
            GroupFieldKind::Status => "status",
            GroupFieldKind::Country => "country",
            GroupFieldKind::City => "city",
            GroupFieldKind::Interests => "interests",
            GroupFieldKind::Joined => "joined",
            GroupFieldKind::Birth => "birth",
        }
    }

    pub fn from_name(name: &str) -> Option<GroupFieldKind> {
        match name {
            "sex" => Some(GroupFieldKind::Sex),
            "status" => Some(GroupFieldKind::Status),
            "country" => Some(GroupFieldKind::Country),
            "city" => Some(GroupFieldKind::City),
            "interests" => Some(GroupFieldKind::Interests),
            "joined" => Some(GroupFieldKind::Joined),
            "birth" => Some(GroupFieldKind::Birth),
            _ => None,
        }
    }

    /// Multi-valued fields (only interests) contribute once per value rather
    /// than once per account to a histogram keyed on them.
    pub fn is_multi_valued(self) -> bool {
        matches!(self, GroupFieldKind::Interests)
    }
}

/// The base breakdown fields, in the fixed order the enumeration below walks.
pub const BASE_FIELDS: [GroupFieldKind; 5] = [
    GroupFieldKind::Sex,
    GroupFieldKind::Status,
    GroupFieldKind::Country,
    GroupFieldKind::City,
    GroupFieldKind::Interests,
];

/// Base fields plus the two "extended" fields, which the enumeration below
/// only ever places in the *last* position of a tuple — which is exactly why
/// "at most one extended key" falls out of the enumeration for free.
pub const EXTENDED_FIELDS: [GroupFieldKind; 7] = [
    GroupFieldKind::Sex,
    GroupFieldKind::Status,
    GroupFieldKind::Country,
    GroupFieldKind::City,
    GroupFieldKind::Interests,
    GroupFieldKind::Joined,
    GroupFieldKind::Birth,
];

pub const NUM_SUPPORTED_BREAKDOWNS: usize = 3;

/// Sorts a field list into the canonical (by-name) order used both as the
/// cache's hash key and as the positional order of a stored value tuple.
pub fn canonicalize(fields: &mut Vec<GroupFieldKind>) {
    fields.sort_by_key(|f| f.name());
    fields.dedup();
}

pub fn cache_key(fields: &[GroupFieldKind]) -> String {
    fields
        .iter()
        .map(|f| f.name())
        .collect::<Vec<_>>()
        .join(",")
}

/// Every subset of {1,2,3} cached breakdown fields, enumerated per §4.5.
pub fn enumerate_cache_shape() -> Vec<Vec<GroupFieldKind>> {
    let mut out = Vec::new();
    for f in BASE_FIELDS {
        out.push(vec![f]);
    }
    for (i1, f1) in BASE_FIELDS.iter().enumerate() {
        for f2 in &EXTENDED_FIELDS[i1 + 1..] {
            out.push(vec![*f1, *f2]);
        }
    }
    for (i1, f1) in BASE_FIELDS.iter().enumerate() {
        for (i2, f2) in BASE_FIELDS.iter().enumerate().skip(i1 + 1) {
            for f3 in &EXTENDED_FIELDS[i2 + 1..] {
                out.push(vec![*f1, *f2, *f3]);
            }
        }
    }
    out
}

fn single_value(a: &Account, kind: GroupFieldKind) -> i32 {
    match kind {
        GroupFieldKind::Sex => a.sex as i32,
        GroupFieldKind::Status => a.status.as_i32(),
        GroupFieldKind::Country => a.country_id as i32,
        GroupFieldKind::City => a.city_id as i32,
        GroupFieldKind::Joined => a.joined_year_offset as i32,
        GroupFieldKind::Birth => a.birth_year_offset as i32,
        GroupFieldKind::Interests => unreachable!("interests is multi-valued"),
    }
}

/// Expands an account into the set of value tuples it contributes to a
/// histogram keyed on `fields` (in that order). An account with no interests
/// contributes zero tuples to any key set containing `Interests`.
pub fn account_key_tuples(a: &Account, fields: &[GroupFieldKind]) -> Vec<Vec<i32>> {
    let mut tuples: Vec<Vec<i32>> = vec![Vec::new()];
    for &kind in fields {
        if kind.is_multi_valued() {
            if a.interests.is_empty() {
                return Vec::new();
            }
            let mut next = Vec::with_capacity(tuples.len() * a.interests.len());
            for t in &tuples {
                for &iid in &a.interests {
                    let mut nt = t.clone();
                    nt.push(iid as i32);
                    next.push(nt);
                }
            }
            tuples = next;
        } else {
            let v = single_value(a, kind);
            for t in tuples.iter_mut() {
                t.push(v);
            }
        }
    }
    tuples
}

/// One precomputed histogram: a fixed, canonically-ordered field list and a
/// map from value tuple (same order) to live-account count.
#[derive(Clone)]
pub struct CachedGroup {
    pub fields: Vec<GroupFieldKind>,
    pub counts: HashMap<Vec<i32>, i64>,
}

pub struct GroupCache {
    entries: RwLock<HashMap<String, CachedGroup>>,
}

impl GroupCache {
    pub fn new() -> Self {
        GroupCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Materializes every enumerated key subset via one full scan. Called
    /// once at load; never again wholesale (incremental deltas only).
    pub fn build(&self, store: &AccountStore) {
        let mut entries: HashMap<String, CachedGroup> = HashMap::new();
        for mut fields in enumerate_cache_shape() {
            canonicalize(&mut fields);
            let key = cache_key(&fields);
            entries.insert(
                key,
                CachedGroup {
                    fields,
                    counts: HashMap::new(),
                },
            );
        }

        store.for_each(|a| {
            for entry in entries.values_mut() {
                for tuple in account_key_tuples(a, &entry.fields) {
                    *entry.counts.entry(tuple).or_insert(0) += 1;
                }
            }
        });

        *self.entries.write() = entries;
    }

    /// Applies `delta` (±1) to every `(K, key(account))` pair for every
    /// cached key set `K` — the write-path hook from §4.8.
    pub fn apply_delta(&self, a: &Account, delta: i64) {
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            for tuple in account_key_tuples(a, &entry.fields) {
                let count = entry.counts.entry(tuple).or_insert(0);
                *count += delta;
            }
        }
    }

    /// Looks up a cache entry by its canonical key, cloning it out from under
    /// the lock (mirrors the reference's verbatim `*map = *ptr` copy).
    pub fn get(&self, fields: &[GroupFieldKind]) -> Option<CachedGroup> {
        let mut canon = fields.to_vec();
        canonicalize(&mut canon);
        self.entries.read().get(&cache_key(&canon)).cloned()
    }

    #[cfg(test)]
    pub fn total_count(&self, fields: &[GroupFieldKind]) -> Option<i64> {
        self.get(fields).map(|g| g.counts.values().sum())
    }
}

impl Default for GroupCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverse-dictionary string for one value in one group field's position —
/// used only at response-emission time, never for cache identity.
pub fn field_value_to_string(kind: GroupFieldKind, value_id: i32, dict: &Dictionaries) -> String {
    match kind {
        GroupFieldKind::Sex => if value_id == 0 { "m" } else { "f" }.to_string(),
        GroupFieldKind::Status => crate::model::Status::from_i32(value_id)
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        GroupFieldKind::Country => dict.country.value(value_id).unwrap_or_default(),
        GroupFieldKind::City => dict.city.value(value_id).unwrap_or_default(),
        GroupFieldKind::Interests => dict.interest.value(value_id).unwrap_or_default(),
        GroupFieldKind::Joined | GroupFieldKind::Birth => {
            (crate::model::BASE_YEAR + value_id).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sex, Status};

    fn account(id: u32, sex: Sex, status: Status, country: i8, interests: Vec<i8>) -> Account {
        Account {
            id,
            fname: String::new(),
            sname: String::new(),
            email: String::new(),
            phone: String::new(),
            sex,
            status,
            country: String::new(),
            city: String::new(),
            birth: 0,
            joined: 0,
            premium: None,
            likes: Vec::new(),
            backward_likes: Vec::new(),
            interests,
            email_domain: String::new(),
            birth_year_offset: 0,
            joined_year_offset: 0,
            country_id: country,
            city_id: 0,
            has_premium_now: false,
        }
    }

    #[test]
    fn enumeration_caps_at_three_keys_and_one_extended() {
        for subset in enumerate_cache_shape() {
            assert!(subset.len() <= NUM_SUPPORTED_BREAKDOWNS);
            let extended = subset
                .iter()
                .filter(|f| matches!(f, GroupFieldKind::Joined | GroupFieldKind::Birth))
                .count();
            assert!(extended <= 1);
        }
    }

    #[test]
    fn build_then_delta_keeps_totals_consistent() {
        let store = AccountStore::new();
        store.put(account(1, Sex::Male, Status::Single, 5, vec![1, 2]));
        store.put(account(2, Sex::Female, Status::Single, 5, vec![2]));

        let cache = GroupCache::new();
        cache.build(&store);

        assert_eq!(cache.total_count(&[GroupFieldKind::Country]), Some(2));
        assert_eq!(cache.total_count(&[GroupFieldKind::Interests]), Some(3));

        let removed = account(1, Sex::Male, Status::Single, 5, vec![1, 2]);
        cache.apply_delta(&removed, -1);
        assert_eq!(cache.total_count(&[GroupFieldKind::Country]), Some(1));
        assert_eq!(cache.total_count(&[GroupFieldKind::Interests]), Some(1));
    }

    #[test]
    fn reordering_keys_does_not_change_the_cache_identity() {
        let mut a = vec![GroupFieldKind::Country, GroupFieldKind::Sex];
        let mut b = vec![GroupFieldKind::Sex, GroupFieldKind::Country];
        canonicalize(&mut a);
        canonicalize(&mut b);
        assert_eq!(cache_key(&a), cache_key(&b));
    }
}
