//! Inverted indexes (C3): for each lookup-eligible attribute, a mapping from
//! value to a sorted-descending list of account ids. Rebuilt wholesale on
//! quiescence (C11) rather than maintained incrementally — between rebuilds,
//! freshly created/updated accounts simply are not reflected in lookups yet;
//! `matches()` on the account record remains the final arbiter, so correctness
//! is unaffected, only selectivity.
//!
//! A full rebuild produces a brand new [`IndexData`] and swaps it in atomically
//! via `ArcSwap`, so readers never observe a partially rebuilt index.

use std::collections::HashMap;
use std::sync::Arc;

use std::sync::OnceLock;

use arc_swap::ArcSwap;

use crate::model::{recommend_bucket, Account, CityId, CountryId, InterestId, Sex, BUCKETS_CNT};
use crate::store::AccountStore;

/// A lazily-initialized empty `Arc<Vec<u32>>` shared by every miss, so lookup
/// helpers never allocate on the empty-bucket path.
static EMPTY_LIST: OnceLock<Arc<Vec<u32>>> = OnceLock::new();

fn empty_list() -> Arc<Vec<u32>> {
    EMPTY_LIST.get_or_init(|| Arc::new(Vec::new())).clone()
}

#[derive(Default)]
pub struct IndexData {
    pub sex: HashMap<i32, Arc<Vec<u32>>>,
    pub status: HashMap<i32, Arc<Vec<u32>>>,
    pub country: HashMap<CountryId, Arc<Vec<u32>>>,
    pub city: HashMap<CityId, Arc<Vec<u32>>>,
    pub interest: HashMap<InterestId, Arc<Vec<u32>>>,
    pub email_domain: HashMap<String, Arc<Vec<u32>>>,
    pub joined_year: HashMap<i8, Arc<Vec<u32>>>,
    pub birth_year: HashMap<i8, Arc<Vec<u32>>>,
    /// Per (sex, premium-now, status) bucket, per interest id, the descending
    /// list of accounts sharing that interest within that bucket (C8).
    pub recommend_buckets: Vec<HashMap<InterestId, Arc<Vec<u32>>>>,
}

impl IndexData {
    fn new() -> Self {
        IndexData {
            recommend_buckets: (0..BUCKETS_CNT).map(|_| HashMap::new()).collect(),
            ..Default::default()
        }
    }

    pub fn by_sex(&self, sex: Sex) -> Arc<Vec<u32>> {
        self.sex.get(&(sex as i32)).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_status(&self, status: i32) -> Arc<Vec<u32>> {
        self.status.get(&status).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_country(&self, id: CountryId) -> Arc<Vec<u32>> {
        self.country.get(&id).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_city(&self, id: CityId) -> Arc<Vec<u32>> {
        self.city.get(&id).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_interest(&self, id: InterestId) -> Arc<Vec<u32>> {
        self.interest.get(&id).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_email_domain(&self, domain: &str) -> Arc<Vec<u32>> {
        self.email_domain.get(domain).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_joined_year(&self, offset: i8) -> Arc<Vec<u32>> {
        self.joined_year.get(&offset).cloned().unwrap_or_else(empty_list)
    }

    pub fn by_birth_year(&self, offset: i8) -> Arc<Vec<u32>> {
        self.birth_year.get(&offset).cloned().unwrap_or_else(empty_list)
    }

    pub fn recommend_bucket_interest(&self, bucket: usize, interest: InterestId) -> Arc<Vec<u32>> {
        self.recommend_buckets[bucket]
            .get(&interest)
            .cloned()
            .unwrap_or_else(empty_list)
    }
}

pub struct IndexStorage {
    data: ArcSwap<IndexData>,
}

impl IndexStorage {
    pub fn new() -> Self {
        IndexStorage {
            data: ArcSwap::from_pointee(IndexData::new()),
        }
    }

    pub fn load(&self) -> Arc<IndexData> {
        self.data.load_full()
    }

    /// Full rebuild: scans every live account and rebuilds every single-value
    /// index and every recommend bucket from scratch, then swaps the result
    /// in atomically. Does **not** touch the group cache (C6), which is
    /// maintained strictly incrementally.
    pub fn rebuild_from(&self, store: &AccountStore) {
        let mut sex: HashMap<i32, Vec<u32>> = HashMap::new();
        let mut status: HashMap<i32, Vec<u32>> = HashMap::new();
        let mut country: HashMap<CountryId, Vec<u32>> = HashMap::new();
        let mut city: HashMap<CityId, Vec<u32>> = HashMap::new();
        let mut interest: HashMap<InterestId, Vec<u32>> = HashMap::new();
        let mut email_domain: HashMap<String, Vec<u32>> = HashMap::new();
        let mut joined_year: HashMap<i8, Vec<u32>> = HashMap::new();
        let mut birth_year: HashMap<i8, Vec<u32>> = HashMap::new();
        let mut buckets: Vec<HashMap<InterestId, Vec<u32>>> =
            (0..BUCKETS_CNT).map(|_| HashMap::new()).collect();

        store.for_each(|a: &Account| {
            sex.entry(a.sex as i32).or_default().push(a.id);
            status.entry(a.status.as_i32()).or_default().push(a.id);
            country.entry(a.country_id).or_default().push(a.id);
            city.entry(a.city_id).or_default().push(a.id);
            email_domain.entry(a.email_domain.clone()).or_default().push(a.id);
            joined_year.entry(a.joined_year_offset).or_default().push(a.id);
            birth_year.entry(a.birth_year_offset).or_default().push(a.id);
            for &i in &a.interests {
                interest.entry(i).or_default().push(a.id);
            }

            let bucket = recommend_bucket(a.sex, a.has_premium_now, a.status);
            for &i in &a.interests {
                buckets[bucket].entry(i).or_default().push(a.id);
            }
        });

        sort_desc_all(&mut sex);
        sort_desc_all(&mut status);
        sort_desc_all(&mut country);
        sort_desc_all(&mut city);
        sort_desc_all(&mut interest);
        sort_desc_all(&mut email_domain);
        sort_desc_all(&mut joined_year);
        sort_desc_all(&mut birth_year);
        for bucket in &mut buckets {
            sort_desc_all(bucket);
        }

        let data = IndexData {
            sex: into_arc_map(sex),
            status: into_arc_map(status),
            country: into_arc_map(country),
            city: into_arc_map(city),
            interest: into_arc_map(interest),
            email_domain: into_arc_map(email_domain),
            joined_year: into_arc_map(joined_year),
            birth_year: into_arc_map(birth_year),
            recommend_buckets: buckets.into_iter().map(into_arc_map).collect(),
        };

        self.data.store(Arc::new(data));
    }
}

impl Default for IndexStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_desc_all<K>(map: &mut HashMap<K, Vec<u32>>) {
    for list in map.values_mut() {
        list.sort_unstable_by(|a, b| b.cmp(a));
    }
}

fn into_arc_map<K: std::hash::Hash + Eq>(map: HashMap<K, Vec<u32>>) -> HashMap<K, Arc<Vec<u32>>> {
    map.into_iter().map(|(k, v)| (k, Arc::new(v))).collect()
}
