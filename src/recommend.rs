//! Recommend engine (C8): bucketed interest-based compatibility ranking.

use std::collections::HashMap;

use crate::error::{EngineError, EngineResult};
use crate::index::IndexData;
use crate::model::{Account, Status, STATUS_CNT};
use crate::store::AccountStore;

/// An optional single location predicate — requesting both is a client error.
pub enum LocationFilter {
    None,
    Country(i32),
    City(i32),
}

impl LocationFilter {
    pub fn matches(&self, a: &Account) -> bool {
        match self {
            LocationFilter::None => true,
            LocationFilter::Country(id) => a.country_id as i32 == *id,
            LocationFilter::City(id) => a.city_id as i32 == *id,
        }
    }
}

fn bucket_of(sex_opposite: crate::model::Sex, premium_now: bool, status: Status) -> usize {
    crate::model::recommend_bucket(sex_opposite, premium_now, status)
}

/// Ranks candidates of the opposite sex sharing interests with `me`, under
/// the (sex × premium-now × status) bucket acceleration structure (§4.6).
pub fn recommend(
    me: &Account,
    limit: usize,
    location: &LocationFilter,
    index: &IndexData,
    store: &AccountStore,
) -> EngineResult<Vec<u32>> {
    let opposite = me.sex.opposite();
    let mut results = Vec::new();

    'outer: for premium_now in [true, false] {
        for status_int in 0..STATUS_CNT {
            let status = Status::from_i32(status_int).ok_or_else(|| {
                EngineError::Internal(format!("unrecognized status ordinal {status_int}"))
            })?;
            let bucket = bucket_of(opposite, premium_now, status);

            let mut common: HashMap<u32, u32> = HashMap::new();
            for &interest in &me.interests {
                for &id in index.recommend_bucket_interest(bucket, interest).iter() {
                    if id == me.id {
                        continue;
                    }
                    *common.entry(id).or_insert(0) += 1;
                }
            }

            let mut candidates: Vec<(u32, i64, i32, i64)> = Vec::new();
            for (id, count) in common {
                let Some(cand) = store.get(id) else { continue };
                if !location.matches(&cand) {
                    continue;
                }
                let age_diff = (me.birth - cand.birth).abs();
                candidates.push((id, -age_diff, count as i32, -(id as i64)));
            }

            // Sort by (common count, -age_diff, -id) descending; premium_now
            // and status are already fixed by the bucket, so they need no sort
            // key here. The id component is negated so that after the overall
            // reverse below, a full tie resolves in favor of the *smallest*
            // id, matching `CompatibilityInput::getSortingKey()`.
            candidates.sort_by(|a, b| (a.2, a.1, a.3).cmp(&(b.2, b.1, b.3)));
            candidates.reverse();

            for (id, _, _, _) in candidates {
                results.push(id);
                if results.len() >= limit {
                    break 'outer;
                }
            }
        }
    }

    Ok(results)
}

pub fn resolve_location(
    country: Option<&str>,
    city: Option<&str>,
    dict: &crate::dictionary::Dictionaries,
) -> EngineResult<LocationFilter> {
    match (country, city) {
        (Some(_), Some(_)) => Err(EngineError::BadRequest(
            "country and city are mutually exclusive".into(),
        )),
        (Some(c), None) => Ok(LocationFilter::Country(
            dict.country.lookup(c).unwrap_or(crate::model::INVALID_ID),
        )),
        (None, Some(c)) => Ok(LocationFilter::City(
            dict.city.lookup(c).unwrap_or(crate::model::INVALID_ID),
        )),
        (None, None) => Ok(LocationFilter::None),
    }
}
