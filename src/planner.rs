//! Planner (C7): picks the smallest lookup for filter queries, and rewrites
//! group queries against the precomputed cache in the order given by §4.5.

use std::collections::HashMap;
use std::sync::Arc;

use crate::dictionary::Dictionaries;
use crate::error::{EngineError, EngineResult};
use crate::filter::{Filter, FilterCtx};
use crate::group::{
    account_key_tuples, canonicalize, field_value_to_string, GroupCache, GroupFieldKind,
    NUM_SUPPORTED_BREAKDOWNS,
};
use crate::iterator::debug_assert_descending;
use crate::model::Account;

/// Executes an ordered filter list and returns up to `limit` matching
/// accounts in descending id order (§4.4).
pub fn execute_filter(filters: &[Filter], limit: usize, ctx: &FilterCtx) -> Vec<Arc<Account>> {
    let driver = filters
        .iter()
        .enumerate()
        .filter(|(_, f)| f.supports_lookup())
        .min_by_key(|(_, f)| f.estimate_output_size(ctx));

    let mut results = Vec::new();

    match driver {
        Some((driver_idx, driver_filter)) => {
            let residual: Vec<&Filter> = filters
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != driver_idx)
                .map(|(_, f)| f)
                .collect();
            let it = driver_filter.open_lookup(ctx);
            let mut prev_id: Option<u32> = None;
            for id in it {
                if let Some(prev) = prev_id {
                    debug_assert_descending(&[prev, id]);
                }
                prev_id = Some(id);

                if results.len() >= limit {
                    break;
                }
                let Some(account) = ctx.store.get(id) else {
                    continue;
                };
                // The driver itself is rechecked here: an `interests_contains`
                // driver's lookup iterator only walks its smallest posting
                // list, so the other required interests still need checking.
                if !driver_filter.matches(&account) {
                    continue;
                }
                if residual.iter().all(|f| f.matches(&account)) {
                    results.push(account);
                }
            }
        }
        None => {
            for account in ctx.store.iter_descending() {
                if results.len() >= limit {
                    break;
                }
                if filters.iter().all(|f| f.matches(&account)) {
                    results.push(account);
                }
            }
        }
    }

    results
}

/// One output row of a group query: the client-ordered key/value pairs and
/// the count, before string-rendering and final sort/truncation.
pub struct GroupRow {
    pub values: Vec<(GroupFieldKind, i32)>,
    pub count: i64,
}

/// Runs the full §4.5 rewrite chain and returns rows ready for sorting.
pub fn execute_group(
    filters: &[Filter],
    keys: &[GroupFieldKind],
    ctx: &FilterCtx,
    cache: &GroupCache,
) -> EngineResult<Vec<GroupRow>> {
    if keys.len() > NUM_SUPPORTED_BREAKDOWNS {
        return Err(EngineError::BadRequest(
            "at most 3 group keys are supported".into(),
        ));
    }

    if !filters.is_empty() && filters.len() <= 2 {
        if let Some(rows) = try_filter_breakdown_cached(filters, keys, cache) {
            return Ok(rows);
        }
    }

    if filters.is_empty() {
        if let Some(group) = cache.get(keys) {
            return Ok(group
                .counts
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(tuple, count)| GroupRow {
                    values: keys.iter().copied().zip(tuple).collect(),
                    count,
                })
                .collect());
        }
    }

    let driver = filters
        .iter()
        .filter(|f| f.supports_lookup())
        .min_by_key(|f| f.estimate_output_size(ctx));

    let mut histogram: HashMap<Vec<i32>, i64> = HashMap::new();

    match driver {
        Some(driver_filter) => {
            let residual: Vec<&Filter> = filters
                .iter()
                .filter(|f| !std::ptr::eq(*f, driver_filter))
                .collect();
            let mut prev_id: Option<u32> = None;
            for id in driver_filter.open_lookup(ctx) {
                if let Some(prev) = prev_id {
                    debug_assert_descending(&[prev, id]);
                }
                prev_id = Some(id);

                let Some(account) = ctx.store.get(id) else {
                    continue;
                };
                if !driver_filter.matches(&account) {
                    continue;
                }
                if residual.iter().all(|f| f.matches(&account)) {
                    accumulate(&mut histogram, &account, keys);
                }
            }
        }
        None => {
            for account in ctx.store.iter_descending() {
                if filters.iter().all(|f| f.matches(&account)) {
                    accumulate(&mut histogram, &account, keys);
                }
            }
        }
    }

    Ok(histogram
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(tuple, count)| GroupRow {
            values: keys.iter().copied().zip(tuple).collect(),
            count,
        })
        .collect())
}

fn accumulate(histogram: &mut HashMap<Vec<i32>, i64>, account: &Account, keys: &[GroupFieldKind]) {
    for tuple in account_key_tuples(account, keys) {
        *histogram.entry(tuple).or_insert(0) += 1;
    }
}

/// Rewrite #1: `GROUP(K) ∧ EQ(f=v) ≡ { (k,v) ∈ GROUP(K∪{f}) : v matches }`.
/// Every filter must pin a single cached-breakdown field to one value.
fn try_filter_breakdown_cached(
    filters: &[Filter],
    keys: &[GroupFieldKind],
    cache: &GroupCache,
) -> Option<Vec<GroupRow>> {
    let mut combined = keys.to_vec();
    let mut pins: Vec<(GroupFieldKind, i32)> = Vec::new();

    for f in filters {
        let kind = GroupFieldKind::from_name(f.field_name())?;
        let value_id = f.value_id()?;
        if !combined.contains(&kind) {
            combined.push(kind);
        }
        pins.push((kind, value_id));
    }

    canonicalize(&mut combined);
    if combined.len() > NUM_SUPPORTED_BREAKDOWNS {
        return None;
    }

    let group = cache.get(&combined)?;
    let index_of = |k: GroupFieldKind| group.fields.iter().position(|&f| f == k).unwrap();
    let pin_indices: Vec<(usize, i32)> = pins.iter().map(|(k, v)| (index_of(*k), *v)).collect();
    let key_indices: Vec<usize> = keys.iter().map(|k| index_of(*k)).collect();

    let mut rows = Vec::new();
    'outer: for (tuple, count) in &group.counts {
        if *count == 0 {
            continue;
        }
        for (idx, vid) in &pin_indices {
            if tuple[*idx] != *vid {
                continue 'outer;
            }
        }
        let values = keys
            .iter()
            .zip(key_indices.iter())
            .map(|(k, &idx)| (*k, tuple[idx]))
            .collect();
        rows.push(GroupRow { values, count: *count });
    }
    Some(rows)
}

/// Sorts rows by `(count, field-value-strings…)` lexicographically, ascending
/// or descending per `order`, and returns at most `limit` rows with `count >
/// 0`, rendered to display strings in the client's original key order.
pub fn finalize_group_rows(
    mut rows: Vec<GroupRow>,
    order: i32,
    limit: usize,
    dict: &Dictionaries,
) -> Vec<(Vec<(&'static str, String)>, i64)> {
    rows.retain(|r| r.count > 0);

    let sort_key = |r: &GroupRow| -> (i64, Vec<String>) {
        let strings = r
            .values
            .iter()
            .map(|(k, v)| field_value_to_string(*k, *v, dict))
            .collect();
        (r.count, strings)
    };

    rows.sort_by(|a, b| {
        let ord = sort_key(a).cmp(&sort_key(b));
        if order < 0 {
            ord.reverse()
        } else {
            ord
        }
    });

    rows.into_iter()
        .take(limit)
        .map(|r| {
            let values = r
                .values
                .iter()
                .map(|(k, v)| (k.name(), field_value_to_string(*k, *v, dict)))
                .collect();
            (values, r.count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Dictionaries;
    use crate::filter::ParseMode;
    use crate::group::GroupCache;
    use crate::index::IndexStorage;
    use crate::model::{Sex, Status};
    use crate::store::AccountStore;

    fn account(id: u32, sex: Sex, country_id: i8, interests: Vec<i8>) -> Account {
        Account {
            id,
            fname: String::new(),
            sname: String::new(),
            email: String::new(),
            phone: String::new(),
            sex,
            status: Status::Single,
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
            country_id,
            city_id: 0,
            has_premium_now: false,
        }
    }

    #[test]
    fn filter_plan_respects_limit_and_descending_order() {
        let store = AccountStore::new();
        store.put(account(1, Sex::Male, 5, vec![]));
        store.put(account(2, Sex::Male, 5, vec![]));
        store.put(account(3, Sex::Male, 7, vec![]));
        let index = IndexStorage::new();
        index.rebuild_from(&store);
        let dict = Dictionaries::new();
        let data = index.load();
        let ctx = FilterCtx {
            dict: &dict,
            index: &data,
            store: &store,
        };
        let filters = vec![Filter::SexEq(Sex::Male)];
        let results = execute_filter(&filters, 2, &ctx);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 3);
        assert_eq!(results[1].id, 2);
    }

    #[test]
    fn no_filter_cached_rewrite_matches_full_scan() {
        let store = AccountStore::new();
        store.put(account(1, Sex::Male, 5, vec![]));
        store.put(account(2, Sex::Female, 7, vec![]));
        let cache = GroupCache::new();
        cache.build(&store);
        let index = IndexStorage::new();
        index.rebuild_from(&store);
        let dict = Dictionaries::new();
        let data = index.load();
        let ctx = FilterCtx {
            dict: &dict,
            index: &data,
            store: &store,
        };

        let rows = execute_group(&[], &[GroupFieldKind::Sex], &ctx, &cache).unwrap();
        let total: i64 = rows.iter().map(|r| r.count).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn filter_as_extra_key_rewrite_agrees_with_full_scan() {
        let store = AccountStore::new();
        store.put(account(1, Sex::Male, 5, vec![]));
        store.put(account(2, Sex::Female, 5, vec![]));
        store.put(account(3, Sex::Male, 9, vec![]));
        let cache = GroupCache::new();
        cache.build(&store);
        let dict = Dictionaries::new();
        let country_id = dict.country.get_or_create("");
        let _ = country_id; // dictionary not used by country_id field directly here
        let index = IndexStorage::new();
        index.rebuild_from(&store);
        let data = index.load();
        let ctx = FilterCtx {
            dict: &dict,
            index: &data,
            store: &store,
        };

        let filters = vec![Filter::parse("sex", "eq", "m", ParseMode::Group, &dict).unwrap()];
        let rewritten = execute_group(&filters, &[GroupFieldKind::Country], &ctx, &cache).unwrap();
        let rewritten_total: i64 = rewritten.iter().map(|r| r.count).sum();
        assert_eq!(rewritten_total, 2);
    }
}
