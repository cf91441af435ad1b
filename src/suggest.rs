//! Suggest engine (C9): collaborative filtering over the like-edge graph.

use std::collections::{HashMap, HashSet};

use crate::error::EngineResult;
use crate::model::Account;
use crate::recommend::LocationFilter;
use crate::store::AccountStore;

const SIMILARITY_EPSILON: f64 = 1e-6;

/// Accumulates `similarity[X] += 1/|Δt|` (or 1.0 under `SIMILARITY_EPSILON`)
/// over every account `X` who also liked something `me` liked, then emits
/// `X`'s own forward likes in descending id order, skipping anything `me`
/// already likes or that's already been emitted (§4.7).
pub fn suggest(
    me: &Account,
    limit: usize,
    location: &LocationFilter,
    store: &AccountStore,
) -> EngineResult<Vec<u32>> {
    let already_liked: HashSet<u32> = me.likes.iter().map(|e| e.id).collect();

    let mut similarity: HashMap<u32, f64> = HashMap::new();
    for my_edge in &me.likes {
        let Some(likee) = store.get(my_edge.id) else {
            continue;
        };
        for backward_edge in &likee.backward_likes {
            if backward_edge.id == me.id {
                continue;
            }
            let dt = (my_edge.ts - backward_edge.ts).abs() as f64;
            let contribution = if dt < SIMILARITY_EPSILON { 1.0 } else { 1.0 / dt };
            *similarity.entry(backward_edge.id).or_insert(0.0) += contribution;
        }
    }

    let mut ranked: Vec<(u32, f64)> = similarity.into_iter().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut results = Vec::new();
    let mut emitted: HashSet<u32> = HashSet::new();

    'outer: for (peer_id, _) in ranked {
        let Some(peer) = store.get(peer_id) else {
            continue;
        };
        if !location.matches(&peer) {
            continue;
        }
        let mut forward: Vec<u32> = peer.likes.iter().map(|e| e.id).collect();
        forward.sort_unstable_by(|a, b| b.cmp(a));
        for id in forward {
            if id == me.id || already_liked.contains(&id) || !emitted.insert(id) {
                continue;
            }
            results.push(id);
            if results.len() >= limit {
                break 'outer;
            }
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LikeEdge, Sex, Status};

    fn account(id: u32, sex: Sex) -> Account {
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
            interests: Vec::new(),
            email_domain: String::new(),
            birth_year_offset: 0,
            joined_year_offset: 0,
            country_id: 0,
            city_id: 0,
            has_premium_now: false,
        }
    }

    #[test]
    fn suggests_via_shared_likee_and_excludes_already_liked() {
        let store = AccountStore::new();
        let mut me = account(1, Sex::Male);
        me.likes.push(LikeEdge { id: 10, ts: 100 });
        store.put(me.clone());

        let mut other = account(2, Sex::Male);
        other.likes.push(LikeEdge { id: 10, ts: 101 });
        other.likes.push(LikeEdge { id: 20, ts: 50 });
        store.put(other);

        let mut likee = account(10, Sex::Female);
        likee.backward_likes.push(LikeEdge { id: 1, ts: 100 });
        likee.backward_likes.push(LikeEdge { id: 2, ts: 101 });
        store.put(likee);

        let mut target = account(20, Sex::Female);
        target.backward_likes.push(LikeEdge { id: 2, ts: 50 });
        store.put(target.clone());

        let results = suggest(&me, 10, &LocationFilter::None, &store).unwrap();
        assert_eq!(results, vec![20]);
    }
}
