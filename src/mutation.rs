//! Mutation controller (C10): create/update/likes application, with
//! incremental group-cache and inverse-edge maintenance under the engine's
//! single-writer lock (§4.8). Validation always runs before any state is
//! touched, so a rejected write leaves the store untouched (§7).

use crate::dictionary::Dictionaries;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    get_email_domain, has_premium_now, year_offset_from_timestamp, Account, InterestId, LikeEdge,
    PremiumWindow, Sex, Status, CityId, CountryId, MAX_ACCOUNT_ID,
};
use crate::payload::{AccountPayload, LikeBatchItem};

fn parse_sex(s: &str) -> EngineResult<Sex> {
    Sex::from_str(s).ok_or_else(|| EngineError::BadRequest(format!("bad sex value: {s}")))
}

fn parse_status(s: &str) -> EngineResult<Status> {
    Status::from_str(s).ok_or_else(|| EngineError::BadRequest(format!("bad status value: {s}")))
}

fn resolve_interests(dict: &Dictionaries, names: &[String]) -> Vec<InterestId> {
    let mut ids: Vec<InterestId> = names
        .iter()
        .map(|n| dict.interest.get_or_create(n) as InterestId)
        .collect();
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
    ids
}

/// Builds the post-mutation `Account`. `existing` is `None` on create.
/// Any raw field absent from `payload` retains `existing`'s value; if there
/// is no `existing` and the field is mandatory, this is a `BadRequest` (only
/// reachable on create — `update` always has an `existing`).
pub(crate) fn build_account(
    id: u32,
    existing: Option<&Account>,
    payload: &AccountPayload,
    dict: &Dictionaries,
    now: i64,
) -> EngineResult<Account> {
    let fname = payload
        .fname
        .clone()
        .or_else(|| existing.map(|e| e.fname.clone()))
        .unwrap_or_default();
    let sname = payload
        .sname
        .clone()
        .or_else(|| existing.map(|e| e.sname.clone()))
        .unwrap_or_default();
    let phone = payload
        .phone
        .clone()
        .or_else(|| existing.map(|e| e.phone.clone()))
        .unwrap_or_default();
    let country = payload
        .country
        .clone()
        .or_else(|| existing.map(|e| e.country.clone()))
        .unwrap_or_default();
    let city = payload
        .city
        .clone()
        .or_else(|| existing.map(|e| e.city.clone()))
        .unwrap_or_default();

    let email = match &payload.email {
        Some(e) => e.clone(),
        None => existing
            .map(|e| e.email.clone())
            .ok_or_else(|| EngineError::BadRequest("email is required".into()))?,
    };

    let sex = match &payload.sex {
        Some(s) => parse_sex(s)?,
        None => existing
            .map(|e| e.sex)
            .ok_or_else(|| EngineError::BadRequest("sex is required".into()))?,
    };

    let status = match &payload.status {
        Some(s) => parse_status(s)?,
        None => existing
            .map(|e| e.status)
            .ok_or_else(|| EngineError::BadRequest("status is required".into()))?,
    };

    let birth = match payload.birth {
        Some(b) => b,
        None => existing
            .map(|e| e.birth)
            .ok_or_else(|| EngineError::BadRequest("birth is required".into()))?,
    };

    let joined = match payload.joined {
        Some(j) => j,
        None => existing
            .map(|e| e.joined)
            .ok_or_else(|| EngineError::BadRequest("joined is required".into()))?,
    };

    // Double-option: absent key keeps the previous premium window; an
    // explicit `null` clears it; an object replaces it.
    let premium = match &payload.premium {
        Some(Some(p)) => Some(PremiumWindow {
            start: p.start,
            finish: p.finish,
        }),
        Some(None) => None,
        None => existing.and_then(|e| e.premium),
    };

    let country_id = dict.country.get_or_create(&country) as CountryId;
    let city_id = dict.city.get_or_create(&city) as CityId;

    let interests = match &payload.interests {
        Some(names) => resolve_interests(dict, names),
        None => existing.map(|e| e.interests.clone()).unwrap_or_default(),
    };

    // A payload's `likes` list is additive, appended to whatever forward
    // likes the account already has — never a full replace (§4.8).
    let mut likes = existing.map(|e| e.likes.clone()).unwrap_or_default();
    if let Some(items) = &payload.likes {
        for item in items {
            likes.push(LikeEdge {
                id: item.id,
                ts: item.ts,
            });
        }
    }

    let backward_likes = existing.map(|e| e.backward_likes.clone()).unwrap_or_default();

    let email_domain = get_email_domain(&email);
    let birth_year_offset = year_offset_from_timestamp(birth);
    let joined_year_offset = year_offset_from_timestamp(joined);
    let premium_now = has_premium_now(premium, now);

    Ok(Account {
        id,
        fname,
        sname,
        email,
        phone,
        sex,
        status,
        country,
        city,
        birth,
        joined,
        premium,
        likes,
        backward_likes,
        interests,
        email_domain,
        birth_year_offset,
        joined_year_offset,
        country_id,
        city_id,
        has_premium_now: premium_now,
    })
}

/// Create (§4.8). Expects a non-existent id in `[1, MAX_ID]`.
pub fn apply_create(engine: &Engine, id: u32, payload: &AccountPayload) -> EngineResult<()> {
    if id == 0 || id > MAX_ACCOUNT_ID {
        return Err(EngineError::BadRequest(format!("id out of range: {id}")));
    }

    engine.with_writer_lock(|| {
        if engine.store.exists(id) {
            return Err(EngineError::BadRequest(format!(
                "account {id} already exists"
            )));
        }
        let email = payload
            .email
            .clone()
            .ok_or_else(|| EngineError::BadRequest("email is required".into()))?;
        if engine.emails.read().contains(&email) {
            return Err(EngineError::BadRequest(format!(
                "email already in use: {email}"
            )));
        }

        let account = build_account(id, None, payload, &engine.dict, engine.now)?;

        let backward_targets: Vec<(u32, LikeEdge)> = account
            .likes
            .iter()
            .filter(|e| engine.store.exists(e.id))
            .map(|e| (e.id, LikeEdge { id, ts: e.ts }))
            .collect();

        engine.emails.write().insert(account.email.clone());
        engine.store.put(account.clone());
        for (target_id, edge) in backward_targets {
            if let Some(t) = engine.store.get(target_id) {
                let mut updated = (*t).clone();
                updated.backward_likes.push(edge);
                engine.store.put(updated);
            }
        }
        engine.group_cache.apply_delta(&account, 1);
        Ok(())
    })
}

/// Update (§4.8). `id` must already exist.
pub fn apply_update(engine: &Engine, id: u32, payload: &AccountPayload) -> EngineResult<()> {
    engine.with_writer_lock(|| {
        let existing = engine
            .store
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("account {id} not found")))?;

        if let Some(new_email) = &payload.email {
            if *new_email != existing.email && engine.emails.read().contains(new_email) {
                return Err(EngineError::BadRequest(format!(
                    "email already in use: {new_email}"
                )));
            }
        }

        let updated = build_account(id, Some(&existing), payload, &engine.dict, engine.now)?;

        let backward_targets: Vec<(u32, LikeEdge)> = payload
            .likes
            .as_ref()
            .map(|items| {
                items
                    .iter()
                    .filter(|item| engine.store.exists(item.id))
                    .map(|item| (item.id, LikeEdge { id, ts: item.ts }))
                    .collect()
            })
            .unwrap_or_default();

        engine.group_cache.apply_delta(&existing, -1);

        if let Some(new_email) = &payload.email {
            if *new_email != existing.email {
                let mut emails = engine.emails.write();
                emails.remove(&existing.email);
                emails.insert(new_email.clone());
            }
        }

        engine.store.put(updated.clone());
        for (target_id, edge) in backward_targets {
            if let Some(t) = engine.store.get(target_id) {
                let mut u = (*t).clone();
                u.backward_likes.push(edge);
                engine.store.put(u);
            }
        }
        engine.group_cache.apply_delta(&updated, 1);
        Ok(())
    })
}

/// Likes batch (§4.8): every (liker, likee) pair must reference a live
/// account; validated in full before any edge is appended.
pub fn apply_likes_batch(engine: &Engine, items: &[LikeBatchItem]) -> EngineResult<()> {
    engine.with_writer_lock(|| {
        for item in items {
            if !engine.store.exists(item.liker) {
                return Err(EngineError::BadRequest(format!(
                    "unknown liker id {}",
                    item.liker
                )));
            }
            if !engine.store.exists(item.likee) {
                return Err(EngineError::BadRequest(format!(
                    "unknown likee id {}",
                    item.likee
                )));
            }
        }

        for item in items {
            if let Some(liker) = engine.store.get(item.liker) {
                let mut u = (*liker).clone();
                u.likes.push(LikeEdge {
                    id: item.likee,
                    ts: item.ts,
                });
                engine.store.put(u);
            }
            if let Some(likee) = engine.store.get(item.likee) {
                let mut u = (*likee).clone();
                u.backward_likes.push(LikeEdge {
                    id: item.liker,
                    ts: item.ts,
                });
                engine.store.put(u);
            }
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::AccountsFile;

    fn payload(json: &str) -> AccountPayload {
        serde_json::from_str(json).unwrap()
    }

    fn base_create_json(id: u32, email: &str) -> String {
        format!(
            r#"{{"id":{id},"email":"{email}","sex":"m","status":"свободны","birth":0,"joined":0}}"#
        )
    }

    #[test]
    fn create_rejects_duplicate_email() {
        let engine = Engine::new(1000);
        let p1 = payload(&base_create_json(1, "a@b.com"));
        apply_create(&engine, 1, &p1).unwrap();

        let p2 = payload(&base_create_json(2, "a@b.com"));
        let err = apply_create(&engine, 2, &p2).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert!(!engine.store.exists(2));
    }

    #[test]
    fn create_links_backward_edge_to_live_likee() {
        let engine = Engine::new(1000);
        apply_create(&engine, 1, &payload(&base_create_json(1, "a@b.com"))).unwrap();

        let p2 = payload(&format!(
            r#"{{"email":"c@d.com","sex":"f","status":"свободны","birth":0,"joined":0,"likes":[{{"id":1,"ts":500}}]}}"#
        ));
        apply_create(&engine, 2, &p2).unwrap();

        let likee = engine.store.get(1).unwrap();
        assert_eq!(likee.backward_likes.len(), 1);
        assert_eq!(likee.backward_likes[0].id, 2);
        assert_eq!(likee.backward_likes[0].ts, 500);
    }

    #[test]
    fn partial_update_preserves_unmentioned_fields() {
        let engine = Engine::new(1000);
        apply_create(
            &engine,
            1,
            &payload(&format!(
                r#"{{"email":"a@b.com","sex":"m","status":"свободны","birth":0,"joined":0,"fname":"Ann"}}"#
            )),
        )
        .unwrap();

        apply_update(&engine, 1, &payload(r#"{"status":"заняты"}"#)).unwrap();

        let a = engine.store.get(1).unwrap();
        assert_eq!(a.fname, "Ann");
        assert_eq!(a.status, Status::InRelationship);
        assert_eq!(a.email, "a@b.com");
    }

    #[test]
    fn update_rejects_email_already_used_by_another_account() {
        let engine = Engine::new(1000);
        apply_create(
            &engine,
            1,
            &payload(&base_create_json(1, "one@example.com")),
        )
        .unwrap();
        apply_create(
            &engine,
            2,
            &payload(&base_create_json(2, "two@example.com")),
        )
        .unwrap();

        let err = apply_update(&engine, 2, &payload(r#"{"email":"one@example.com"}"#)).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert_eq!(engine.store.get(2).unwrap().email, "two@example.com");
    }

    #[test]
    fn likes_batch_creates_both_directions() {
        let engine = Engine::new(1000);
        apply_create(&engine, 1, &payload(&base_create_json(1, "a@b.com"))).unwrap();
        apply_create(&engine, 2, &payload(&base_create_json(2, "c@d.com"))).unwrap();

        let items = vec![LikeBatchItem {
            liker: 1,
            likee: 2,
            ts: 1000,
        }];
        apply_likes_batch(&engine, &items).unwrap();

        let liker = engine.store.get(1).unwrap();
        let likee = engine.store.get(2).unwrap();
        assert_eq!(liker.likes[0].id, 2);
        assert_eq!(likee.backward_likes[0].id, 1);
    }

    #[test]
    fn likes_batch_rejects_unknown_id_without_mutating() {
        let engine = Engine::new(1000);
        apply_create(&engine, 1, &payload(&base_create_json(1, "a@b.com"))).unwrap();

        let items = vec![LikeBatchItem {
            liker: 1,
            likee: 999,
            ts: 1000,
        }];
        let err = apply_likes_batch(&engine, &items).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
        assert!(engine.store.get(1).unwrap().likes.is_empty());
    }

    #[test]
    fn loader_file_shape_parses() {
        let file: AccountsFile = serde_json::from_str(
            r#"{"accounts":[{"id":1,"email":"a@b.com","sex":"m","status":"свободны","birth":0,"joined":0}]}"#,
        )
        .unwrap();
        assert_eq!(file.accounts.len(), 1);
    }
}
