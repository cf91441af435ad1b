//! Startup loader (C14): reads `options.txt` for the `NOW` scalar and every
//! `*.json` file in the data directory (each shaped `{"accounts": [...]}`)
//! into a freshly built `Engine`, before the HTTP surface accepts any
//! connection. Unlike `mutation`, this runs single-threaded with no other
//! reader or writer in play, so it builds the store, dictionaries, email set,
//! indexes, and group cache directly instead of going through the
//! incremental write path.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::mutation::build_account;
use crate::payload::AccountsFile;

/// Reads the single integer scalar out of `options.txt` (the snapshot's
/// `NOW`, seconds since epoch). Missing file defaults to 0 — matching the
/// self-test entry point, which loads no data directory at all.
fn read_now(data_dir: &Path) -> EngineResult<i64> {
    let path = data_dir.join("options.txt");
    if !path.exists() {
        return Ok(0);
    }
    let raw = fs::read_to_string(&path)
        .map_err(|e| EngineError::Internal(format!("reading options.txt: {e}")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| EngineError::BadRequest(format!("options.txt is not a single integer: {raw:?}")))
}

/// Lists every `*.json` file directly under `data_dir`, sorted by name for
/// deterministic load order (tie-breaking only matters for diagnostics; the
/// loaded set is identical regardless of order).
fn list_account_files(data_dir: &Path) -> EngineResult<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    let entries = fs::read_dir(data_dir)
        .map_err(|e| EngineError::Internal(format!("reading data dir {data_dir:?}: {e}")))?;
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::Internal(format!("reading dir entry: {e}")))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Builds a fresh `Engine` from the accounts and interests dictionary CSV-less
/// `*.json` files in `data_dir`, plus `options.txt` for `NOW`. The returned
/// engine's store, dictionaries, email set, index, and group cache are all
/// populated; the caller still owns starting the rebuild scheduler and the
/// HTTP surface.
pub fn load(data_dir: &Path) -> EngineResult<Engine> {
    let now = read_now(data_dir)?;
    let engine = Engine::new(now);

    let mut emails: HashSet<String> = HashSet::new();
    for file_path in list_account_files(data_dir)? {
        let raw = fs::read_to_string(&file_path)
            .map_err(|e| EngineError::Internal(format!("reading {file_path:?}: {e}")))?;
        let parsed: AccountsFile = serde_json::from_str(&raw)
            .map_err(|e| EngineError::BadRequest(format!("parsing {file_path:?}: {e}")))?;

        for payload in &parsed.accounts {
            let id = payload
                .id
                .ok_or_else(|| EngineError::BadRequest(format!("account in {file_path:?} missing id")))?;
            if engine.store.exists(id) {
                return Err(EngineError::BadRequest(format!(
                    "duplicate account id {id} in {file_path:?}"
                )));
            }
            let email = payload
                .email
                .clone()
                .ok_or_else(|| EngineError::BadRequest(format!("account {id} missing email")))?;
            if !emails.insert(email.clone()) {
                return Err(EngineError::BadRequest(format!(
                    "duplicate email {email} for account {id}"
                )));
            }
            let account = build_account(id, None, payload, &engine.dict, engine.now)?;
            engine.store.put(account);
        }
    }

    // Backward edges: every forward like to a live account gets a matching
    // backward edge, built once over the full, now-complete store rather than
    // incrementally per file (avoids forward-reference ordering problems
    // between files).
    let mut backward: std::collections::HashMap<u32, Vec<crate::model::LikeEdge>> =
        std::collections::HashMap::new();
    engine.store.for_each(|a| {
        for edge in &a.likes {
            if engine.store.exists(edge.id) {
                backward
                    .entry(edge.id)
                    .or_default()
                    .push(crate::model::LikeEdge { id: a.id, ts: edge.ts });
            }
        }
    });
    for (id, edges) in backward {
        if let Some(existing) = engine.store.get(id) {
            let mut updated = (*existing).clone();
            updated.backward_likes = edges;
            engine.store.put(updated);
        }
    }

    *engine.emails.write() = emails;
    engine.group_cache.build(&engine.store);
    engine.index.rebuild_from(&engine.store);

    Ok(engine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = fs::File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn loads_accounts_and_wires_backward_edges() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "options.txt", "1000\n");
        write_file(
            dir.path(),
            "accounts_1.json",
            r#"{"accounts":[
                {"id":1,"email":"a@b.com","sex":"m","status":"свободны","birth":0,"joined":0,"likes":[{"id":2,"ts":10}]},
                {"id":2,"email":"c@d.com","sex":"f","status":"свободны","birth":0,"joined":0}
            ]}"#,
        );

        let engine = load(dir.path()).unwrap();
        assert_eq!(engine.now, 1000);
        assert!(engine.store.exists(1));
        let likee = engine.store.get(2).unwrap();
        assert_eq!(likee.backward_likes.len(), 1);
        assert_eq!(likee.backward_likes[0].id, 1);
        assert!(engine.emails.read().contains("a@b.com"));
    }

    #[test]
    fn rejects_duplicate_email_across_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(
            dir.path(),
            "a.json",
            r#"{"accounts":[{"id":1,"email":"dup@x.com","sex":"m","status":"свободны","birth":0,"joined":0}]}"#,
        );
        write_file(
            dir.path(),
            "b.json",
            r#"{"accounts":[{"id":2,"email":"dup@x.com","sex":"f","status":"свободны","birth":0,"joined":0}]}"#,
        );

        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }

    #[test]
    fn missing_options_file_defaults_now_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let engine = load(dir.path()).unwrap();
        assert_eq!(engine.now, 0);
    }
}
