//! End-to-end tests: a real store, tracked middleware and `render_universal`.
//! Async work dispatches its own result back into the store when it settles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{json, Value};
use universal_common::{
    thunk, Action, AsyncHandle, Dispatch, Dispatched, RenderConfig, Settlement,
};
use universal_engine::{apply_middleware, RenderError, UniversalStore};
use universal_store::{from_fn, Middleware, Store, ThunkMiddleware};

// ---------------------------------------------------------------------------
// Test app: a user directory loaded over a fake API
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Directory {
    users: BTreeMap<u64, String>,
    loading: BTreeSet<u64>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum DirectoryEvent {
    #[serde(rename = "LOAD_USER")]
    LoadUser { id: u64, delay_ms: u64 },
    #[serde(rename = "USER_LOADED")]
    UserLoaded { id: u64, name: String },
}

fn load_user(id: u64, delay_ms: u64) -> Action {
    Action::from_event(&DirectoryEvent::LoadUser { id, delay_ms }).unwrap()
}

fn reducer(state: &mut Directory, action: &Value) {
    let id = action["id"].as_u64().unwrap_or_default();
    match action["type"].as_str() {
        Some("LOAD_USER") => {
            state.loading.insert(id);
        }
        Some("USER_LOADED") => {
            state.loading.remove(&id);
            let name = action["name"].as_str().unwrap_or_default().to_string();
            state.users.insert(id, name);
        }
        _ => {}
    }
}

/// Passes LOAD_USER on (marking it loading), then answers with a handle that
/// dispatches USER_LOADED after the requested delay.
fn fake_api() -> Arc<dyn Middleware<Directory>> {
    from_fn::<Directory, _>("fake_api", |store, action, next| {
        let Some(("LOAD_USER", id, delay_ms)) = action.as_record().and_then(|record| {
            Some((
                record["type"].as_str()?,
                record["id"].as_u64()?,
                record["delay_ms"].as_u64()?,
            ))
        }) else {
            return next.run(action);
        };

        next.run(action)?;
        Ok(Dispatched::Pending(AsyncHandle::new(deliver(
            store.clone(),
            id,
            delay_ms,
        ))))
    })
}

async fn deliver(store: Store<Directory>, id: u64, delay_ms: u64) -> Settlement {
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    let loaded = DirectoryEvent::UserLoaded {
        id,
        name: format!("user-{id}"),
    };
    let action = Action::from_event(&loaded).map_err(anyhow::Error::from)?;
    store.dispatch(action).map_err(anyhow::Error::from)?;
    Ok(json!({"id": id}))
}

fn directory_store(stages: Vec<Arc<dyn Middleware<Directory>>>) -> UniversalStore<Directory> {
    apply_middleware(stages)
        .with_config(RenderConfig::default().with_color(false))
        .create_store(reducer, Directory::default())
}

fn markup(state: &Directory, ids: &[u64]) -> String {
    ids.iter()
        .map(|id| match state.users.get(id) {
            Some(name) => format!("<li>{name}</li>"),
            None => "<li>loading</li>".to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Store surface
// ---------------------------------------------------------------------------

#[test]
fn passed_middleware_is_applied() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = {
        let hits = hits.clone();
        from_fn::<Directory, _>("counter", move |_store, action, next| {
            hits.fetch_add(1, Ordering::SeqCst);
            next.run(action)
        })
    };
    let store = directory_store(vec![counter]);

    store.dispatch(Action::of_type("DO_SOMETHING")).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(store.middleware_names(), vec!["counter"]);
}

#[tokio::test]
async fn store_without_async_work_renders_once() {
    let store = directory_store(vec![]);

    let rendered = store
        .render_universal(|title: &str| -> anyhow::Result<String> { Ok(format!("<h1>{title}</h1>")) }, "home")
        .await
        .unwrap();

    assert_eq!(rendered.output, "<h1>home</h1>");
    assert_eq!(rendered.passes, 1);
}

// ---------------------------------------------------------------------------
// Converging renders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn waits_for_dispatched_work_before_resolving() {
    let store = directory_store(vec![fake_api()]);
    let ids = [1u64];

    let render = |ids: &[u64]| -> anyhow::Result<String> {
        let (html, missing) = store.with_state(|state| {
            let missing: Vec<u64> = ids
                .iter()
                .copied()
                .filter(|id| !state.users.contains_key(id) && !state.loading.contains(id))
                .collect();
            (markup(state, ids), missing)
        });
        for id in missing {
            store.dispatch(load_user(id, 10))?;
        }
        Ok(html)
    };

    let rendered = store.render_universal(render, &ids[..]).await.unwrap();

    assert_eq!(rendered.output, "<li>user-1</li>");
    assert_eq!(rendered.passes, 2);
    assert!(store.registry().list_active().is_empty());
}

#[tokio::test]
async fn parallel_loads_rerender_once_per_settlement() {
    let store = directory_store(vec![fake_api()]);
    let ids = [1u64, 2];

    let render = |ids: &[u64]| -> anyhow::Result<String> {
        let (html, missing) = store.with_state(|state| {
            let missing: Vec<u64> = ids
                .iter()
                .copied()
                .filter(|id| !state.users.contains_key(id) && !state.loading.contains(id))
                .collect();
            (markup(state, ids), missing)
        });
        for id in missing {
            store.dispatch(load_user(id, 5 + id * 20))?;
        }
        Ok(html)
    };

    let rendered = store.render_universal(render, &ids[..]).await.unwrap();

    assert_eq!(rendered.output, "<li>user-1</li><li>user-2</li>");
    assert_eq!(rendered.passes, 3);
    assert!(store.registry().is_empty());
    assert!(store.state().loading.is_empty());
}

#[tokio::test]
async fn thunks_dispatched_during_render_are_awaited() {
    let store = directory_store(vec![Arc::new(ThunkMiddleware), fake_api()]);
    let fetched = Arc::new(AtomicU32::new(0));

    let render = |_: &()| -> anyhow::Result<String> {
        let loaded = store.with_state(|state| state.users.get(&7).cloned());
        match loaded {
            Some(name) => Ok(format!("<p>{name}</p>")),
            None if fetched.fetch_add(1, Ordering::SeqCst) == 0 => {
                store.dispatch(thunk!(|dispatch: &dyn Dispatch| dispatch.dispatch(load_user(7, 5))))?;
                Ok("<p>loading</p>".to_string())
            }
            None => Ok("<p>loading</p>".to_string()),
        }
    };

    let rendered = store.render_universal(render, &()).await.unwrap();

    assert_eq!(rendered.output, "<p>user-7</p>");
    assert_eq!(rendered.passes, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn work_settled_during_the_pass_still_gets_a_rerender() {
    let store = directory_store(vec![fake_api()]);
    let ids = [1u64];

    // The load completes on another worker while this pass is still running.
    let render = |ids: &[u64]| -> anyhow::Result<String> {
        let (html, missing) = store.with_state(|state| {
            let missing: Vec<u64> = ids
                .iter()
                .copied()
                .filter(|id| !state.users.contains_key(id) && !state.loading.contains(id))
                .collect();
            (markup(state, ids), missing)
        });
        for id in missing {
            store.dispatch(load_user(id, 0))?;
            std::thread::sleep(Duration::from_millis(50));
        }
        Ok(html)
    };

    let rendered = store.render_universal(render, &ids[..]).await.unwrap();

    assert_eq!(rendered.output, "<li>user-1</li>");
    assert_eq!(rendered.passes, 2);
    assert!(store.registry().is_empty());
}

// ---------------------------------------------------------------------------
// Step-by-step loading: each pass requests the next step
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct Steps {
    requested: u64,
    done: u64,
}

fn step_reducer(state: &mut Steps, action: &Value) {
    let step = action["step"].as_u64().unwrap_or_default();
    match action["type"].as_str() {
        Some("STEP_LOADED") => state.done = step,
        Some(kind) if kind.starts_with("LOAD_STEP_") => state.requested = step,
        _ => {}
    }
}

fn load_step(step: u64) -> Action {
    Action::record(json!({"type": format!("LOAD_STEP_{step}"), "step": step}))
}

fn steps_api() -> Arc<dyn Middleware<Steps>> {
    from_fn::<Steps, _>("steps_api", |store, action, next| {
        let Some(step) = action
            .as_record()
            .filter(|record| {
                record["type"]
                    .as_str()
                    .is_some_and(|kind| kind.starts_with("LOAD_STEP_"))
            })
            .and_then(|record| record["step"].as_u64())
        else {
            return next.run(action);
        };

        next.run(action)?;
        Ok(Dispatched::Pending(AsyncHandle::new(finish_step(
            store.clone(),
            step,
        ))))
    })
}

async fn finish_step(store: Store<Steps>, step: u64) -> Settlement {
    tokio::time::sleep(Duration::from_millis(2)).await;
    store
        .dispatch(Action::record(json!({"type": "STEP_LOADED", "step": step})))
        .map_err(anyhow::Error::from)?;
    Ok(json!(step))
}

#[tokio::test]
async fn k_chained_loads_take_k_plus_one_passes() {
    const K: u64 = 4;
    let store = apply_middleware(vec![steps_api()]).create_store(step_reducer, Steps::default());

    let render = |_: &()| -> anyhow::Result<String> {
        let Steps { requested, done } = store.state();
        if requested == done && done < K {
            store.dispatch(load_step(done + 1))?;
        }
        Ok(format!("{done}/{K}"))
    };

    let rendered = store.render_universal(render, &()).await.unwrap();

    assert_eq!(rendered.output, format!("{K}/{K}"));
    assert_eq!(u64::from(rendered.passes), K + 1);
    assert!(store.registry().is_empty());
}

// ---------------------------------------------------------------------------
// Runaway renders
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refetching_every_pass_is_aborted() {
    let store = directory_store(vec![fake_api()]);
    let calls = AtomicU32::new(0);

    // Ignores the store and fetches on every pass.
    let render = |_: &()| -> anyhow::Result<String> {
        let pass = calls.fetch_add(1, Ordering::SeqCst) + 1;
        store.dispatch(load_user(u64::from(pass), 5))?;
        Ok(format!("pass {pass}"))
    };

    let failure = store.render_universal(render, &()).await.unwrap_err();

    assert_eq!(failure.output, "pass 2");
    assert_eq!(failure.passes, 2);
    match &failure.error {
        RenderError::CycleDetected { repeated, message } => {
            assert_eq!(repeated.len(), 1);
            assert!(message.contains("LOAD_USER"));
        }
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn registry_entries_settle_after_an_abort() {
    let store = directory_store(vec![fake_api()]);

    let render = |_: &()| -> anyhow::Result<String> {
        store.dispatch(load_user(1, 5))?;
        Ok(String::new())
    };
    store.render_universal(render, &()).await.unwrap_err();

    // The second pass's load is still in flight; it settles on its own.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.registry().list_active().is_empty());
    assert!(store.state().users.contains_key(&1));
}
