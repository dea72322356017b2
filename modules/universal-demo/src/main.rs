//! Renders a headlines page through a universal store.
//!
//! `converge` loads the headlines and their author once, so the render
//! settles. `cycle` refetches on every pass and is aborted.

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use universal_common::{
    thunk, Action, AsyncHandle, Dispatch, Dispatched, RenderConfig, Settlement,
    StoreError,
};
use universal_engine::{apply_middleware, UniversalStore};
use universal_store::{from_fn, Middleware, Store, ThunkMiddleware};

#[derive(Parser)]
#[command(name = "universal-demo")]
#[command(about = "Render a page until its async data has settled")]
struct Cli {
    /// Which page behaviour to render
    #[arg(value_enum, default_value_t = Scenario::Converge)]
    scenario: Scenario,

    /// Abort after this many passes (overrides UNIVERSAL_MAX_PASSES)
    #[arg(long)]
    max_passes: Option<u32>,

    /// Simulated API latency in milliseconds
    #[arg(long, default_value_t = 25)]
    latency_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    Converge,
    Cycle,
}

#[derive(Debug, Clone, Default)]
struct Page {
    headlines: Option<Vec<String>>,
    authors: BTreeMap<String, String>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum PageEvent {
    #[serde(rename = "FETCH_HEADLINES")]
    FetchHeadlines,
    #[serde(rename = "HEADLINES_LOADED")]
    HeadlinesLoaded { headlines: Vec<String> },
    #[serde(rename = "FETCH_AUTHOR")]
    FetchAuthor { slug: String },
    #[serde(rename = "AUTHOR_LOADED")]
    AuthorLoaded { slug: String, name: String },
}

fn reduce(page: &mut Page, action: &Value) {
    match action["type"].as_str() {
        Some("HEADLINES_LOADED") => {
            let headlines = action["headlines"]
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            page.headlines = Some(headlines);
        }
        Some("AUTHOR_LOADED") => {
            if let (Some(slug), Some(name)) = (action["slug"].as_str(), action["name"].as_str()) {
                page.authors.insert(slug.to_string(), name.to_string());
            }
        }
        _ => {}
    }
}

/// Answers FETCH_* actions with a handle that dispatches the loaded data
/// back into the store after `latency`.
fn fake_api(latency: Duration) -> Arc<dyn Middleware<Page>> {
    from_fn::<Page, _>("fake_api", move |store, action, next| {
        let reply = match action.as_record().and_then(|record| record["type"].as_str()) {
            Some("FETCH_HEADLINES") => PageEvent::HeadlinesLoaded {
                headlines: vec![
                    "Library extends weekend hours".to_string(),
                    "Night market returns to the river".to_string(),
                ],
            },
            Some("FETCH_AUTHOR") => {
                let slug = action
                    .as_record()
                    .and_then(|record| record["slug"].as_str())
                    .unwrap_or_default()
                    .to_string();
                let name = format!("{slug} (staff)");
                PageEvent::AuthorLoaded { slug, name }
            }
            _ => return next.run(action),
        };

        next.run(action)?;
        Ok(Dispatched::Pending(AsyncHandle::new(respond(
            store.clone(),
            latency,
            reply,
        ))))
    })
}

async fn respond(store: Store<Page>, latency: Duration, reply: PageEvent) -> Settlement {
    tokio::time::sleep(latency).await;
    let action = Action::from_event(&reply).map_err(anyhow::Error::from)?;
    store.dispatch(action).map_err(anyhow::Error::from)?;
    Ok(json!({"delivered": true}))
}

fn fetch_author() -> Action {
    thunk!(|dispatch: &dyn Dispatch| {
        let action = Action::from_event(&PageEvent::FetchAuthor {
            slug: "editor".to_string(),
        })
        .map_err(|e| StoreError::stage("fetch_author", e))?;
        dispatch.dispatch(action)
    })
}

/// Fetches whatever the page is missing, then renders what it has.
fn render_page(store: &UniversalStore<Page>, title: &str) -> Result<String> {
    let page = store.state();

    if page.headlines.is_none() {
        store.dispatch(Action::from_event(&PageEvent::FetchHeadlines)?)?;
    } else if !page.authors.contains_key("editor") {
        store.dispatch(fetch_author())?;
    }

    let mut html = format!("<h1>{title}</h1>\n");
    match &page.headlines {
        Some(headlines) => {
            for headline in headlines {
                html.push_str(&format!("<li>{headline}</li>\n"));
            }
        }
        None => html.push_str("<p>loading headlines</p>\n"),
    }
    if let Some(editor) = page.authors.get("editor") {
        html.push_str(&format!("<footer>Edited by {editor}</footer>\n"));
    }
    Ok(html)
}

/// Ignores the store and refetches every pass.
fn render_forgetful(store: &UniversalStore<Page>, title: &str) -> Result<String> {
    store.dispatch(Action::from_event(&PageEvent::FetchHeadlines)?)?;
    Ok(format!("<h1>{title}</h1>\n<p>loading headlines</p>\n"))
}

fn build_store(config: RenderConfig, latency: Duration) -> UniversalStore<Page> {
    apply_middleware(vec![Arc::new(ThunkMiddleware)])
        .with(fake_api(latency))
        .with_config(config)
        .create_store(reduce, Page::default())
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("universal=info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = RenderConfig::from_env()?;
    if let Some(limit) = cli.max_passes {
        anyhow::ensure!(limit > 0, "--max-passes must be positive");
        config = config.with_max_passes(limit);
    }
    config.log_summary();

    let store = build_store(config, Duration::from_millis(cli.latency_ms));
    info!(stages = ?store.middleware_names(), "Store ready");

    let result = match cli.scenario {
        Scenario::Converge => {
            store
                .render_universal(|title: &str| render_page(&store, title), "Today")
                .await
        }
        Scenario::Cycle => {
            store
                .render_universal(|title: &str| render_forgetful(&store, title), "Today")
                .await
        }
    };

    match result {
        Ok(rendered) => {
            info!(passes = rendered.passes, "Page rendered");
            print!("{}", rendered.output);
            Ok(())
        }
        Err(failure) => {
            warn!(passes = failure.passes, "Page render aborted");
            if !failure.output.is_empty() {
                println!("--- last output ---\n{}", failure.output);
            }
            Err(failure.into())
        }
    }
}
