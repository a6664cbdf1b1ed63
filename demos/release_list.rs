//! A screen that loads a repository's releases in the background
//!
//! Run with `RUST_LOG=handoff=debug cargo run --example release_list`

use handoff::prelude::*;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct Release {
    tag: String,
    name: String,
}

#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error("repository {0} not found")]
    NotFound(String),
}

// stands in for the network client
fn fetch_releases(owner: &str, repo: &str) -> std::result::Result<Vec<Release>, FetchError> {
    thread::sleep(Duration::from_millis(50));
    if repo == "missing" {
        return Err(FetchError::NotFound(format!("{}/{}", owner, repo)));
    }
    Ok((1..=3)
        .map(|i| Release {
            tag: format!("v{}.0", i),
            name: format!("{} release {}", repo, i),
        })
        .collect())
}

/// Loads the list; `on_success` plays the part of filling the adapter.
struct LoadReleases {
    owner: String,
    repo: String,
}

impl BackgroundJob for LoadReleases {
    type Output = Vec<Release>;

    fn run(&mut self, cx: &JobContext) -> std::result::Result<Vec<Release>, BoxError> {
        cx.checkpoint()?;
        Ok(fetch_releases(&self.owner, &self.repo)?)
    }

    fn on_success(self, releases: Vec<Release>) {
        println!("{}/{}: {} releases", self.owner, self.repo, releases.len());
        for release in releases {
            println!("  {:<6} {}", release.tag, release.name);
        }
    }

    fn on_failure(self, error: TaskError) {
        println!("{}/{}: {}", self.owner, self.repo, error);
    }
}

fn main() -> handoff::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::builder().num_threads(2).build()?;
    let (executor, mut main_loop) = Executor::new(config)?;

    let screen = Lifecycle::new();
    for repo in ["octodroid", "missing"] {
        executor.submit_bound(
            LoadReleases {
                owner: "slapperwan".into(),
                repo: repo.into(),
            },
            &screen,
        )?;
    }
    main_loop.run_until_idle();

    // leaving the screen before the load finishes: nothing is delivered
    let other = Lifecycle::new();
    executor.submit_bound(
        LoadReleases {
            owner: "slapperwan".into(),
            repo: "gh4a".into(),
        },
        &other,
    )?;
    drop(other);
    main_loop.run_until_idle();

    executor.shutdown();
    main_loop.run();

    let metrics = executor.metrics();
    println!(
        "delivered {} callbacks, {} cancelled, failure rate {:.2}",
        metrics.callbacks_delivered,
        metrics.tasks_cancelled,
        metrics.failure_rate()
    );
    Ok(())
}
