//! End-to-end pipeline behavior against a scripted fetcher.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use url::Url;

use crawlpace::config::{BackoffConfig, CrawlConfig};
use crawlpace::error::FetchError;
use crawlpace::models::{FetchOutcome, PageResponse};
use crawlpace::pipeline::{CrawlPipeline, Fetcher};

#[derive(Clone, Copy)]
enum Step {
    Status(u16),
    Throttled(u16, &'static str),
    Fail,
}

/// Fetcher that replays a fixed sequence of results per URL, answering 200
/// once a script runs out.
struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
}

impl ScriptedFetcher {
    fn new(scripts: &[(&str, &[Step])]) -> Self {
        Self {
            scripts: Mutex::new(
                scripts
                    .iter()
                    .map(|(url, steps)| (url.to_string(), steps.iter().copied().collect()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<PageResponse, FetchError> {
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|queue| queue.pop_front());
        match step.unwrap_or(Step::Status(200)) {
            Step::Status(status) => Ok(page(url, status, None)),
            Step::Throttled(status, retry_after) => Ok(page(url, status, Some(retry_after))),
            Step::Fail => Err(FetchError::Connect {
                url: url.to_string(),
                detail: "connection refused".to_string(),
            }),
        }
    }
}

fn page(url: &str, status: u16, retry_after: Option<&str>) -> PageResponse {
    let mut headers = HashMap::new();
    if let Some(value) = retry_after {
        headers.insert("retry-after".to_string(), value.to_string());
    }
    PageResponse {
        url: url.to_string(),
        status,
        headers,
        body: Vec::new(),
        fetched_at: Utc::now(),
    }
}

fn small_config(max_attempts: u32) -> CrawlConfig {
    CrawlConfig {
        backoff: BackoffConfig {
            max_attempts,
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn collect(mut rx: mpsc::Receiver<FetchOutcome>) -> Vec<FetchOutcome> {
    let mut outcomes = Vec::new();
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }
    outcomes
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_throttling() {
    let fetcher = ScriptedFetcher::new(&[(
        "https://slow.example/page",
        &[Step::Status(429), Step::Status(429), Step::Status(200)][..],
    )]);
    let pipeline = CrawlPipeline::new(small_config(5), Arc::new(fetcher));
    let controller = pipeline.controller();
    let slots = pipeline.slots();

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(pipeline.run(
        vec![Url::parse("https://slow.example/page").unwrap()],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        FetchOutcome::Delivered(response) => assert_eq!(response.status, 200),
        other => panic!("expected delivered outcome, got {other:?}"),
    }

    // Two bumps then one success decay leave the domain at penalty 1,
    // with its slot paced at the matching delay.
    assert_eq!(controller.penalties().await["slow.example"], 1);
    let delay = slots.delays().await["slow.example"];
    assert_eq!(delay, Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_the_retry_budget() {
    let fetcher = ScriptedFetcher::new(&[(
        "https://down.example/page",
        &[Step::Status(503), Step::Status(503), Step::Status(503)][..],
    )]);
    let pipeline = CrawlPipeline::new(small_config(2), Arc::new(fetcher));

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(pipeline.run(
        vec![Url::parse("https://down.example/page").unwrap()],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        FetchOutcome::Exhausted {
            attempts,
            last_response: Some(last),
            last_error: None,
            ..
        } => {
            assert_eq!(*attempts, 2);
            assert_eq!(last.status, 503);
        }
        other => panic!("expected exhausted outcome, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retries_transport_failures() {
    let fetcher = ScriptedFetcher::new(&[(
        "https://flaky.example/page",
        &[Step::Fail, Step::Fail, Step::Status(200)][..],
    )]);
    let pipeline = CrawlPipeline::new(small_config(5), Arc::new(fetcher));

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(pipeline.run(
        vec![Url::parse("https://flaky.example/page").unwrap()],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(matches!(
        &outcomes[0],
        FetchOutcome::Delivered(response) if response.status == 200
    ));
}

#[tokio::test(start_paused = true)]
async fn test_surfaces_transport_exhaustion_with_the_last_error() {
    let fetcher = ScriptedFetcher::new(&[(
        "https://dead.example/page",
        &[Step::Fail, Step::Fail][..],
    )]);
    let pipeline = CrawlPipeline::new(small_config(1), Arc::new(fetcher));

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(pipeline.run(
        vec![Url::parse("https://dead.example/page").unwrap()],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 1);
    match &outcomes[0] {
        FetchOutcome::Exhausted {
            attempts,
            last_response: None,
            last_error: Some(error),
            ..
        } => {
            assert_eq!(*attempts, 1);
            assert!(error.to_string().contains("connection failed"));
        }
        other => panic!("expected exhausted outcome, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_domain_does_not_slow_healthy_ones() {
    let fetcher = ScriptedFetcher::new(&[
        (
            "https://slow.example/a",
            &[Step::Status(429), Step::Status(429), Step::Status(200)][..],
        ),
        ("https://fast.example/b", &[Step::Status(200)][..]),
    ]);
    let pipeline = CrawlPipeline::new(small_config(5), Arc::new(fetcher));
    let controller = pipeline.controller();
    let slots = pipeline.slots();

    let (tx, rx) = mpsc::channel(8);
    let run = tokio::spawn(pipeline.run(
        vec![
            Url::parse("https://slow.example/a").unwrap(),
            Url::parse("https://fast.example/b").unwrap(),
        ],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes
        .iter()
        .all(|o| matches!(o, FetchOutcome::Delivered(r) if r.status == 200)));

    let penalties = controller.penalties().await;
    assert_eq!(penalties.get("slow.example"), Some(&1));
    assert_eq!(penalties.get("fast.example"), None);

    let delays = slots.delays().await;
    assert_eq!(delays["slow.example"], Duration::from_secs(1));
    // The healthy domain never saw a penalized delay.
    assert!(delays["fast.example"] <= Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_paces_the_domain_slot() {
    let fetcher = ScriptedFetcher::new(&[(
        "https://busy.example/page",
        &[Step::Throttled(429, "10"), Step::Status(200)][..],
    )]);
    let pipeline = CrawlPipeline::new(small_config(5), Arc::new(fetcher));
    let slots = pipeline.slots();

    let (tx, rx) = mpsc::channel(8);
    let started = tokio::time::Instant::now();
    let run = tokio::spawn(pipeline.run(
        vec![Url::parse("https://busy.example/page").unwrap()],
        tx,
    ));
    let outcomes = collect(rx).await;
    run.await.unwrap().unwrap();

    assert_eq!(outcomes.len(), 1);
    // The retry itself was parked for the advertised ten seconds.
    assert!(started.elapsed() >= Duration::from_secs(10));
    // The success afterwards relaxed the slot back to the base delay.
    assert_eq!(
        slots.delays().await["busy.example"],
        Duration::from_secs(1)
    );
}
