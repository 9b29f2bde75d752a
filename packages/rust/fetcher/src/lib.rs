//! Bounded-concurrency HTTP fetcher with retries, per-host limits, and
//! cache short-circuiting.
//!
//! Given a list of fetch targets, [`Fetcher::fetch_all`] fans work out to a
//! semaphore-bounded worker pool (with a second, per-host semaphore so no
//! single documentation site is overwhelmed) and fans in one [`FetchResult`]
//! per target. Transient failures retry with exponential backoff plus
//! jitter; per-target failures are recorded, never fatal to the run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use reqwest::Client;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use docscout_cache::FetchCache;
use docscout_shared::{
    DocScoutError, FetchConfig, FetchResult, FetchStatus, FetchTarget, Result,
};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("DocScout/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// FetchSummary
// ---------------------------------------------------------------------------

/// Summary of a completed fetch fan-out.
#[derive(Debug, Clone)]
pub struct FetchSummary {
    /// Targets fetched successfully (including cache hits).
    pub fetched_ok: usize,
    /// Targets that ended in error or were cut off by the deadline.
    pub failed: usize,
    /// Results served from the URL cache.
    pub cache_hits: usize,
    /// Total duration of the fan-out.
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Concurrent fetcher for resolved documentation targets.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
    cache: Option<Arc<FetchCache>>,
    /// Lazily created per-host semaphores limiting concurrent requests.
    hosts: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl Fetcher {
    /// Create a new fetcher. `cache` is optional so `--no-cache` runs and
    /// tests can bypass persistence entirely.
    pub fn new(config: FetchConfig, cache: Option<Arc<FetchCache>>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocScoutError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            cache,
            hosts: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch every target, producing exactly one result per target.
    ///
    /// If `deadline` passes while fetches are in flight, the stragglers are
    /// aborted and recorded as [`FetchStatus::Timeout`]; completed results
    /// are always retained.
    #[instrument(skip_all, fields(targets = targets.len()))]
    pub async fn fetch_all(
        &self,
        targets: &[FetchTarget],
        deadline: Option<tokio::time::Instant>,
    ) -> (FetchSummary, Vec<FetchResult>) {
        let start = std::time::Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency as usize));
        let mut join_set: JoinSet<FetchResult> = JoinSet::new();

        info!(
            concurrency = self.config.concurrency,
            per_host = self.config.per_host_concurrency,
            timeout_secs = self.config.timeout_secs,
            "starting fetch fan-out"
        );

        for target in targets.iter().cloned() {
            let sem = semaphore.clone();
            let host_sem = self.host_semaphore(&target).await;
            let client = self.client.clone();
            let cache = self.cache.clone();
            let config = self.config.clone();

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await.expect("semaphore closed");
                let _host_permit = host_sem.acquire_owned().await.expect("semaphore closed");
                fetch_one(&client, cache.as_deref(), &config, target).await
            });
        }

        let mut results: Vec<FetchResult> = Vec::with_capacity(targets.len());

        loop {
            let next = match deadline {
                Some(d) => match tokio::time::timeout_at(d, join_set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            pending = join_set.len(),
                            "run deadline reached, aborting in-flight fetches"
                        );
                        break;
                    }
                },
                None => join_set.join_next().await,
            };

            match next {
                Some(Ok(result)) => results.push(result),
                Some(Err(e)) => warn!(error = %e, "fetch task failed"),
                None => break,
            }
        }

        // Abort stragglers and drain anything that finished before the abort
        // landed.
        join_set.abort_all();
        while let Some(joined) = join_set.join_next().await {
            if let Ok(result) = joined {
                results.push(result);
            }
        }

        // Every target gets a result: the aborted ones are recorded as
        // deadline timeouts.
        for target in targets {
            let covered = results
                .iter()
                .any(|r| r.target.url == target.url);
            if !covered {
                results.push(FetchResult {
                    target: target.clone(),
                    status: FetchStatus::Timeout,
                    raw_content: None,
                    fetched_at: Utc::now(),
                    attempt_count: 0,
                    error_detail: Some("run deadline exceeded".into()),
                    from_cache: false,
                });
            }
        }

        let summary = FetchSummary {
            fetched_ok: results.iter().filter(|r| r.is_ok()).count(),
            failed: results.iter().filter(|r| !r.is_ok()).count(),
            cache_hits: results.iter().filter(|r| r.from_cache).count(),
            duration: start.elapsed(),
        };

        info!(
            fetched_ok = summary.fetched_ok,
            failed = summary.failed,
            cache_hits = summary.cache_hits,
            duration_ms = summary.duration.as_millis(),
            "fetch fan-out complete"
        );

        (summary, results)
    }

    /// Get or create the semaphore bounding concurrency for a target's host.
    async fn host_semaphore(&self, target: &FetchTarget) -> Arc<Semaphore> {
        let host = target.url.host_str().unwrap_or("").to_string();
        let mut hosts = self.hosts.lock().await;
        hosts
            .entry(host)
            .or_insert_with(|| {
                Arc::new(Semaphore::new(self.config.per_host_concurrency as usize))
            })
            .clone()
    }
}

// ---------------------------------------------------------------------------
// Single-target fetch
// ---------------------------------------------------------------------------

/// Fetch one target: cache lookup, then GET with retry/backoff.
/// Never fails — every outcome is folded into the returned result.
async fn fetch_one(
    client: &Client,
    cache: Option<&FetchCache>,
    config: &FetchConfig,
    target: FetchTarget,
) -> FetchResult {
    let url = target.url.clone();

    if config.use_cache {
        if let Some(cache) = cache {
            let ttl = Duration::from_secs(config.cache_ttl_hours * 3600);
            match cache.get(url.as_str(), ttl).await {
                Ok(Some(entry)) => {
                    debug!(%url, "serving from cache");
                    return FetchResult {
                        target,
                        status: FetchStatus::Ok,
                        raw_content: Some(entry.content),
                        fetched_at: entry.stored_at,
                        attempt_count: 0,
                        error_detail: None,
                        from_cache: true,
                    };
                }
                Ok(None) => {}
                Err(e) => warn!(%url, error = %e, "cache read failed, fetching from network"),
            }
        }
    }

    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;
    let mut last_error = String::from("no attempts made");

    while attempt < max_attempts {
        attempt += 1;
        debug!(%url, attempt, "fetching");

        match attempt_get(client, url.as_str()).await {
            Ok(body) => {
                let now = Utc::now();
                if config.use_cache {
                    if let Some(cache) = cache {
                        if let Err(e) = cache.put(url.as_str(), &body).await {
                            warn!(%url, error = %e, "cache write failed");
                        }
                    }
                }
                return FetchResult {
                    target,
                    status: FetchStatus::Ok,
                    raw_content: Some(body),
                    fetched_at: now,
                    attempt_count: attempt,
                    error_detail: None,
                    from_cache: false,
                };
            }
            Err(err) => {
                last_error = err.detail;
                if !err.transient || attempt == max_attempts {
                    break;
                }
                let delay = backoff_delay(config, attempt);
                debug!(%url, attempt, delay_ms = delay.as_millis(), error = %last_error, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }

    warn!(%url, attempts = attempt, error = %last_error, "fetch failed");
    FetchResult {
        target,
        status: FetchStatus::Error,
        raw_content: None,
        fetched_at: Utc::now(),
        attempt_count: attempt,
        error_detail: Some(last_error),
        from_cache: false,
    }
}

/// One GET attempt, classified as transient (retryable) or not.
struct AttemptError {
    transient: bool,
    detail: String,
}

async fn attempt_get(client: &Client, url: &str) -> std::result::Result<String, AttemptError> {
    let response = client.get(url).send().await.map_err(|e| AttemptError {
        transient: e.is_timeout() || e.is_connect(),
        detail: if e.is_timeout() {
            format!("{url}: request timed out")
        } else {
            format!("{url}: {e}")
        },
    })?;

    let status = response.status();

    if status.is_success() {
        return response.text().await.map_err(|e| AttemptError {
            // A broken body read usually means the connection dropped
            transient: true,
            detail: format!("{url}: body read failed: {e}"),
        });
    }

    // 429 and 5xx are transient; other 4xx fail immediately.
    let transient = status.as_u16() == 429 || status.is_server_error();
    Err(AttemptError {
        transient,
        detail: format!("{url}: HTTP {status}"),
    })
}

/// Exponential backoff with up to 50% uniform jitter.
fn backoff_delay(config: &FetchConfig, attempt: u32) -> Duration {
    let exp = config
        .backoff_factor
        .powi(attempt.saturating_sub(1) as i32);
    let base = config.backoff_base_ms as f64 * exp;
    let jitter = rand::rng().random_range(0.0..0.5);
    Duration::from_millis((base * (1.0 + jitter)) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docscout_shared::{ArchPattern, Category, Priority, ResearchRequest};
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> FetchConfig {
        FetchConfig {
            concurrency: 4,
            per_host_concurrency: 2,
            timeout_secs: 1,
            max_retries: 2,
            backoff_base_ms: 10,
            backoff_factor: 2.0,
            cache_ttl_hours: 24,
            use_cache: false,
        }
    }

    fn target_for(server_uri: &str, page: &str) -> FetchTarget {
        FetchTarget {
            url: Url::parse(&format!("{server_uri}{page}")).unwrap(),
            category: Category::CoreFramework,
            priority: Priority::Critical,
            origin: ResearchRequest {
                domain: "test".into(),
                pattern: ArchPattern::SimpleCrud,
            },
        }
    }

    #[tokio::test]
    async fn fetch_success_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>data docs</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(test_config(), None).unwrap();
        let targets = vec![target_for(&server.uri(), "/data/")];
        let (summary, results) = fetcher.fetch_all(&targets, None).await;

        assert_eq!(summary.fetched_ok, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].status, FetchStatus::Ok);
        assert_eq!(results[0].attempt_count, 1);
        assert_eq!(
            results[0].raw_content.as_deref(),
            Some("<html>data docs</html>")
        );
    }

    #[tokio::test]
    async fn transient_5xx_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky/"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(test_config(), None).unwrap();
        let targets = vec![target_for(&server.uri(), "/flaky/")];
        let (_, results) = fetcher.fetch_all(&targets, None).await;

        assert_eq!(results[0].status, FetchStatus::Ok);
        assert_eq!(results[0].attempt_count, 3);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(test_config(), None).unwrap();
        let targets = vec![target_for(&server.uri(), "/missing/")];
        let (summary, results) = fetcher.fetch_all(&targets, None).await;

        assert_eq!(summary.failed, 1);
        assert_eq!(results[0].status, FetchStatus::Error);
        assert_eq!(results[0].attempt_count, 1);
        assert!(results[0].error_detail.as_deref().unwrap().contains("404"));
    }

    #[tokio::test]
    async fn too_many_requests_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/limited/"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/limited/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok now"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(test_config(), None).unwrap();
        let targets = vec![target_for(&server.uri(), "/limited/")];
        let (_, results) = fetcher.fetch_all(&targets, None).await;

        assert_eq!(results[0].status, FetchStatus::Ok);
        assert_eq!(results[0].attempt_count, 2);
    }

    #[tokio::test]
    async fn repeated_timeouts_record_error_without_aborting_run() {
        let server = MockServer::start().await;
        // Slower than the 1s client timeout on every attempt
        Mock::given(method("GET"))
            .and(path("/slow/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("late")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(test_config(), None).unwrap();
        let targets = vec![
            target_for(&server.uri(), "/slow/"),
            target_for(&server.uri(), "/fast/"),
        ];
        let (summary, results) = fetcher.fetch_all(&targets, None).await;

        let slow = results
            .iter()
            .find(|r| r.target.url.path() == "/slow/")
            .unwrap();
        assert_eq!(slow.status, FetchStatus::Error);
        assert_eq!(slow.attempt_count, 3);
        assert!(slow.error_detail.as_deref().unwrap().contains("timed out"));

        let fast = results
            .iter()
            .find(|r| r.target.url.path() == "/fast/")
            .unwrap();
        assert_eq!(fast.status, FetchStatus::Ok);
        assert_eq!(summary.fetched_ok, 1);
    }

    #[tokio::test]
    async fn cache_hit_short_circuits_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cached/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("cache me"))
            .expect(1)
            .mount(&server)
            .await;

        let dir =
            std::env::temp_dir().join(format!("docscout-fetch-{}", uuid::Uuid::now_v7()));
        let cache = Arc::new(
            docscout_cache::FetchCache::open(&dir.join("cache.db"))
                .await
                .unwrap(),
        );

        let mut config = test_config();
        config.use_cache = true;
        let fetcher = Fetcher::new(config, Some(cache)).unwrap();
        let targets = vec![target_for(&server.uri(), "/cached/")];

        let (_, first) = fetcher.fetch_all(&targets, None).await;
        assert!(!first[0].from_cache);

        let (summary, second) = fetcher.fetch_all(&targets, None).await;
        assert!(second[0].from_cache);
        assert_eq!(second[0].attempt_count, 0);
        assert_eq!(second[0].raw_content.as_deref(), Some("cache me"));
        assert_eq!(summary.cache_hits, 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn deadline_aborts_in_flight_and_keeps_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hang/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("eventually")
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/quick/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&server)
            .await;

        let mut config = test_config();
        config.timeout_secs = 60; // per-request timeout must not fire first
        let fetcher = Fetcher::new(config, None).unwrap();
        let targets = vec![
            target_for(&server.uri(), "/hang/"),
            target_for(&server.uri(), "/quick/"),
        ];

        let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
        let (_, results) = fetcher.fetch_all(&targets, Some(deadline)).await;

        assert_eq!(results.len(), 2);
        let hung = results
            .iter()
            .find(|r| r.target.url.path() == "/hang/")
            .unwrap();
        assert_eq!(hung.status, FetchStatus::Timeout);
        assert_eq!(
            hung.error_detail.as_deref(),
            Some("run deadline exceeded")
        );

        let quick = results
            .iter()
            .find(|r| r.target.url.path() == "/quick/")
            .unwrap();
        assert_eq!(quick.status, FetchStatus::Ok);
    }

    #[test]
    fn backoff_grows_exponentially() {
        let config = FetchConfig {
            backoff_base_ms: 500,
            backoff_factor: 2.0,
            ..test_config()
        };
        let first = backoff_delay(&config, 1);
        let second = backoff_delay(&config, 2);
        let third = backoff_delay(&config, 3);

        // Jitter adds at most 50% on top of the exponential base
        assert!(first >= Duration::from_millis(500) && first < Duration::from_millis(750));
        assert!(second >= Duration::from_millis(1000) && second < Duration::from_millis(1500));
        assert!(third >= Duration::from_millis(2000) && third < Duration::from_millis(3000));
    }
}
