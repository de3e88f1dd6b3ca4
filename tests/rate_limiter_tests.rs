use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use loqa_subtitles::{ProviderId, RateLimitConfig, RateLimiter, TranslationError};
use tokio::time::Instant;

fn limiter(provider: ProviderId, max_per_minute: u32, min_interval_ms: u64) -> RateLimiter {
    RateLimiter::new(HashMap::from([(
        provider,
        RateLimitConfig::new(max_per_minute, min_interval_ms),
    )]))
}

#[tokio::test(start_paused = true)]
async fn test_request_over_window_cap_is_rejected() {
    let limiter = limiter(ProviderId::Free, 3, 0);

    for _ in 0..3 {
        assert!(limiter.admit(ProviderId::Free).await.is_ok());
    }

    assert_eq!(
        limiter.admit(ProviderId::Free).await,
        Err(TranslationError::RateLimitExceeded(ProviderId::Free))
    );

    // Rejections do not consume a slot
    assert_eq!(limiter.recent_requests(ProviderId::Free).await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_window_slides() {
    let limiter = limiter(ProviderId::Free, 2, 0);

    limiter.admit(ProviderId::Free).await.unwrap();
    limiter.admit(ProviderId::Free).await.unwrap();
    assert!(limiter.admit(ProviderId::Free).await.is_err());

    tokio::time::advance(Duration::from_secs(60)).await;

    assert!(limiter.admit(ProviderId::Free).await.is_ok());
    assert_eq!(limiter.recent_requests(ProviderId::Free).await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_min_interval_delays_second_request() {
    let limiter = limiter(ProviderId::Prompt, 60, 1000);
    let start = Instant::now();

    limiter.admit(ProviderId::Prompt).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(10));

    limiter.admit(ProviderId::Prompt).await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(1000), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1100), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_admissions_are_spaced() {
    let limiter = Arc::new(limiter(ProviderId::Regional, 100, 500));
    let start = Instant::now();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.admit(ProviderId::Regional).await.unwrap();
                Instant::now()
            })
        })
        .collect();

    let mut finished = Vec::new();
    for handle in handles {
        finished.push(handle.await.unwrap().duration_since(start));
    }
    finished.sort();

    assert!(finished[0] < Duration::from_millis(10));
    assert!(finished[1] >= Duration::from_millis(500));
    assert!(finished[2] >= Duration::from_millis(1000));
}

#[tokio::test(start_paused = true)]
async fn test_unlimited_provider_is_admitted() {
    let limiter = limiter(ProviderId::Free, 1, 0);

    for _ in 0..10 {
        assert!(limiter.admit(ProviderId::Regional).await.is_ok());
    }
}

#[tokio::test(start_paused = true)]
async fn test_sweep_drops_expired_entries() {
    let limiter = limiter(ProviderId::Free, 10, 0);
    limiter.admit(ProviderId::Free).await.unwrap();
    limiter.admit(ProviderId::Free).await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;

    assert_eq!(limiter.sweep().await, 2);
    assert_eq!(limiter.recent_requests(ProviderId::Free).await, 0);
}
