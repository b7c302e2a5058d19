//! Integration tests for the Redis adapter.
//!
//! Runs the `RemoteStore` contract, the worker id claim and the two-tier
//! cache against a real Redis server. A container is started once for the
//! whole file; set `REDIS_URL` to use an existing server instead.
//!
//! ```bash
//! cargo test --test redis_store_tests -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

use kvcoord::remote::{RedisOptions, RemoteTtl};
use kvcoord::worker::WorkerIdOptions;
use kvcoord::{LocalStore, RedisStore, RemoteStore, TwoTierCache, WorkerIdClaimer};

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(Option<ContainerAsync<Redis>>, String)> = OnceCell::const_new();

async fn redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            if let Ok(url) = std::env::var("REDIS_URL") {
                return (None, url);
            }

            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");
            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (Some(container), url)
        })
        .await;

    url.clone()
}

async fn connect() -> RedisStore {
    let options = RedisOptions {
        addrs: vec![redis_url().await],
        ..RedisOptions::default()
    };
    RedisStore::connect(&options).await.expect("connect to redis")
}

fn expires_within(ttl: RemoteTtl, low: u64, high: u64) -> bool {
    match ttl {
        RemoteTtl::Expires(d) => (low..=high).contains(&d.as_secs()),
        _ => false,
    }
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_set_get_and_ttl_replies() {
    let store = connect().await;

    store.set("rs:plain", "v", None).await.unwrap();
    assert_eq!(store.get("rs:plain").await.unwrap().as_deref(), Some("v"));
    assert_eq!(store.ttl("rs:plain").await.unwrap(), RemoteTtl::Persistent);

    store
        .set("rs:expiring", "v", Some(Duration::from_secs(60)))
        .await
        .unwrap();
    assert!(expires_within(store.ttl("rs:expiring").await.unwrap(), 58, 60));

    store.del("rs:plain").await.unwrap();
    store.del("rs:expiring").await.unwrap();
    assert_eq!(store.ttl("rs:plain").await.unwrap(), RemoteTtl::Missing);
    assert!(store.get("rs:plain").await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_set_nx_only_writes_absent_keys() {
    let store = connect().await;
    store.del("rs:nx").await.unwrap();

    assert!(store
        .set_nx("rs:nx", "first", Some(Duration::from_secs(60)))
        .await
        .unwrap());
    assert!(!store
        .set_nx("rs:nx", "second", Some(Duration::from_secs(60)))
        .await
        .unwrap());

    assert_eq!(store.get("rs:nx").await.unwrap().as_deref(), Some("first"));
    assert!(expires_within(store.ttl("rs:nx").await.unwrap(), 58, 60));

    store.del("rs:nx").await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_expire_and_idempotent_del() {
    let store = connect().await;
    store.set("rs:expire", "v", None).await.unwrap();

    assert!(store
        .expire("rs:expire", Duration::from_secs(30))
        .await
        .unwrap());
    assert!(expires_within(store.ttl("rs:expire").await.unwrap(), 28, 30));
    assert!(!store
        .expire("rs:never-set", Duration::from_secs(30))
        .await
        .unwrap());

    store.del("rs:expire").await.unwrap();
    store.del("rs:expire").await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_connect_skips_unreachable_addresses() {
    let options = RedisOptions {
        addrs: vec!["127.0.0.1:1".to_string(), redis_url().await],
        connect_timeout: Duration::from_secs(2),
        ..RedisOptions::default()
    };

    let store = RedisStore::connect(&options).await.unwrap();

    assert_eq!(store.addr(), redis_url().await);
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_concurrent_claims_are_unique() {
    let remote: Arc<dyn RemoteStore> = Arc::new(connect().await);
    let options = WorkerIdOptions {
        prefix: "rs:claim".to_string(),
        bit_length: 2,
        worker_id: None,
    };
    for id in 0..4u16 {
        remote.del(&options.lease_key(id)).await.unwrap();
    }

    let claims = (0..4).map(|_| {
        let claimer = WorkerIdClaimer::new(Arc::clone(&remote), options.clone());
        tokio::spawn(async move { claimer.claim().await })
    });
    let mut ids = Vec::new();
    let mut leases = Vec::new();
    for handle in claims.collect::<Vec<_>>() {
        let lease = handle.await.unwrap().unwrap();
        ids.push(lease.worker_id());
        leases.push(lease);
    }
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1, 2, 3]);

    let late = WorkerIdClaimer::new(Arc::clone(&remote), options.clone());
    assert!(late.claim().await.is_err());

    for lease in leases {
        lease.stop();
    }
    for id in 0..4u16 {
        remote.del(&options.lease_key(id)).await.unwrap();
    }
}

#[tokio::test]
#[ignore] // Requires Docker or REDIS_URL
async fn test_two_tier_promotes_with_capped_ttl() {
    let remote: Arc<dyn RemoteStore> = Arc::new(connect().await);
    remote
        .set("rs:promote", "shared", Some(Duration::from_secs(1000)))
        .await
        .unwrap();
    let cache = TwoTierCache::new(
        LocalStore::new(Duration::from_secs(300), Duration::ZERO),
        Arc::clone(&remote),
    );

    assert_eq!(cache.get("rs:promote").await.unwrap(), "shared");

    let (_, expires_at) = cache.local().get_with_expiration("rs:promote").unwrap();
    let remaining = expires_at.unwrap() - chrono::Utc::now();
    assert!((590..=600).contains(&remaining.num_seconds()));

    cache.delete("rs:promote").await.unwrap();
    assert!(remote.get("rs:promote").await.unwrap().is_none());
}
