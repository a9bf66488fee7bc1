use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use livethumb_core::{
    CacheReport, CacheStore, CacheWriter, CacheWriterSettings, ChannelFilter,
    FrameFile,
};

#[path = "support/mod.rs"]
mod support;

use support::MemoryStore;

fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

fn writer(stores: &[Arc<MemoryStore>], sample_rate: u64) -> CacheWriter {
    CacheWriter::new(
        stores
            .iter()
            .map(|store| store.clone() as Arc<dyn CacheStore>)
            .collect(),
        CacheWriterSettings {
            default_ttl: Duration::from_secs(60),
            sample_rate,
            filter: ChannelFilter::allow_all(),
        },
    )
}

fn frame(channel: &str, name: &str) -> FrameFile {
    FrameFile::from_path(format!("/srv/frames/{channel}/{name}")).unwrap()
}

#[tokio::test]
async fn index_only_holds_the_last_ttl_seconds() {
    let store = MemoryStore::named("a");
    let writer = writer(&[store.clone()], 1);

    for (i, ts) in [1_000, 1_030, 1_059, 1_060, 1_090, 1_125].into_iter().enumerate() {
        writer
            .write(&frame("cam", &format!("{i}.jpg")), at(ts), Bytes::from_static(b"x"))
            .await;
        let scores = store.scores("cam");
        let newest = *scores.last().unwrap();
        assert!(
            scores.iter().all(|score| *score > newest - 60),
            "stale entries survived at ts={ts}: {scores:?}"
        );
    }

    assert_eq!(store.scores("cam"), vec![1_090, 1_125]);
    assert_eq!(store.blob_count(), 6);
}

#[tokio::test]
async fn channel_ttl_override_narrows_the_window() {
    let store = MemoryStore::named("a");
    store.set_ttl_override("cam", "10");
    let writer = writer(&[store.clone()], 1);

    for (i, ts) in [100, 105, 111].into_iter().enumerate() {
        writer
            .write(&frame("cam", &format!("{i}.jpg")), at(ts), Bytes::new())
            .await;
    }
    writer.write(&frame("other", "0.jpg"), at(50), Bytes::new()).await;

    assert_eq!(store.scores("cam"), vec![105, 111]);
    assert_eq!(store.scores("other"), vec![50]);
    let blobs = store.blobs.lock().unwrap();
    let mut ttls: Vec<u64> = blobs.values().map(|(_, ttl)| *ttl).collect();
    ttls.sort_unstable();
    assert_eq!(ttls, vec![10, 10, 10, 60]);
}

#[tokio::test]
async fn unparseable_override_falls_back_to_default() {
    let store = MemoryStore::named("a");
    store.set_ttl_override("cam", "a minute");
    let writer = writer(&[store.clone()], 1);

    let report = writer.write(&frame("cam", "1.jpg"), at(10), Bytes::new()).await;

    let CacheReport::Written(writes) = report else {
        panic!("expected a write");
    };
    assert_eq!(writes[0].result.as_ref().unwrap().ttl_secs, 60);
}

#[tokio::test]
async fn rate_eight_caches_000008_but_not_000009() {
    let store = MemoryStore::named("a");
    let writer = writer(&[store.clone()], 8);

    let kept = writer
        .write(&frame("channelA", "000008.jpg"), at(10), Bytes::new())
        .await;
    let skipped = writer
        .write(&frame("channelA", "000009.jpg"), at(11), Bytes::new())
        .await;

    assert_eq!(kept.stored(), 1);
    assert!(matches!(skipped, CacheReport::NotSampled { remainder: 1 }));
    assert_eq!(store.scores("channelA"), vec![10]);
}

#[tokio::test]
async fn sampling_keeps_one_in_n_of_sequential_frames() {
    let store = MemoryStore::named("a");
    let writer = writer(&[store.clone()], 4);

    for i in 0..20 {
        writer
            .write(&frame("seq", &format!("{i:06}.jpg")), at(100), Bytes::new())
            .await;
    }

    assert_eq!(store.blob_count(), 5);
}

#[tokio::test]
async fn each_store_is_written_independently() {
    let healthy = MemoryStore::named("healthy");
    let down = MemoryStore::unreachable("down");
    let writer = writer(&[down.clone(), healthy.clone()], 1);

    let report = writer.write(&frame("cam", "1.jpg"), at(10), Bytes::new()).await;

    let CacheReport::Written(writes) = report else {
        panic!("expected a write");
    };
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().any(|w| w.store == "down" && w.result.is_err()));
    assert!(writes.iter().any(|w| w.store == "healthy" && w.result.is_ok()));
    assert_eq!(healthy.scores("cam"), vec![10]);
}
