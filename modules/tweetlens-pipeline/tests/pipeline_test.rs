//! End-to-end runs against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use ai_client::AiError;
use chrono::Utc;
use tweetlens_common::{Intention, RawPost};
use tweetlens_pipeline::archiver::{read_archive, DEFAULT_PREFIX, DEFAULT_TIMEOUT};
use tweetlens_pipeline::pipeline::Stage;
use tweetlens_pipeline::testing::{
    raw_post, MemoryStore, MockFeed, RecordingSink, ScriptedModel, SinkMode,
};
use tweetlens_pipeline::{
    AnnotationTask, Annotator, AnnotatorSettings, Archiver, Pipeline, PipelineSettings, RunOutcome,
};

const BUCKET: &str = "tweets-backup";

fn settings(handles: &[&str]) -> PipelineSettings {
    PipelineSettings {
        handles: handles.iter().map(|h| h.to_string()).collect(),
        feed_limit: 20,
        max_age_minutes: 20,
        fetch_timeout: Duration::from_millis(500),
        fetch_concurrency: 4,
        annotation_concurrency: 4,
    }
}

fn annotator(model: ScriptedModel) -> Annotator {
    Annotator::new(
        Arc::new(model),
        AnnotatorSettings {
            timeout: Duration::from_millis(500),
            ..Default::default()
        },
    )
}

struct Harness {
    pipeline: Pipeline,
    store: MemoryStore,
    sink: RecordingSink,
}

fn harness(feed: MockFeed, model: ScriptedModel, store: MemoryStore, sink: RecordingSink, handles: &[&str]) -> Harness {
    harness_with_archive_timeout(feed, model, store, sink, handles, DEFAULT_TIMEOUT)
}

fn harness_with_archive_timeout(
    feed: MockFeed,
    model: ScriptedModel,
    store: MemoryStore,
    sink: RecordingSink,
    handles: &[&str],
    archive_timeout: Duration,
) -> Harness {
    let pipeline = Pipeline::new(
        Arc::new(feed),
        annotator(model),
        Archiver::new(Arc::new(store.clone()), BUCKET, DEFAULT_PREFIX, archive_timeout),
        Arc::new(sink.clone()),
        settings(handles),
    );
    Harness {
        pipeline,
        store,
        sink,
    }
}

fn mixed_timeline() -> Vec<RawPost> {
    vec![
        raw_post("gabrielboric", 3, "RT @izkia: Gran jornada https://t.co/rt", true),
        raw_post("gabrielboric", 5, "Buenos días a todas y todos", false),
        raw_post("gabrielboric", 8, "Firmamos la reforma https://t.co/abc hoy", false),
    ]
}

#[tokio::test]
async fn only_link_bearing_originals_reach_both_sinks() {
    let feed = MockFeed::new().on_handle("gabrielboric", mixed_timeline());
    let h = harness(
        feed,
        ScriptedModel::new("Reforma", "Constructiva."),
        MemoryStore::new(),
        RecordingSink::new(),
        &["gabrielboric"],
    );

    let outcome = h.pipeline.run().await;
    let stats = match outcome {
        RunOutcome::Completed(stats) => stats,
        other => panic!("expected completed run, got {other:?}"),
    };
    assert_eq!(stats.fetched, 3);
    assert_eq!(stats.reposts, 1);
    assert_eq!(stats.link_free, 1);
    assert_eq!(stats.annotated, 1);
    assert_eq!(stats.persisted, 1);
    assert!(stats.archived);

    let batches = h.sink.batches();
    assert_eq!(batches.len(), 1);
    let posts = batches[0].posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].author, "gabrielboric");
    assert_eq!(posts[0].text, "Firmamos la reforma  hoy");
    assert_eq!(posts[0].summary.as_deref(), Some("Reforma"));
    assert_eq!(posts[0].intention, Some(Intention::Constructive));

    let objects = h.store.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].0, BUCKET);
    assert!(objects[0].1.starts_with("raw-messages/"));
    assert!(objects[0].1.ends_with(".json"));
    assert_eq!(read_archive(&objects[0].2).unwrap(), posts);
}

#[tokio::test]
async fn stale_posts_are_filtered_out() {
    let feed = MockFeed::new().on_handle(
        "Orrego",
        vec![
            raw_post("Orrego", 45, "Ayer https://t.co/old", false),
            raw_post("Orrego", 60 * 24, "Hace un día https://t.co/older", false),
            raw_post("Orrego", 2, "Ahora https://t.co/new", false),
        ],
    );
    let h = harness(
        feed,
        ScriptedModel::new("Actualidad", "neutral"),
        MemoryStore::new(),
        RecordingSink::new(),
        &["Orrego"],
    );

    let outcome = h.pipeline.run().await;
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.stale, 2);
    assert_eq!(stats.annotated, 1);
    assert_eq!(h.sink.batches()[0].posts()[0].text, "Ahora ");
}

#[tokio::test]
async fn failing_source_does_not_abort_siblings() {
    let feed = MockFeed::new()
        .failing_handle("PamJiles", "rate limited")
        .on_handle("Carolina_Toha", vec![raw_post("Carolina_Toha", 1, "Balance https://t.co/x", false)]);
    let h = harness(
        feed,
        ScriptedModel::new("Seguridad", "neutral"),
        MemoryStore::new(),
        RecordingSink::new(),
        &["PamJiles", "Carolina_Toha"],
    );

    let outcome = h.pipeline.run().await;
    assert!(outcome.is_completed());
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.sources_requested, 2);
    assert_eq!(stats.sources_failed, 1);
    assert_eq!(stats.persisted, 1);
}

#[tokio::test]
async fn slow_source_times_out_and_is_skipped() {
    let feed = MockFeed::new()
        .on_handle("izkia", vec![raw_post("izkia", 1, "Hola https://t.co/x", false)])
        .with_delay(Duration::from_secs(5));
    let h = harness(
        feed,
        ScriptedModel::new("Saludo", "neutral"),
        MemoryStore::new(),
        RecordingSink::new(),
        &["izkia"],
    );

    let outcome = h.pipeline.run().await;
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.sources_failed, 1);
    assert_eq!(stats.fetched, 0);
    // Nothing to write: the sink is not called at all.
    assert_eq!(h.sink.attempts(), 0);
}

#[tokio::test]
async fn one_failed_task_keeps_the_item() {
    let feed = MockFeed::new().on_handle("Diego_Schalper", mixed_timeline());
    let model = ScriptedModel::new("Reforma", "destructiva").fail_task(AnnotationTask::Summary, || {
        AiError::Api {
            status: 400,
            message: "context length".into(),
        }
    });
    let h = harness(feed, model, MemoryStore::new(), RecordingSink::new(), &["Diego_Schalper"]);

    let outcome = h.pipeline.run().await;
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.summary_failures, 1);
    assert_eq!(stats.intention_failures, 0);

    let batches = h.sink.batches();
    let post = &batches[0].posts()[0];
    assert_eq!(post.summary, None);
    assert_eq!(post.intention, Some(Intention::Destructive));
}

#[tokio::test]
async fn archive_failure_is_not_fatal() {
    let feed = MockFeed::new().on_handle("gonzalowinter", mixed_timeline());
    let h = harness(
        feed,
        ScriptedModel::new("Reforma", "neutral"),
        MemoryStore::failing(),
        RecordingSink::new(),
        &["gonzalowinter"],
    );

    let outcome = h.pipeline.run().await;
    let stats = outcome.stats().unwrap();
    assert!(outcome.is_completed());
    assert!(!stats.archived);
    assert_eq!(stats.persisted, 1);
    assert_eq!(h.sink.batches().len(), 1);
}

#[tokio::test]
async fn hung_archive_upload_does_not_stall_the_run() {
    let feed = MockFeed::new().on_handle("joseantoniokast", mixed_timeline());
    let h = harness_with_archive_timeout(
        feed,
        ScriptedModel::new("Reforma", "neutral"),
        MemoryStore::new().with_delay(Duration::from_secs(60)),
        RecordingSink::new(),
        &["joseantoniokast"],
        Duration::from_millis(50),
    );

    let outcome = tokio::time::timeout(Duration::from_secs(10), h.pipeline.run())
        .await
        .expect("run must finish despite a hung upload");
    assert!(outcome.is_completed());
    let stats = outcome.stats().unwrap();
    assert!(!stats.archived);
    assert_eq!(stats.persisted, 1);
    assert!(h.store.objects().is_empty());
    assert_eq!(h.sink.batches().len(), 1);
}

#[tokio::test]
async fn rolled_back_write_still_completes() {
    let feed = MockFeed::new().on_handle("MaiteOrsini", mixed_timeline());
    let h = harness(
        feed,
        ScriptedModel::new("Reforma", "neutral"),
        MemoryStore::new(),
        RecordingSink::with_mode(SinkMode::Rollback),
        &["MaiteOrsini"],
    );

    let outcome = h.pipeline.run().await;
    assert!(outcome.is_completed());
    assert_eq!(outcome.stats().unwrap().persisted, 0);
    assert_eq!(h.sink.attempts(), 1);
    // The backup is independent of the database write.
    assert_eq!(h.store.objects().len(), 1);
}

#[tokio::test]
async fn unusable_sink_is_a_contained_failure() {
    let feed = MockFeed::new().on_handle("GmoRamirez", mixed_timeline());
    let h = harness(
        feed,
        ScriptedModel::new("Reforma", "neutral"),
        MemoryStore::new(),
        RecordingSink::with_mode(SinkMode::Unavailable),
        &["GmoRamirez"],
    );

    match h.pipeline.run().await {
        RunOutcome::Failed { stage, error, stats } => {
            assert_eq!(stage, Stage::Persist);
            assert!(error.contains("no connection"));
            assert!(stats.archived);
        }
        other => panic!("expected contained failure, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_run_skips_the_sink_but_archives() {
    let h = harness(
        MockFeed::new(),
        ScriptedModel::new("x", "neutral"),
        MemoryStore::new(),
        RecordingSink::new(),
        &["LavinJoaquin"],
    );

    let run_at = Utc::now();
    let outcome = h.pipeline.run_at(run_at).await;
    assert!(outcome.is_completed());
    assert_eq!(h.sink.attempts(), 0);

    let objects = h.store.objects();
    assert_eq!(objects.len(), 1);
    assert!(read_archive(&objects[0].2).unwrap().is_empty());
}

#[tokio::test]
async fn unparsable_item_is_skipped_alone() {
    let mut broken = raw_post("rodolfocarter", 1, "Roto https://t.co/x", false);
    broken.created_at = Some("not a timestamp".into());
    let feed = MockFeed::new().on_handle(
        "rodolfocarter",
        vec![broken, raw_post("rodolfocarter", 1, "Sano https://t.co/y", false)],
    );
    let h = harness(
        feed,
        ScriptedModel::new("Comuna", "neutral"),
        MemoryStore::new(),
        RecordingSink::new(),
        &["rodolfocarter"],
    );

    let outcome = h.pipeline.run().await;
    let stats = outcome.stats().unwrap();
    assert_eq!(stats.extraction_failures, 1);
    assert_eq!(stats.persisted, 1);
    assert_eq!(h.sink.batches()[0].posts()[0].text, "Sano ");
}
