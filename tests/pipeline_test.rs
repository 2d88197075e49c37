//! End-to-end pipeline tests against the in-memory store
//!
//! These run whole jobs: the driver plans and dispatches mappers, the
//! in-process invoker synthesizes the object-creation events S3 would
//! deliver, and the coordinator drives reduce waves until the result
//! object exists.

mod common;

use common::{await_quiescent_result, job_config, run_job, seed_inputs, JOB_BUCKET};

use nimbus::job::TaskKey;
use nimbus::store::{MemoryStore, ObjectStore};
use nimbus::worker::Aggregate;

async fn reducer_state_count(store: &MemoryStore, job_id: &str) -> usize {
    store
        .list(JOB_BUCKET, &format!("{job_id}/reducerstate."))
        .await
        .unwrap()
        .len()
}

async fn result_aggregate(store: &MemoryStore, job_id: &str) -> Aggregate {
    let body = store
        .get(JOB_BUCKET, &TaskKey::Result.key(job_id))
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_small_job_runs_to_completion() {
    let store = MemoryStore::new();
    // 4 objects, 2 records each, one shared group across objects.
    seed_inputs(
        &store,
        &[
            "10.0.0.1,GET,/a,1.0\n10.0.0.2,GET,/b,2.0\n",
            "10.0.0.1,GET,/c,3.0\n10.0.0.3,GET,/d,4.0\n",
            "10.0.0.2,PUT,/e,5.0\n",
            "10.0.0.4,PUT,/f,6.0\n",
        ],
    )
    .await;

    let metrics = run_job(&store, job_config("small", 100), 4).await.unwrap();

    assert_eq!(metrics.map_count, 4);
    assert_eq!(metrics.total_input_objects, 4);
    assert_eq!(metrics.total_lines, 6);
    assert_eq!(metrics.total_parse_errors, 0);

    let result = result_aggregate(&store, "small").await;
    assert_eq!(result.get("10.0.0.1"), Some(&4.0));
    assert_eq!(result.get("10.0.0.2"), Some(&7.0));
    assert_eq!(result.get("10.0.0.3"), Some(&4.0));
    assert_eq!(result.get("10.0.0.4"), Some(&6.0));

    // 4 mapper outputs reduce as 4 -> 2 -> 1.
    assert_eq!(reducer_state_count(&store, "small").await, 2);
    assert!(store
        .get(JOB_BUCKET, &TaskKey::JobData.key("small"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_single_input_reduces_straight_to_result() {
    let store = MemoryStore::new();
    seed_inputs(&store, &["only-one-key,GET,/a,2.5\n"]).await;

    let metrics = run_job(&store, job_config("single", 100), 1).await.unwrap();

    assert_eq!(metrics.map_count, 1);
    let result = result_aggregate(&store, "single").await;
    assert_eq!(result.get("only-one"), Some(&2.5));

    // The sole reduce wave has one reducer, which writes the result
    // directly; no intermediate reducer outputs exist.
    assert_eq!(reducer_state_count(&store, "single").await, 1);
    assert!(store
        .list(JOB_BUCKET, "single/task/reducer/")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_wide_job_builds_binary_reduce_tree() {
    let store = MemoryStore::new();
    let inputs: Vec<String> = (0..64)
        .map(|i| format!("group-{:02}x,GET,/p,1.0\nshared-gp,GET,/q,1.0\n", i % 8))
        .collect();
    let refs: Vec<&str> = inputs.iter().map(String::as_str).collect();
    seed_inputs(&store, &refs).await;

    let metrics = run_job(&store, job_config("wide", 100), 64).await.unwrap();
    assert_eq!(metrics.map_count, 64);
    await_quiescent_result(&store, JOB_BUCKET, "wide").await;

    // 64 artifacts halve each wave: 64 -> 32 -> 16 -> 8 -> 4 -> 2 -> 1.
    let expected_counts = [32usize, 16, 8, 4, 2, 1];
    assert_eq!(reducer_state_count(&store, "wide").await, 6);

    for (step, expected) in expected_counts.iter().enumerate() {
        let step_id = (step + 1) as u32;
        let body = store
            .get(
                JOB_BUCKET,
                &TaskKey::ReducerState { step_id }.key("wide"),
            )
            .await
            .unwrap();
        let plan: nimbus::job::ReducerState = serde_json::from_slice(&body).unwrap();
        assert_eq!(plan.reducer_count, *expected, "step {step_id}");

        let outputs = store
            .list(JOB_BUCKET, &format!("wide/task/reducer/{step_id}/"))
            .await
            .unwrap();
        // The final wave's sole reducer writes the result object instead of
        // a reducer-output key.
        let on_disk = if *expected == 1 { 0 } else { *expected };
        assert_eq!(outputs.len(), on_disk, "step {step_id}");
    }

    let result = result_aggregate(&store, "wide").await;
    assert_eq!(result.get("shared-g"), Some(&64.0));
    let total: f64 = result.values().sum();
    assert!((total - 128.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_result_bytes_are_deterministic_across_runs() {
    let inputs = [
        "src-aaaa,GET,/a,1.25\nsrc-bbbb,GET,/b,2.5\n",
        "src-aaaa,GET,/c,0.25\nsrc-cccc,GET,/d,7.0\n",
        "src-dddd,GET,/e,3.0\n",
    ];

    let mut bodies = Vec::new();
    for _ in 0..2 {
        let store = MemoryStore::new();
        seed_inputs(&store, &inputs).await;
        run_job(&store, job_config("replay", 100), 3).await.unwrap();
        await_quiescent_result(&store, JOB_BUCKET, "replay").await;
        bodies.push(
            store
                .get(JOB_BUCKET, &TaskKey::Result.key("replay"))
                .await
                .unwrap(),
        );
    }

    assert_eq!(bodies[0], bodies[1]);
}

#[tokio::test]
async fn test_rerun_with_same_job_id_is_idempotent() {
    let store = MemoryStore::new();
    seed_inputs(
        &store,
        &["alpha-key,GET,/a,1.0\n", "betaa-key,GET,/b,2.0\n"],
    )
    .await;

    run_job(&store, job_config("again", 100), 2).await.unwrap();
    await_quiescent_result(&store, JOB_BUCKET, "again").await;
    let first = result_aggregate(&store, "again").await;

    // Second run over the same artifacts: mappers overwrite their outputs,
    // the coordinator sees the result and declines to reduce again.
    run_job(&store, job_config("again", 100), 2).await.unwrap();
    let second = result_aggregate(&store, "again").await;

    assert_eq!(first, second);
}
