//! One controller and one worker over real HTTP on loopback.

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crack_core::{ControllerConfig, Hasher, Pbkdf2Sha256, WorkerConfig};
use crackd::controller_mode::serve_controller;
use crackd::worker_mode::serve_worker;
use crackgrid_api::client::{get_json, post_json};

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn password_is_recovered() {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (controller_listener, controller_port) = bind().await;
    let controller_config = ControllerConfig {
        port: controller_port,
        heartbeat_interval: Duration::from_millis(200),
        heartbeat_timeout: Duration::from_secs(2),
        schedule_interval: Duration::from_millis(20),
        ..ControllerConfig::default()
    };
    let controller = tokio::spawn(serve_controller(
        controller_config,
        controller_listener,
        shutdown_rx.clone(),
    ));
    let controller_address = format!("127.0.0.1:{controller_port}");

    let digest = Pbkdf2Sha256.hash(b"abcd", b"salt", 1, 32);
    let job = json!({
        "salt": "73616c74",
        "digest": hex::encode(&digest),
        "key_len": 4,
        "iterations": 1,
        "alphabet": "alpha_lower",
    });
    let accepted = post_json(&controller_address, "/api/v1/jobs", &job).await.unwrap();
    assert_eq!(accepted["job_id"], 1);

    // 26^4 candidates at one iteration fit in a single task.
    let queued = get_json(&controller_address, "/api/v1/jobs/1").await.unwrap();
    let tasks = queued["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["start"], "aaaa");
    assert_eq!(tasks[0]["task_len"], "456976");
    let status = get_json(&controller_address, "/api/v1/status").await.unwrap();
    assert_eq!(status["queued_tasks"], 1);
    assert_eq!(status["scheduled_tasks"], 0);

    let (worker_listener, worker_port) = bind().await;
    let worker_config = WorkerConfig {
        port: worker_port,
        controller: controller_address.clone(),
        slots: 1,
        heartbeat_interval: Duration::from_millis(200),
        ..WorkerConfig::default()
    };
    let worker = tokio::spawn(serve_worker(worker_config, worker_listener, shutdown_rx));


    let mut finished = serde_json::Value::Null;
    for _ in 0..300 {
        let job = get_json(&controller_address, "/api/v1/jobs/1").await.unwrap();
        if job.get("finished_at").is_some() {
            finished = job;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(finished["password"], "abcd", "job did not finish: {finished}");
    assert_eq!(finished["cancelled"], false);

    let status = get_json(&controller_address, "/api/v1/status").await.unwrap();
    assert_eq!(status["jobs"].as_array().unwrap().len(), 0);
    assert_eq!(status["completed_jobs"].as_array().unwrap().len(), 1);
    assert_eq!(status["workers"][0]["address"], format!("127.0.0.1:{worker_port}"));

    shutdown_tx.send(true).unwrap();
    controller.await.unwrap().unwrap();
    worker.await.unwrap().unwrap();
}
