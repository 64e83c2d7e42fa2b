//! End-to-end API test against a running gateway. Start the service (and its
//! database) first, then run with `cargo test -- --ignored`.

use rand::Rng;
use serde_json::{json, Value};

fn base_url() -> String {
    std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string())
}

#[tokio::test]
#[ignore]
async fn test_register_and_ingest_flow() {
    let client = reqwest::Client::new();
    let base = base_url();

    let device_id = format!("api-test-dev-{}", rand::thread_rng().gen::<u32>());
    let token = "api-test-secret";

    // health check
    let resp = client.get(&base).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    // register
    let resp = client
        .post(format!("{}/register", base))
        .json(&json!({ "device_id": device_id, "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["registered"], json!(true));
    assert_eq!(body["device_id"], json!(device_id));

    // register with missing fields
    let resp = client
        .post(format!("{}/register", base))
        .json(&json!({ "device_id": device_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // baseline readings
    for temp in [25.0, 26.0, 24.0] {
        let resp = client
            .post(format!("{}/data", base))
            .json(&json!({
                "device_id": device_id,
                "token": token,
                "temperature": temp,
                "humidity": 50.0
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], json!(true));
        assert_eq!(body["anomaly"], json!(false));
    }

    // anomalous reading against the 25.0 baseline
    let resp = client
        .post(format!("{}/data", base))
        .json(&json!({
            "device_id": device_id,
            "token": token,
            "temperature": 60.0,
            "humidity": 50.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["anomaly"], json!(true));
    assert!(body["desc"].as_str().unwrap().contains("temp deviation"));

    // bad token
    let resp = client
        .post(format!("{}/data", base))
        .json(&json!({
            "device_id": device_id,
            "token": "wrong",
            "temperature": 25.0,
            "humidity": 50.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // missing credentials
    let resp = client
        .post(format!("{}/data", base))
        .json(&json!({ "temperature": 25.0, "humidity": 50.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // non-numeric telemetry
    let resp = client
        .post(format!("{}/data", base))
        .json(&json!({
            "device_id": device_id,
            "token": token,
            "temperature": "hot",
            "humidity": 50.0
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // the anomalous reading landed in history
    let resp = client
        .get(format!("{}/latest/{}", base, device_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let readings: Vec<Value> = resp.json().await.unwrap();
    assert!(readings.len() >= 4);
    assert_eq!(readings[0]["temperature"], json!(60.0));

    // and the alert is listed
    let resp = client
        .get(format!("{}/alerts", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let alerts: Vec<Value> = resp.json().await.unwrap();
    assert!(alerts
        .iter()
        .any(|a| a["device_id"] == json!(device_id) && a["type"] == json!("anomaly")));
}

#[tokio::test]
#[ignore]
async fn test_rate_limit_kicks_in() {
    let client = reqwest::Client::new();
    let base = base_url();

    let device_id = format!("api-test-flood-{}", rand::thread_rng().gen::<u32>());
    let token = "api-test-secret";

    let resp = client
        .post(format!("{}/register", base))
        .json(&json!({ "device_id": device_id, "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    // default window admits 30 events; the 31st inside it must throttle
    let mut throttled = false;
    for _ in 0..40 {
        let resp = client
            .post(format!("{}/data", base))
            .json(&json!({
                "device_id": device_id,
                "token": token,
                "temperature": 25.0,
                "humidity": 50.0
            }))
            .send()
            .await
            .unwrap();
        if resp.status() == 429 {
            throttled = true;
            break;
        }
        assert_eq!(resp.status(), 200);
    }
    assert!(throttled, "flooding never hit the rate limit");
}
