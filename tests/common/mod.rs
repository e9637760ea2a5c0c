#![allow(dead_code)]

use futures::future::BoxFuture;
use list_benchmark::api::backoff::{SharedSleeper, Sleeper};
use list_benchmark::config::ImportSettings;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct RecordingSleeper {
    calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn secs(&self) -> Vec<u64> {
        self.calls.lock().unwrap().iter().map(|d| d.as_secs()).collect()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.calls.lock().unwrap().push(duration);
        Box::pin(async {})
    }
}

/// Records requested delays but pauses only for a fixed short time, so a
/// retrying task really is idle while it waits.
pub struct PacedSleeper {
    calls: Mutex<Vec<Duration>>,
    pause: Duration,
}

impl PacedSleeper {
    pub fn new(pause: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            pause,
        })
    }

    pub fn secs(&self) -> Vec<u64> {
        self.calls.lock().unwrap().iter().map(|d| d.as_secs()).collect()
    }
}

impl Sleeper for PacedSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.calls.lock().unwrap().push(duration);
        let pause = self.pause;
        Box::pin(async move { tokio::time::sleep(pause).await })
    }
}

pub fn shared<S: Sleeper + 'static>(sleeper: &Arc<S>) -> SharedSleeper {
    sleeper.clone()
}

/// Settings pointing every API call at `base_url`, with the proxy disabled.
pub fn local_settings(base_url: &str) -> ImportSettings {
    ImportSettings {
        proxy_disabled: true,
        api_base_override: Some(base_url.to_string()),
        ..ImportSettings::default()
    }
}

pub fn member(id: &str, status: &str, open_rate: f64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "status": status,
        "timestamp_opt": "2019-04-01T10:00:00+00:00",
        "timestamp_signup": "",
        "stats": {"avg_open_rate": open_rate, "avg_click_rate": 0.05}
    })
}

pub fn activity(id: &str, events: &[(&str, String)]) -> serde_json::Value {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(action, ts)| serde_json::json!({"action": action, "timestamp": ts}))
        .collect();
    serde_json::json!({"email_id": id, "activity": events})
}
