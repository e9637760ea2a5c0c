use crate::api::backoff::SharedSleeper;
use crate::config::{self, ImportSettings};
use crate::error::{AppError, AppResult};
use crate::logging::{log, LogLevel};
use reqwest::Client;
use std::fmt;
use std::time::Duration;

/// A forward proxy endpoint, valid for one import job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyLease {
    host: String,
    port: u16,
}

impl ProxyLease {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ProxyLease {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// 1-indexed proxy process slot. Each worker drives its own proxy process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot(u32);

impl WorkerSlot {
    /// Maps a zero-indexed worker index from the scheduler to a slot.
    /// Without one (e.g. a single local worker) slot 1 is used.
    pub fn from_worker_index(index: Option<u32>) -> Self {
        match index {
            Some(i) => WorkerSlot(i.saturating_add(1)),
            None => WorkerSlot(1),
        }
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl Default for WorkerSlot {
    fn default() -> Self {
        WorkerSlot(1)
    }
}

/// Parses the rotation service's colon-delimited reply, e.g. `OK:10.0.0.5:3128`
/// or `ERROR:no free ports`.
pub fn parse_rotation_response(text: &str) -> Result<ProxyLease, String> {
    let fields: Vec<&str> = text.trim().split(':').collect();
    match fields.as_slice() {
        ["ERROR", rest @ ..] => Err(if rest.is_empty() {
            "ERROR".to_string()
        } else {
            format!("ERROR: {}", rest.join(":"))
        }),
        [_, host, port, ..] if !host.trim().is_empty() => port
            .trim()
            .parse::<u16>()
            .map(|p| ProxyLease::new(host.trim(), p))
            .map_err(|_| format!("invalid proxy port '{}'", port)),
        _ => Err(format!("malformed rotation response '{}'", text.trim())),
    }
}

pub struct ProxyProvisioner {
    client: Client,
    rotate_url: String,
    secret: Option<String>,
    disabled: bool,
    boot_time: Duration,
    sleeper: SharedSleeper,
}

impl ProxyProvisioner {
    pub fn new(settings: &ImportSettings, sleeper: SharedSleeper) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config::HTTP_CONNECT_TIMEOUT))
            .build()
            .map_err(AppError::from)?;
        Ok(ProxyProvisioner {
            client,
            rotate_url: settings.proxy_rotate_url.clone(),
            secret: settings.proxy_secret.clone(),
            disabled: settings.proxy_disabled,
            boot_time: Duration::from_secs(config::PROXY_BOOT_TIME_SECS),
            sleeper,
        })
    }

    /// Rotates the proxy for `slot` and waits for it to boot. Never fails:
    /// any problem with the provider means the job runs unproxied.
    pub async fn acquire(&self, slot: WorkerSlot) -> Option<ProxyLease> {
        if self.disabled {
            log(LogLevel::Info, "Proxy disabled by configuration. Not using a proxy.");
            return None;
        }

        let params = [
            ("api", String::new()),
            ("uid", config::PROXY_ACCOUNT_ID.to_string()),
            ("pwd", self.secret.clone().unwrap_or_default()),
            ("cmd", "rotate".to_string()),
            ("process", slot.get().to_string()),
        ];

        let outcome = match self.client.get(&self.rotate_url).query(&params).send().await {
            Ok(resp) => match resp.text().await {
                Ok(text) => parse_rotation_response(&text),
                Err(e) => Err(format!("unreadable rotation response: {}", e)),
            },
            Err(e) => Err(format!("ConnectionError: proxy provider down ({})", e)),
        };

        match outcome {
            Ok(lease) => {
                log(
                    LogLevel::Info,
                    &format!(
                        "Proxy slot {} rotated to {}. Waiting {}s for it to boot.",
                        slot.get(),
                        lease,
                        self.boot_time.as_secs()
                    ),
                );
                self.sleeper.sleep(self.boot_time).await;
                Some(lease)
            }
            Err(reason) => {
                log(
                    LogLevel::Warning,
                    &format!("Not using a proxy. Reason: {}", reason),
                );
                None
            }
        }
    }
}
