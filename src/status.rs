use serde::Serialize;
use serde_json::Value;

/// Last observed state of the upstream status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub label: &'static str,
    pub color: &'static str,
    pub uptime: Option<f64>,
}

impl ServiceStatus {
    pub fn unavailable() -> Self {
        Self {
            label: "Status Unavailable",
            color: "default",
            uptime: None,
        }
    }

    /// Map a `{status, uptimePct}` payload.
    pub fn from_payload(payload: &Value) -> Self {
        let status = payload
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase();
        let uptime = payload.get("uptimePct").and_then(|v| v.as_f64());
        let (label, color) = match status.as_str() {
            "ok" => ("Operational", "#22c55e"),
            "degraded" => ("Degraded", "#f59e0b"),
            _ => ("Down", "#ef4444"),
        };
        Self {
            label,
            color,
            uptime,
        }
    }
}

/// One poll; any transport or decode failure reads as "unavailable".
pub async fn poll_status(client: &reqwest::Client, url: &str) -> ServiceStatus {
    let body = match client.get(url).header("cache-control", "no-store").send().await {
        Ok(resp) => resp.text().await,
        Err(e) => Err(e),
    };
    let payload = match body {
        Ok(body) => serde_json::from_str::<Value>(&body).ok(),
        Err(e) => {
            tracing::debug!("Status poll of {} failed: {}", url, e);
            None
        }
    };
    payload
        .as_ref()
        .map(ServiceStatus::from_payload)
        .unwrap_or_else(ServiceStatus::unavailable)
}
