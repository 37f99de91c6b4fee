// src/main.rs

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

// Drives the demo scenario against a server started with `--seed-demo`.

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct WeekResponse {
    id: String,
    name: String,
    period_from: String,
}

#[derive(Debug, Deserialize)]
struct OutcomeResponse {
    outcome: String,
    #[serde(default)]
    detail: Value,
}

struct Walkthrough {
    client: Client,
    base_url: String,
}

impl Walkthrough {
    async fn put_hours(&self, week_id: &str, hours: u32) -> Result<OutcomeResponse, Box<dyn Error>> {
        let body = json!({
            "actor": { "as": "owner", "user_id": "employee" },
            "entries": [{ "client_id": "acme", "media_type_id": "print", "hours": hours.to_string() }]
        });
        let response = self
            .client
            .put(format!("{}/users/employee/weeks/{}/hours", self.base_url, week_id))
            .json(&body)
            .send()
            .await?;
        Ok(response.json().await?)
    }

    async fn transition(
        &self,
        week_id: &str,
        kind: &str,
        actor: Value,
    ) -> Result<(StatusCode, OutcomeResponse), Box<dyn Error>> {
        let response = self
            .client
            .post(format!(
                "{}/users/employee/weeks/{}/transitions",
                self.base_url, week_id
            ))
            .json(&json!({ "kind": kind, "actor": actor }))
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }
}

fn report(step: &str, status: StatusCode, outcome: &OutcomeResponse) {
    println!("{} -> {} {}: {}", step, status.as_u16(), outcome.outcome, outcome.detail);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let walk = Walkthrough {
        client: Client::new(),
        base_url,
    };
    let owner = json!({ "as": "owner", "user_id": "employee" });
    let manager = json!({ "as": "manager", "manager_id": "manager" });

    println!("\n🔍 Testing health check endpoint...");
    let health = walk
        .client
        .get(format!("{}/health", walk.base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health.status);

    println!("\n🔍 Listing weeks...");
    let weeks = walk
        .client
        .get(format!("{}/weeks", walk.base_url))
        .send()
        .await?
        .json::<Vec<WeekResponse>>()
        .await?;
    for week in &weeks {
        println!("  {} {} (from {})", week.id, week.name, week.period_from);
    }

    println!("\n🔍 Submitting W1 with 40 hours...");
    walk.put_hours("W1", 40).await?;
    let (status, outcome) = walk.transition("W1", "submit", owner.clone()).await?;
    report("submit W1", status, &outcome);

    println!("\n🔍 Submitting W2 while W1 is under review...");
    walk.put_hours("W2", 40).await?;
    let (status, outcome) = walk.transition("W2", "submit", owner.clone()).await?;
    report("submit W2", status, &outcome);
    if status != StatusCode::CONFLICT {
        println!("⚠️ Expected W2 to be blocked by W1");
    }

    println!("\n🔍 Manager approves W1...");
    let (status, outcome) = walk.transition("W1", "approve", manager).await?;
    report("approve W1", status, &outcome);

    println!("\n🔍 Retrying W2...");
    let (status, outcome) = walk.transition("W2", "submit", owner).await?;
    report("submit W2", status, &outcome);

    println!("\n🔍 Overview for employee...");
    let overview = walk
        .client
        .get(format!("{}/users/employee/overview", walk.base_url))
        .send()
        .await?
        .json::<Vec<Value>>()
        .await?;
    for summary in overview {
        println!(
            "  {}: {} (remaining {})",
            summary["week"]["id"], summary["status"], summary["remaining_hours"]
        );
    }

    println!("\n✅ Walkthrough complete!");

    Ok(())
}
