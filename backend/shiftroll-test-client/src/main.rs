// src/main.rs

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct PeriodResponse {
    year: i32,
    month: u32,
    first_day: String,
    last_day: String,
    deadline: String,
    submission_closed: bool,
}

#[derive(Debug, Deserialize)]
struct EmployeeResponse {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::var("SHIFTROLL_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health check response: {:?}", health.status);

    // Test 2: Current period
    println!("\n🔍 Fetching current pay period...");
    let period = client
        .get(format!("{}/api/periods/current", base_url))
        .send()
        .await?
        .json::<PeriodResponse>()
        .await?;
    println!(
        "Period {}-{:02}: {} .. {} (deadline {}, closed: {})",
        period.year, period.month, period.first_day, period.last_day, period.deadline, period.submission_closed
    );

    // Test 3: Add an employee with defaults
    println!("\n🔍 Adding a test employee...");
    let employee = client
        .post(format!("{}/api/employees", base_url))
        .json(&json!({
            "name": "Smoke Test",
            "role": "staff",
            "base_task": "Register",
            "default_start_time": "09:00",
            "default_end_time": "17:00"
        }))
        .send()
        .await?
        .json::<EmployeeResponse>()
        .await?;
    println!("Created employee {} ({})", employee.id, employee.name);

    // Test 4: Assign a shift on the first day of the period and toggle a break
    let day = &period.first_day;
    println!("\n🔍 Assigning shift on {}...", day);
    let shift_response = client
        .put(format!("{}/api/shifts/{}/{}", base_url, employee.id, day))
        .json(&json!({ "start": "10:00", "task": "Floor" }))
        .send()
        .await?;
    println!("Shift response status: {}", shift_response.status());
    println!("Shift: {}", shift_response.text().await?);

    let break_response = client
        .post(format!("{}/api/shifts/{}/{}/breaks", base_url, employee.id, day))
        .json(&json!({ "slot": "12:00" }))
        .send()
        .await?;
    println!("Break toggle status: {}", break_response.status());

    // Test 5: Staff time-off request (409 once the deadline has passed)
    println!("\n🔍 Toggling a staff time-off request...");
    let request_response = client
        .post(format!("{}/api/requests/{}/{}", base_url, employee.id, period.last_day))
        .json(&json!({
            "mode": "staff",
            "employee_id": employee.id,
            "year": period.year,
            "month": period.month
        }))
        .send()
        .await?;
    println!("Time-off toggle status: {}", request_response.status());
    println!("Time-off toggle body: {}", request_response.text().await?);

    // Test 6: Roster totals
    println!("\n🔍 Reading roster totals...");
    let roster = client
        .get(format!("{}/api/periods/{}/{}/roster", base_url, period.year, period.month))
        .send()
        .await?
        .json::<Value>()
        .await?;
    if let Some(rows) = roster["employees"].as_array() {
        for row in rows {
            println!(
                "  {}: weekly {} total {}",
                row["employee"]["name"], row["summary"]["weekly"], row["summary"]["total"]
            );
        }
    }

    // Test 7: CSV export
    println!("\n🔍 Downloading hours CSV...");
    let csv = client
        .get(format!("{}/api/periods/{}/{}/hours.csv", base_url, period.year, period.month))
        .send()
        .await?
        .text()
        .await?;
    println!("{}", csv);

    // Cleanup
    let delete_response = client
        .delete(format!("{}/api/employees/{}", base_url, employee.id))
        .send()
        .await?;
    println!("Cleanup status: {}", delete_response.status());

    println!("\n✅ Testing complete!");

    Ok(())
}
