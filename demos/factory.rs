use std::time::Duration;

use chainreq::prelude::{Factory, RequestOption};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let api = Factory::new([
        RequestOption::base_url("https://httpbin.org"),
        RequestOption::header("x-client", "chainreq-demo"),
        RequestOption::timeout(Duration::from_secs(5)),
    ]);

    let created = api
        .post("/post")
        .with_json(&serde_json::json!({ "name": "demo" }))
        .map()?;
    println!("echoed json={:?}", created.get("json"));

    let status = api.get("/status/418").status()?;
    println!("teapot status={status}");

    let broken = Factory::new([RequestOption::base_url("ftp://files.example.com")]);
    if let Some(error) = broken.get("/file").error() {
        println!("factory option rejected: {} ({})", error, error.code());
    }
    Ok(())
}
