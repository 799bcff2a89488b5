use std::time::Duration;

use chainreq::prelude::{Error, Request};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Echo {
    args: serde_json::Map<String, serde_json::Value>,
    url: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let request = Request::get("https://httpbin.org/get?a=1")
        .with_query("a", "2")
        .with_query("b", "3")
        .with_header("accept", "application/json")
        .with_timeout(Duration::from_secs(5));

    let echo: Echo = request.json()?;
    println!("status={} url={}", request.status()?, echo.url);
    println!("args={:?}", echo.args);

    let slow = Request::get("https://httpbin.org/delay/3").with_timeout(Duration::from_millis(500));
    match slow.text() {
        Err(error) if error.is_timeout() => println!("timed out as expected: {error}"),
        Err(Error::Transport { kind, .. }) => println!("transport failure: {kind}"),
        other => println!("unexpected outcome: {other:?}"),
    }
    println!("must_text after failure: {:?}", slow.must_text());
    Ok(())
}
