use chainreq::prelude::{RequestOption, Session};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cookie_file = std::env::temp_dir().join("chainreq-demo-cookies.json");
    let session = Session::open(&cookie_file, [RequestOption::user_agent("chainreq-demo/0.1")]);

    let login = session
        .get("https://httpbin.org/cookies/set?theme=dark")
        .with_redirect(false);
    println!(
        "login status={} cookies={:?}",
        login.status()?,
        login.response_cookies("theme")?
    );

    let cookies = session.get("https://httpbin.org/cookies").text()?;
    println!("cookies seen by server: {cookies}");
    println!("cookie jar saved to {}", cookie_file.display());
    Ok(())
}
