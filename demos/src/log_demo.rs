use dotenv::dotenv;
use std::env;

use quran_read_tracker::app::App;
use quran_read_tracker::config::TrackerConfig;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    pretty_env_logger::init();

    let config = TrackerConfig::from_env()?;
    let mut app = App::new(config);
    app.init().await;

    let its = env::var("DEMO_ITS").expect("DEMO_ITS must be set");
    let password = env::var("DEMO_PASSWORD").expect("DEMO_PASSWORD must be set");

    app.sign_in(&its, &password).await;
    if let Some(error) = app.auth_error() {
        println!("Sign in failed: {}", error);
        return Ok(());
    }

    // Submit one log for juz 1 at the current time
    app.form_mut().juz = env::var("DEMO_JUZ")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    app.submit_log().await;
    println!("{}", app.status().unwrap_or("-"));

    println!("\nRecent logs:");
    for log in app.logs() {
        println!(
            "  {}  juz {}  surah {}",
            log.read_at,
            log.juz_number,
            log.surah_number
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!("\nCounts by juz:");
    for (juz, count) in app.counts_by_juz() {
        println!("  Juz {}: {}", juz, count);
    }

    if !app.admin_logs().is_empty() {
        println!("\nAll users (admin):");
        for log in app.admin_logs() {
            println!(
                "  {}  {}  juz {}",
                log.read_at,
                log.full_name.as_deref().unwrap_or("-"),
                log.juz_number
            );
        }
    }

    app.sign_out().await;

    Ok(())
}
