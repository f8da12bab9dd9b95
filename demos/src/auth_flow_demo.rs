use dotenv::dotenv;
use std::env;

use quran_read_tracker::app::App;
use quran_read_tracker::config::TrackerConfig;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    pretty_env_logger::init();

    let config = TrackerConfig::from_env()?;
    let mut app = App::new(config);
    app.init().await;

    println!("Starting auth flow demo");

    // Sign in with the ITS identifier from the environment
    let its = env::var("DEMO_ITS").expect("DEMO_ITS must be set");
    let password = env::var("DEMO_PASSWORD").expect("DEMO_PASSWORD must be set");

    app.sign_in(&its, &password).await;

    if let Some(error) = app.auth_error() {
        println!("Sign in failed: {}", error);
        return Ok(());
    }

    if let Some(profile) = app.profile() {
        println!(
            "Signed in as: {} (ITS: {}){}",
            profile.full_name.as_deref().unwrap_or("-"),
            profile.its.as_deref().unwrap_or("-"),
            if profile.is_admin { " [admin]" } else { "" }
        );
    } else if let Some(session) = app.session() {
        println!(
            "Signed in as: {}",
            session.user.email.as_deref().unwrap_or("-")
        );
    }

    app.sign_out().await;
    println!("{}", app.status().unwrap_or("done"));

    Ok(())
}
