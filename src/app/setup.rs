use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::{Config, store_session_key};
use crate::lastfm::LastfmClient;

/// One-time authorization flow: fetch a request token, have the user
/// approve it in a browser, then exchange it for a session key and store
/// that back into the config file.
pub(crate) fn run_setup(config: &Config, config_path: &Path) -> Result<()> {
    config.validate_keys()?;
    if config.validate_for_run().is_ok() {
        println!(
            "A usable session key is already present in {}; nothing to do.",
            config_path.display()
        );
        return Ok(());
    }

    let client = LastfmClient::new(&config.lastfm.api_key, &config.lastfm.api_secret);
    let token = client.get_token().context("failed to fetch a request token")?;

    println!(
        "You need to authorize this application with your Last.fm account.\n\
         Visit the following link and click \"Yes, allow access\":\n\n{}\n",
        client.authorize_url(&token)
    );
    print!("Enter 'y' once you have authorized the application: ");
    std::io::stdout().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read confirmation")?;
    if !line.trim().eq_ignore_ascii_case("y") {
        println!("Did not receive 'y', aborting setup.");
        return Ok(());
    }

    let session_key = client
        .get_session(&token)
        .context("failed to establish a web service session")?;
    store_session_key(config_path, &session_key)?;
    println!(
        "\nSuccess! Session key stored in {}. You can now run `spinscrobble run`.",
        config_path.display()
    );
    Ok(())
}
