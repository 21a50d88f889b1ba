use std::path::{Path, PathBuf};

use anyhow::Context;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::ProgressBar;
use tokio::fs;

use crate::{
    api::Api,
    config::sync_config::{ConfigFile, SECRETS_FILE},
    Result,
};

/// Asks for everything a sync needs and writes it to `config_path`
pub async fn generate_config(config_path: &Path) -> Result<()> {
    let login: String = Input::new()
        .with_prompt("Login (email)")
        .interact_text()?;
    let password = Password::new().with_prompt("Password").interact()?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Checking credentials...");
    Api::new()?
        .authenticate(&login, &password)
        .await
        .context("Login failed, please check your credentials")?;
    spinner.finish_with_message("Successfully logged in!");

    let destination: String = Input::new()
        .with_prompt("Destination folder")
        .default("./documents".to_string())
        .interact_text()?;
    let ignore_existing = Confirm::new()
        .with_prompt("Skip documents that already exist locally?")
        .default(true)
        .interact()?;

    let password_choices = [
        "In the config file".to_string(),
        format!("Nowhere, I will provide it via {} or the environment", SECRETS_FILE),
    ];
    let store_password = Select::new()
        .with_prompt("Where should the password be stored?")
        .items(&password_choices)
        .default(0)
        .interact()?
        == 0;

    let config = ConfigFile {
        login: Some(login),
        password: store_password.then_some(password),
        destination: Some(PathBuf::from(destination)),
        ignore_existing,
        log_file: Some(PathBuf::from("edoc-dl.log")),
        ..Default::default()
    };

    let mut conf = String::from("# edoc-dl configuration\n# Missing credentials are read from LOGIN / PASSWORD\n");
    conf.push_str(&serde_yml::to_string(&config)?);
    fs::write(config_path, conf)
        .await
        .with_context(|| format!("Could not write config to {}", config_path.display()))?;

    println!("Config written to {}", config_path.display());
    Ok(())
}
