use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use plancanvas_core::agents::manifest::MANIFEST_FILE;
use plancanvas_core::config::Config;
use std::path::Path;

const BANNER: &str = r"
    -------------------------------------

      P L A N  ·  C A N V A S

    -------------------------------------
";

/// Written under an underscore-prefixed directory so discovery skips it
/// until the user copies it somewhere else.
const EXAMPLE_PLUGIN: &str = r#"---
name: Critic
description: Reviews a proposed design and lists weaknesses
keywords: [review, critique, weakness]
---

You are a design critic. Read the request and the current diagram and list
the three most important weaknesses, one per line.
"#;

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn ensure_file(path: &Path, content: &str) -> Result<bool> {
    if !path.exists() {
        std::fs::write(path, content)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Returns whether the example manifest was newly written.
fn create_plugins_dir(plugins_dir: &Path) -> Result<bool> {
    let example_dir = plugins_dir.join("_example");
    std::fs::create_dir_all(&example_dir)?;
    ensure_file(&example_dir.join(MANIFEST_FILE), EXAMPLE_PLUGIN)
}

fn setup_provider() -> Result<String> {
    let providers = ["openai", "ollama"];

    let selection = Select::new()
        .with_prompt("Select your provider")
        .items(&providers[..])
        .default(0)
        .interact()
        .context("Failed to select provider")?;

    Ok(providers[selection].to_string())
}

fn setup_api_key() -> Result<String> {
    let api_key: String = Input::new()
        .with_prompt("Enter your OpenAI API key")
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key)
}

fn setup_model(provider: &str) -> Result<String> {
    let models: &[&str] = match provider {
        "ollama" => &["llama3.2", "qwen2.5", "mistral"],
        _ => &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"],
    };

    let selection = Select::new()
        .with_prompt("Select your model")
        .items(models)
        .default(0)
        .interact()
        .context("Failed to select model")?;

    Ok(models[selection].to_string())
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to PlanCanvas!").white().bold());
    println!(
        "  {}",
        style("This wizard connects the planner and diagram agents to a model.").dim()
    );
    println!();

    print_step(1, 3, "Provider");
    let provider = setup_provider()?;
    let api_key = if provider == "openai" {
        setup_api_key()?
    } else {
        String::new()
    };

    print_step(2, 3, "Model Selection");
    let model = setup_model(&provider)?;

    let config = Config {
        provider: Some(provider),
        api_key,
        model,
        ..Config::load_or_init().unwrap_or_default()
    };

    print_step(3, 3, "Workspace Setup");
    let plugins_dir = config.plugins_dir();
    match create_plugins_dir(&plugins_dir) {
        Err(e) => eprintln!(
            "  {} Warning: Could not create plugins directory: {}",
            style("!").yellow(),
            e
        ),
        Ok(created) => {
            println!(
                "  {} Plugins directory ready at {}",
                style("✓").green(),
                style(plugins_dir.display()).cyan()
            );
            let note = if created {
                "rename the directory to enable it"
            } else {
                "kept existing file"
            };
            println!(
                "  {} - _example/{} ({})",
                style("  ").dim(),
                MANIFEST_FILE,
                note
            );
        }
    }

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(plancanvas_core::config::get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("plancanvas design").cyan().bold()
    );
    println!();

    Ok(config)
}
