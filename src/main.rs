use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use relradar::{ClaudeProvider, Config, GitHubClient, Storage, Tracker};
use relradar::analysis::ReleaseAnalysis;
use relradar::models::Repository;

#[derive(Parser, Debug)]
#[command(name = "relradar")]
#[command(version = "0.1.0")]
#[command(about = "Track GitHub repositories and predict release impact on your project")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Database path for tracked repositories
    #[arg(long, global = true)]
    database: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Set the global project description (and optionally the output language)
    Settings {
        /// Free-text description of your project, used for impact assessment
        description: String,

        /// Output language for summaries and reasoning (e.g. "French")
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Print the current project settings
    ShowSettings,

    /// Track a repository from a starting version tag
    Add {
        /// GitHub repository URL (github.com/<owner>/<repo>)
        url: String,

        /// Version tag you are currently on
        #[arg(long)]
        from: String,
    },

    /// Stop tracking a repository
    Remove {
        /// Repository name (owner/repo)
        name: String,
    },

    /// List tracked repositories and their releases
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Set or clear a per-repository project description override
    Describe {
        /// Repository name (owner/repo)
        name: String,

        /// Override description; omit to fall back to the global settings
        description: Option<String>,
    },

    /// Fetch newly published releases for every tracked repository
    Refresh,

    /// Analyze the impact of one release on your project
    Analyze {
        /// Repository name (owner/repo)
        name: String,

        /// Release version tag
        version: String,
    },

    /// Analyze the overall impact of upgrading across all tracked releases
    Overall {
        /// Repository name (owner/repo)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relradar=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = Config::from_env()?;

    let database = args.database.as_deref().unwrap_or(&config.database_path);
    let storage = Storage::new(database)?;

    let github = GitHubClient::new(config.github_token.as_deref())?;
    let llm = ClaudeProvider::new(config.anthropic_api_key.clone(), config.claude_model.clone())?;

    let tracker = Tracker::new(
        Arc::new(github),
        Arc::new(llm),
        storage,
        config.concurrency_limit,
    );

    match args.command {
        Command::Settings {
            description,
            language,
        } => {
            let settings = tracker.update_settings(&description, language)?;
            println!(
                "Settings updated (language: {}).",
                settings.language
            );
        }

        Command::ShowSettings => match tracker.settings()? {
            Some(settings) => {
                println!("Project description: {}", settings.project_description);
                println!("Language: {}", settings.language);
            }
            None => println!("No settings configured yet. Run `relradar settings <description>`."),
        },

        Command::Add { url, from } => {
            let repository = tracker.add_repository(&url, &from).await?;
            println!(
                "Successfully added {} ({} release(s) since {})",
                repository.name,
                repository.releases.len(),
                from
            );
        }

        Command::Remove { name } => {
            tracker.remove_repository(&name)?;
            println!("Removed {}", name);
        }

        Command::List { format } => {
            let repositories = tracker.list_repositories()?;
            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&repositories)?),
                _ => print!("{}", format_repositories(&repositories)),
            }
        }

        Command::Describe { name, description } => {
            tracker.set_project_description(&name, description.as_deref())?;
            match description {
                Some(_) => println!("Set a project description override for {}", name),
                None => println!(
                    "Cleared the override for {}; the global description applies",
                    name
                ),
            }
        }

        Command::Refresh => {
            let summary = tracker.refresh_all().await?;
            println!(
                "Found {} new release(s) across {} repositories ({} skipped)",
                summary.new_releases, summary.refreshed, summary.skipped
            );
        }

        Command::Analyze { name, version } => {
            let analysis = tracker.analyze_release(&name, &version).await?;
            print!("{}", format_analysis(&format!("{} {}", name, version), &analysis));
        }

        Command::Overall { name } => {
            let analysis = tracker.analyze_overall(&name).await?;
            print!("{}", format_analysis(&format!("{} (overall upgrade)", name), &analysis));
        }
    }

    Ok(())
}

fn format_repositories(repositories: &[Repository]) -> String {
    if repositories.is_empty() {
        return "No repositories tracked yet.\n".to_string();
    }

    let mut output = String::new();
    for repo in repositories {
        output.push_str(&format!(
            "\n{} (★ {} | forks {})\n  {}\n",
            repo.name, repo.stars, repo.forks, repo.url
        ));

        if let Some(ref description) = repo.project_description {
            output.push_str(&format!("  Description override: {}\n", description));
        }

        if let Some(ref overall) = repo.overall_impact {
            output.push_str(&format!(
                "  Overall impact: {} - {}\n",
                overall.impact, overall.reason
            ));
        }

        for release in &repo.releases {
            let impact = release
                .impact
                .map(|i| format!(" [{}]", i))
                .unwrap_or_default();
            output.push_str(&format!(
                "  - {} ({}){}\n",
                release.version,
                release.published_at.format("%Y-%m-%d"),
                impact
            ));
            if let Some(ref summary) = release.summary {
                output.push_str(&format!("      {}\n", summary));
            }
        }
    }

    output
}

fn format_analysis(title: &str, analysis: &ReleaseAnalysis) -> String {
    format!(
        "\n=== {} ===\n\nImpact: {}\n\nSummary:\n{}\n\nReason:\n{}\n",
        title, analysis.impact, analysis.summary, analysis.reason
    )
}
