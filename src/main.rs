use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use dotenv::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use program_advisor::commands::{print_help, CommandHandler, SystemAction};
use program_advisor::config::AppConfig;
use program_advisor::database::{
    all_document_collections, ArangoClient, CurriculaCollection, VectorDB,
};
use program_advisor::llm::{Assistant, EmbeddingGenerator, KnowledgeRetriever};
use program_advisor::persona::AdvisorPersona;
use program_advisor::providers::create_provider;
use program_advisor::serving::{wait_until_ready, LaunchConfig, ServerLauncher};

#[derive(Parser, Debug)]
#[command(author, version, about = "Graduate program advisor: model serving, stores and chat relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install the serving runtime and run the model server in the foreground
    Serve {
        #[arg(long)]
        skip_install: bool,
        /// Print the commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },
    /// Wait until the model server answers its health check
    Wait {
        #[arg(long)]
        url: Option<String>,
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
    },
    /// Relay Telegram messages to the assistant
    Bot {
        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Interactive chat in the terminal
    Chat {
        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Answer a single question and exit
    Ask {
        prompt: String,
        #[command(flatten)]
        assistant: AssistantArgs,
    },
    /// Create the store collections if they do not exist
    InitStores,
    /// Report whether the backend and both stores are reachable
    Check,
}

#[derive(clap::Args, Debug, Clone)]
struct AssistantArgs {
    /// Ground answers on passages from the curricula collection
    #[arg(long)]
    retrieval: bool,
    /// Persona JSON file
    #[arg(long)]
    persona: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Serve { skip_install, dry_run } => serve(&config, skip_install, dry_run).await,
        Command::Wait { url, timeout_secs } => {
            let url = url.unwrap_or_else(|| LaunchConfig::default().local_base_url());
            wait_for_server(&url, Duration::from_secs(timeout_secs)).await
        }
        Command::Bot { assistant } => {
            let token = config.require_telegram_token()?.to_string();
            let (assistant, _) = build_assistant(&config, &assistant).await?;
            program_advisor::bot::run_bot(&token, Arc::new(assistant)).await;
            Ok(())
        }
        Command::Chat { assistant } => {
            let (assistant, persona) = build_assistant(&config, &assistant).await?;
            run_chat(Arc::new(assistant), persona).await
        }
        Command::Ask { prompt, assistant } => {
            let (assistant, _) = build_assistant(&config, &assistant).await?;
            let answer = assistant.respond(&prompt).await?;
            println!("{}", answer);
            Ok(())
        }
        Command::InitStores => init_stores(&config).await,
        Command::Check => check(&config).await,
    }
}

async fn serve(config: &AppConfig, skip_install: bool, dry_run: bool) -> Result<()> {
    let launcher = ServerLauncher::new(&config.serve, LaunchConfig::default());

    if dry_run {
        if !skip_install {
            for package in &config.serve.install_packages {
                println!("{} {}", config.serve.python, launcher.install_args(package).join(" "));
            }
        }
        println!("{}", launcher.command_line());
        return Ok(());
    }

    launcher.run(skip_install).await?;
    Ok(())
}

async fn wait_for_server(url: &str, timeout: Duration) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")?);
    spinner.set_message(format!("Waiting for model server at {}", url));
    spinner.enable_steady_tick(Duration::from_millis(120));

    match wait_until_ready(url, timeout).await {
        Ok(elapsed) => {
            spinner.finish_with_message(format!("✅ Model server ready after {}s", elapsed.as_secs()));
            Ok(())
        }
        Err(e) => {
            spinner.abandon_with_message("❌ Model server not ready".to_string());
            Err(e)
        }
    }
}

async fn build_assistant(config: &AppConfig, args: &AssistantArgs) -> Result<(Assistant, AdvisorPersona)> {
    let persona = AdvisorPersona::load(args.persona.as_deref())?;
    let provider = create_provider(config, persona.generate_system_prompt()).await?;

    let mut assistant = Assistant::new(provider.clone());
    if args.retrieval {
        let vector_db = VectorDB::new(config.require_qdrant_url()?).await?;
        let embeddings = EmbeddingGenerator::new(provider, config.stores.embedding_size);
        let retriever = KnowledgeRetriever::new(embeddings, Arc::new(vector_db), config.stores.score_threshold);
        assistant = assistant.with_retriever(retriever);
    }

    Ok((assistant, persona))
}

async fn run_chat(assistant: Arc<Assistant>, persona: AdvisorPersona) -> Result<()> {
    println!("{} {}", "🎓".bold(), format!("Chatting with {}", persona).green());
    print_help();

    let mut handler = CommandHandler::new(assistant, persona);
    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                if !input.is_empty() {
                    let _ = rl.add_history_entry(input);
                }

                match handler.handle_command(input).await {
                    Ok(SystemAction::Exit) => break,
                    Ok(SystemAction::Continue) => {}
                    Err(e) => println!("{}", e.red()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

async fn connect_arango(config: &AppConfig) -> Result<ArangoClient> {
    let client = ArangoClient::connect(
        config.require_arangodb_url()?,
        &config.stores.arangodb_username,
        config.require_arangodb_password()?,
        &config.stores.arangodb_database,
    )
    .await?;
    Ok(client)
}

async fn init_stores(config: &AppConfig) -> Result<()> {
    let arango = connect_arango(config).await?;
    for collection in all_document_collections() {
        arango
            .ensure_collection(&collection)
            .await
            .with_context(|| format!("while preparing {}", collection.0))?;
        println!("✅ ArangoDB collection {}", collection.0.cyan());
    }

    let vector_db = VectorDB::new(config.require_qdrant_url()?).await?;
    let curricula = CurriculaCollection {
        vector_size: config.stores.embedding_size,
    };
    vector_db.ensure_collection(&curricula).await?;
    println!(
        "✅ Qdrant collection {} ({} dims)",
        "curricula".cyan(),
        config.stores.embedding_size
    );
    Ok(())
}

async fn check(config: &AppConfig) -> Result<()> {
    let mut failures = 0;

    let backend = async {
        let provider = create_provider(config, AdvisorPersona::default().generate_system_prompt()).await?;
        provider.get_model_info().await
    }
    .await;
    failures += report("Completion backend", backend);

    let qdrant = async {
        VectorDB::new(config.require_qdrant_url()?).await?;
        Ok::<_, anyhow::Error>(config.require_qdrant_url()?.to_string())
    }
    .await;
    failures += report("Qdrant", qdrant);

    let arango = async {
        let client = connect_arango(config).await?;
        Ok::<_, anyhow::Error>(format!("database {}", client.db_name()))
    }
    .await;
    failures += report("ArangoDB", arango);

    if failures > 0 {
        anyhow::bail!("{} of 3 services unreachable", failures);
    }
    Ok(())
}

fn report(name: &str, outcome: Result<String>) -> usize {
    match outcome {
        Ok(detail) => {
            println!("✅ {}: {}", name, detail.green());
            0
        }
        Err(e) => {
            println!("❌ {}: {}", name, format!("{:#}", e).red());
            1
        }
    }
}
