use memagent::api::{self, app_state::AppState};
use memagent::config::{AppConfig, TurnOverrides, loader::ConfigLoader};
use memagent::observability::{AgentMetrics, init_tracing};
use memagent::services::{ChatAgent, create_chat_agent};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::load()?;
    let _guard = init_tracing(&config.logging)?;
    info!("Configuration loaded successfully");

    let metrics = Arc::new(AgentMetrics::default());
    let agent = create_chat_agent(&config, metrics.clone())?;

    if std::env::var("MEMAGENT_SERVER_MODE").is_ok() {
        return run_server(&config, agent, metrics).await;
    }

    run_cli(agent).await
}

async fn run_server(
    config: &AppConfig,
    agent: ChatAgent,
    metrics: Arc<AgentMetrics>,
) -> anyhow::Result<()> {
    let router = api::initialize_api(AppState::new(agent, metrics)).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, router).await?;
    Ok(())
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

async fn run_cli(agent: ChatAgent) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let model = prompt(&mut lines, "Enter model name (press Enter for default): ")
        .await?
        .filter(|name| !name.is_empty());
    let temperature = match prompt(&mut lines, "Enter temperature (press Enter for default): ")
        .await?
    {
        Some(input) => TurnOverrides::parse_temperature(&input).unwrap_or_else(|e| {
            warn!("{}; using the default temperature", e);
            None
        }),
        None => None,
    };

    let overrides = TurnOverrides {
        model,
        temperature,
        ..Default::default()
    };
    // 在进入循环前暴露未知模型
    let turn = agent.resolve_turn(overrides.clone())?;
    info!(
        "Chatting with {} (temperature {}) as {}",
        turn.model.alias, turn.temperature, turn.user_id
    );

    loop {
        let Some(message) = prompt(&mut lines, "Enter a message: ").await? else {
            break;
        };
        if message.eq_ignore_ascii_case("exit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        match agent.chat(&message, overrides.clone()).await {
            Ok(reply) => println!("{}", reply.answer),
            Err(e) => {
                error!("Turn failed: {}", e);
                println!("Error: {}", e);
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}
