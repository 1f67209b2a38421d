use alwayschat::api::logging::init_tracing;
use alwayschat::api::ApiClient;
use alwayschat::auth::{FileTokenStore, TokenStore};
use alwayschat::config::Config;
use alwayschat::state::{ChatSession, SendOutcome, SessionEvent};
use alwayschat::types::{Message, Role};
use alwayschat::util::token_preview;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "alwayschat")]
#[command(about = "Terminal client for the AlwaysChat advisor service")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "ALWAYSCHAT_API_BASE_URL")]
    api_base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the access token
    Login {
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "ALWAYSCHAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Create an account
    Register {
        username: String,
        email: String,
        #[arg(long, env = "ALWAYSCHAT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored token
    Logout,
    /// Interactive chat (default)
    Chat,
    /// Print the stored conversation
    History,
    /// Delete the stored conversation
    Clear,
    /// Show CRM data for a customer
    Crm { cif_id: String },
    /// Show the proposed investment strategy
    Strategy,
    /// List advisor prompts
    Prompts,
    /// Choose the advisor prompt by its numeric id
    SelectPrompt { prompt_id: i64 },
    /// Submit customer financial data from a JSON file
    Submit { file: PathBuf },
    /// Generate a life plan from a JSON request file
    Lifeplan { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(url) = args.api_base_url {
        config.api_base_url = url;
    }
    config.validate()?;

    let store = Arc::new(FileTokenStore::new(&config.token_path));
    let client = ApiClient::new(&config, store.clone())?;
    tracing::debug!(
        base_url = client.base_url(),
        token = %token_preview(store.get().as_deref()),
        "client ready"
    );

    match args.command.unwrap_or(Command::Chat) {
        Command::Login { username, password } => {
            let password = password_or_prompt(password)?;
            let credentials = client.login(&username, &password).await?;
            store
                .save(&credentials)
                .with_context(|| format!("writing {}", store.path().display()))?;
            println!("{} {}", "Logged in as".green(), username.bold());
        }
        Command::Register {
            username,
            email,
            password,
        } => {
            let password = password_or_prompt(password)?;
            client.register(&username, &email, &password).await?;
            println!(
                "{} run `alwayschat login {username}` to start.",
                "Account created.".green()
            );
        }
        Command::Logout => {
            store.clear()?;
            println!("{}", "Logged out.".dark_grey());
        }
        Command::Chat => run_repl(&config, client, store).await?,
        Command::History => {
            let session = ChatSession::new(Arc::new(client), store).with_locale(config.locale);
            session.load_chat_history().await?;
            print_messages(&session.messages());
        }
        Command::Clear => {
            let session = ChatSession::new(Arc::new(client), store).with_locale(config.locale);
            session.clear_chat().await?;
            println!("{}", "History cleared.".dark_grey());
        }
        Command::Crm { cif_id } => {
            let envelope = client.crm_data(&cif_id).await?;
            print_envelope(envelope.success, envelope.message.as_deref(), &envelope.data)?;
        }
        Command::Strategy => {
            let envelope = client.strategy().await?;
            let data = envelope.data.or(envelope.strategy_data);
            print_envelope(envelope.success, envelope.message.as_deref(), &data)?;
        }
        Command::Prompts => {
            for prompt in client.prompts().await {
                println!("{}  {}", prompt.id.bold(), prompt.title);
                if !prompt.description.is_empty() {
                    println!("    {}", prompt.description.dark_grey());
                }
            }
        }
        Command::SelectPrompt { prompt_id } => {
            let envelope = client.select_prompt(prompt_id).await?;
            if !envelope.success {
                bail!(
                    "{}",
                    envelope.message.as_deref().unwrap_or("prompt selection failed")
                );
            }
            println!("{} {}", "Selected prompt".green(), prompt_id.to_string().bold());
        }
        Command::Submit { file } => {
            let payload = read_json(&file)?;
            let envelope = client.submit_financial_data(&payload).await?;
            print_envelope(envelope.success, envelope.message.as_deref(), &envelope.data)?;
        }
        Command::Lifeplan { file } => {
            let request = read_json(&file)?;
            let response = client.generate_lifeplan(&request).await?;
            print_envelope(
                response.success,
                response.message.as_deref(),
                &response.lifeplan_data,
            )?;
        }
    }

    Ok(())
}

async fn run_repl(config: &Config, client: ApiClient, store: Arc<FileTokenStore>) -> Result<()> {
    match store.get() {
        Some(token) => match client.check_token(&token).await {
            Ok(true) => {}
            Ok(false) => println!("{}", config.locale.auth_required().yellow()),
            Err(error) => tracing::warn!(%error, "token check failed"),
        },
        None => println!("{}", config.locale.login_required().yellow()),
    }

    let (tx, mut events) = mpsc::unbounded_channel();
    let session = ChatSession::new(Arc::new(client), store.clone())
        .with_locale(config.locale)
        .with_event_sink(tx);

    let user = store.username().unwrap_or_else(|| "you".to_string());
    println!(
        "{} {}",
        "AlwaysChat".bold().magenta(),
        "/history /clear /quit, Ctrl-C stops a reply".dark_grey()
    );
    if session.load_chat_history().await.is_ok() {
        print_messages(&session.messages());
    }
    drain(&mut events);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", format!("{user}>").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/history" => {
                if session.load_chat_history().await.is_ok() {
                    print_messages(&session.messages());
                }
                drain(&mut events);
                continue;
            }
            "/clear" => {
                if session.clear_chat().await.is_ok() {
                    println!("{}", "History cleared.".dark_grey());
                }
                drain(&mut events);
                continue;
            }
            _ => {}
        }

        let before = session.messages().len();
        let turn = session.send_message(&line);
        tokio::pin!(turn);
        let outcome = loop {
            tokio::select! {
                outcome = &mut turn => break outcome,
                Some(event) = events.recv() => render_event(event),
                _ = tokio::signal::ctrl_c() => {
                    session.cancel_turn();
                }
            }
        };
        drain(&mut events);

        match outcome {
            SendOutcome::Failed => {
                if let Some(reply) = fallback_reply(&session.messages(), before) {
                    println!("{} {}", "advisor>".magenta().bold(), reply.content);
                }
            }
            SendOutcome::Cancelled => println!("{}", "(stopped)".dark_grey()),
            _ => {}
        }
    }

    session.shutdown();
    Ok(())
}

/// The apology a failed turn appended, if it appended one. A turn that never
/// reached the server leaves the log as it was.
fn fallback_reply(messages: &[Message], len_before: usize) -> Option<&Message> {
    if messages.len() <= len_before {
        return None;
    }
    messages.last().filter(|m| m.role == Role::Assistant)
}

fn render_event(event: SessionEvent) {
    match event {
        SessionEvent::TurnStarted => {
            print!("{} ", "advisor>".magenta().bold());
        }
        SessionEvent::Typing(true) => print!("{}", "…".dark_grey()),
        SessionEvent::Typing(false) => print!("\u{8} \u{8}"),
        SessionEvent::Fragment(text) => print!("{text}"),
        SessionEvent::TurnComplete => println!(),
        SessionEvent::Error(message) => eprintln!("{}", message.red()),
        SessionEvent::AuthExpired => {
            eprintln!("{}", "Run `alwayschat login <username>` first.".yellow())
        }
        SessionEvent::HistoryLoaded(_) | SessionEvent::Cleared => {}
    }
    let _ = std::io::stdout().flush();
}

fn drain(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Error(_) | SessionEvent::AuthExpired | SessionEvent::TurnComplete => {
                render_event(event)
            }
            _ => {}
        }
    }
}

fn print_messages(messages: &[Message]) {
    for message in messages {
        let label = match message.role {
            Role::User => "you>".cyan().bold(),
            Role::Assistant => "advisor>".magenta().bold(),
        };
        match &message.timestamp {
            Some(ts) => println!("{label} {} {}", message.content, ts.as_str().dark_grey()),
            None => println!("{label} {}", message.content),
        }
    }
}

fn print_envelope<T: Serialize>(success: bool, message: Option<&str>, data: &T) -> Result<()> {
    if !success {
        bail!("{}", message.unwrap_or("request failed"));
    }
    if let Some(message) = message {
        println!("{}", message.dark_grey());
    }
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    print!("password: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("password must not be empty");
    }
    Ok(password)
}
