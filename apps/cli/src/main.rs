use std::{io::Write, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    phase::{format_countdown, round_phase},
    ClientError, Clock, HttpApi, RoundCache, RoundClock, RoundPhase, RoundView, SessionStore,
    SystemClock,
};
use shared::{
    domain::{RoundDetail, RoundId, RoundStatusFilter, RoundSummary},
    protocol::ListRoundsQuery,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, prepare_database_url, validate_api_url};

const LEADERBOARD_SIZE: usize = 5;

#[derive(Parser, Debug)]
#[command(name = "tapper", about = "Play tap rounds from the terminal")]
struct Args {
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and remember the session.
    Login {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    Logout,
    /// Re-validate the remembered session with the server.
    Whoami,
    /// List rounds with their phase as of now.
    Rounds {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        /// Keep following the pagination cursor until the list is exhausted.
        #[arg(long)]
        all: bool,
    },
    /// Create a round (admins only).
    Create,
    Show {
        id: String,
    },
    /// Follow a round's phase and countdown once per second.
    Watch {
        id: String,
        #[arg(long)]
        ticks: Option<u32>,
    },
    Tap {
        id: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

struct App {
    session: Arc<SessionStore>,
    rounds: Arc<RoundCache>,
    clock: Arc<dyn Clock>,
    page_limit: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(database_url) = args.database_url {
        settings.database_url = database_url;
    }

    let api_url = validate_api_url(&settings.api_url)?;
    let database_url = prepare_database_url(&settings.database_url)?;
    info!(api_url = %api_url, database_url = %database_url, "tapper: starting");

    let persistence = Arc::new(Storage::new(&database_url).await?);
    let api = Arc::new(HttpApi::new(api_url.as_str())?);
    let session = Arc::new(SessionStore::restore(Arc::clone(&api) as _, persistence).await);
    let rounds = Arc::new(RoundCache::new(api, Arc::clone(&session) as _));

    let app = App {
        session,
        rounds,
        clock: Arc::new(SystemClock),
        page_limit: settings.page_limit,
    };
    app.run(args.command).await
}

impl App {
    async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login { username, password } => self.login(&username, password).await,
            Command::Logout => {
                self.session.logout().await;
                println!("Signed out.");
                Ok(())
            }
            Command::Whoami => self.whoami().await,
            Command::Rounds { status, limit, all } => {
                let status = status.as_deref().map(RoundStatusFilter::from);
                self.list(status, limit.unwrap_or(self.page_limit), all)
                    .await
            }
            Command::Create => self.create().await,
            Command::Show { id } => self.show(RoundId::new(id)).await,
            Command::Watch { id, ticks } => self.watch(RoundId::new(id), ticks).await,
            Command::Tap { id, count } => self.tap(RoundId::new(id), count).await,
        }
    }

    async fn login(&self, username: &str, password: Option<String>) -> Result<()> {
        let password = match password {
            Some(password) => password,
            None => prompt("Password: ")?,
        };
        let identity = self.session.login(username, &password).await?;
        println!("Signed in as {} ({})", identity.username, identity.role);
        Ok(())
    }

    async fn whoami(&self) -> Result<()> {
        self.session.check_session().await;
        match self.session.identity().await {
            Some(identity) => println!("{} ({})", identity.username, identity.role),
            None => println!("Not signed in."),
        }
        Ok(())
    }

    async fn list(&self, status: Option<RoundStatusFilter>, limit: u32, all: bool) -> Result<()> {
        self.require_session().await?;
        self.rounds
            .list_rounds(ListRoundsQuery::first_page(limit).with_status(status.clone()))
            .await?;
        while all && self.rounds.load_more(limit, status.clone()).await? {}

        let snapshot = self.rounds.snapshot().await;
        if snapshot.rounds.is_empty() {
            println!("No rounds.");
        }
        let now = self.clock.now();
        for round in &snapshot.rounds {
            print_round_line(round, round_phase(now, round));
        }
        if snapshot.pagination.has_more {
            println!("... more rounds available (use --all)");
        }
        Ok(())
    }

    async fn create(&self) -> Result<()> {
        self.require_session().await?;
        if !self.session.is_admin().await {
            bail!("only admins can create rounds");
        }
        let round = self.rounds.create_round().await?;
        println!("Created round {}", round.id);
        print_round_line(&round, round_phase(self.clock.now(), &round));
        Ok(())
    }

    async fn show(&self, round_id: RoundId) -> Result<()> {
        self.require_session().await?;
        let view = RoundView::open(Arc::clone(&self.rounds), Arc::clone(&self.clock), round_id)
            .await?;
        if let Some(detail) = view.detail().await {
            print_detail(&detail, view.evaluate_now().await);
        }
        view.close().await;
        Ok(())
    }

    async fn watch(&self, round_id: RoundId, ticks: Option<u32>) -> Result<()> {
        self.require_session().await?;
        let view = RoundView::open(Arc::clone(&self.rounds), Arc::clone(&self.clock), round_id)
            .await?;
        let Some(mut readings) = view.subscribe() else {
            bail!("round view is not ticking");
        };

        let mut seen = 0;
        while ticks.map_or(true, |limit| seen < limit) {
            if readings.changed().await.is_err() {
                println!("Round is no longer available.");
                break;
            }
            seen += 1;
            let reading = *readings.borrow_and_update();
            match reading {
                RoundClock::Known {
                    phase,
                    countdown_secs,
                } => {
                    println!("{phase:<8} {}", format_countdown(countdown_secs));
                    if phase == RoundPhase::Finished {
                        break;
                    }
                }
                RoundClock::Unknown => println!("unknown"),
            }
        }

        if let Some(detail) = view.detail().await {
            print_detail(&detail, view.clock());
        }
        view.close().await;
        Ok(())
    }

    async fn tap(&self, round_id: RoundId, count: u32) -> Result<()> {
        self.require_session().await?;
        let view = RoundView::open(Arc::clone(&self.rounds), Arc::clone(&self.clock), round_id)
            .await?;

        let mut registered = 0;
        for _ in 0..count {
            match view.tap().await {
                Ok(delta) => {
                    registered += 1;
                    println!("+{} tap, +{} points", delta.taps, delta.score);
                }
                Err(ClientError::TapRejected(phase)) => {
                    println!("Round is {phase}; taps are not accepted.");
                    break;
                }
                Err(err) => {
                    view.close().await;
                    return Err(err.into());
                }
            }
        }

        if let Some(detail) = view.detail().await {
            println!(
                "{registered} tap(s) registered. You: {} taps, {} points. Round total: {}",
                detail.my_stats.taps, detail.my_stats.score, detail.round.total_score
            );
        }
        view.close().await;
        Ok(())
    }

    async fn require_session(&self) -> Result<()> {
        if !self.session.is_authenticated().await {
            bail!("not signed in; run `tapper login <username>` first");
        }
        Ok(())
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    std::io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn print_round_line(round: &RoundSummary, phase: RoundPhase) {
    println!(
        "{:<38} {:<8} {} -> {}  score {}",
        round.id,
        phase,
        local_time(round.start_time),
        local_time(round.end_time),
        round.total_score
    );
}

fn print_detail(detail: &RoundDetail, reading: RoundClock) {
    let round = &detail.round;
    println!("Round {}", round.id);
    println!("  starts   {}", local_time(round.start_time));
    println!("  ends     {}", local_time(round.end_time));
    match reading {
        RoundClock::Known {
            phase,
            countdown_secs,
        } => {
            println!("  phase    {phase}");
            if phase != RoundPhase::Finished {
                println!("  {}  {}", countdown_label(phase), format_countdown(countdown_secs));
            } else {
                match detail.winner() {
                    Some(winner) => {
                        println!("  winner   {} ({} points)", winner.username(), winner.score)
                    }
                    None => println!("  winner   nobody"),
                }
            }
        }
        RoundClock::Unknown => println!("  phase    unknown"),
    }
    println!("  total    {}", round.total_score);
    println!(
        "  you      {} taps, {} points",
        detail.my_stats.taps, detail.my_stats.score
    );
    if !detail.top_stats.is_empty() {
        println!("  leaderboard");
        for (rank, entry) in detail.top_stats.iter().take(LEADERBOARD_SIZE).enumerate() {
            println!(
                "    {}. {:<20} {:>6} taps {:>6} points",
                rank + 1,
                entry.username(),
                entry.taps,
                entry.score
            );
        }
    }
}

fn countdown_label(phase: RoundPhase) -> &'static str {
    match phase {
        RoundPhase::Waiting => "starts in",
        _ => "ends in ",
    }
}
