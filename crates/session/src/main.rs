use std::io::BufRead;
use std::sync::Arc;

use anyhow::{bail, Context};
use shakmaty::{Color, Role, Square};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chess_core::types::side_name;
use evaluator::EvaluationService;
use session::config::Config;
use session::db::{self, PgStore};
use session::gateway::PersistenceGateway;
use session::machine::MoveOrigin;
use session::model::{GameId, ParticipantId};
use session::realtime::{MemoryRelay, PgRealtime};
use session::runner::{LocalInput, SessionEvent, SessionRunner, SessionSummary, View};

const USAGE: &str = "usage: relay-chess <create | join <game-id> | play <game-id> | computer [white|black]>";

enum Command {
    Create,
    Join(GameId),
    Play(GameId),
    Computer(Color),
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    let game_id = |arg: Option<&String>| -> anyhow::Result<GameId> {
        arg.context(USAGE)?
            .parse()
            .context("game id must be a number")
    };
    match args.first().map(String::as_str) {
        Some("create") => Ok(Command::Create),
        Some("join") => Ok(Command::Join(game_id(args.get(1))?)),
        Some("play") => Ok(Command::Play(game_id(args.get(1))?)),
        Some("computer") => match args.get(1).map(String::as_str) {
            None | Some("white") => Ok(Command::Computer(Color::White)),
            Some("black") => Ok(Command::Computer(Color::Black)),
            Some(other) => bail!("unknown side '{other}'\n{USAGE}"),
        },
        _ => bail!(USAGE),
    }
}

/// One line of player input.
fn parse_input(line: &str) -> Result<LocalInput, String> {
    let mut words = line.split_whitespace();
    let Some(word) = words.next() else {
        return Err("empty input".into());
    };
    let arg = words.next();

    match (word, arg) {
        ("quit" | "exit", _) => Ok(LocalInput::Quit),
        ("hint", _) => Ok(LocalInput::Hint),
        ("history", _) => Ok(LocalInput::Show(View::History)),
        ("fen", _) => Ok(LocalInput::Show(View::Fen)),
        ("pgn", _) => Ok(LocalInput::Show(View::Pgn)),
        ("captures", _) => Ok(LocalInput::Show(View::Captures)),
        ("cancel", _) => Ok(LocalInput::CancelSelection),
        ("click", Some(square)) => square
            .parse::<Square>()
            .map(LocalInput::Click)
            .map_err(|_| format!("not a square: {square}")),
        ("promote", Some(piece)) => piece
            .chars()
            .next()
            .and_then(|c| Role::from_char(c.to_ascii_lowercase()))
            .filter(|r| matches!(r, Role::Queen | Role::Rook | Role::Bishop | Role::Knight))
            .map(LocalInput::Promote)
            .ok_or_else(|| format!("not a promotion piece: {piece}")),
        (uci, None) => uci
            .parse()
            .map(LocalInput::Move)
            .map_err(|e| format!("{e}")),
        _ => Err(format!("unknown command: {line}")),
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Started => println!("Game started"),
        SessionEvent::MoveApplied { record, origin, .. } => {
            let who = match origin {
                MoveOrigin::Local => "you",
                MoveOrigin::Remote => "opponent",
            };
            println!("{}. {} ({who}, {})", record.fullmove, record.san, side_name(record.side));
        }
        SessionEvent::Rejected { candidate, reason } => println!("{candidate}: {reason}"),
        SessionEvent::Selection(outcome) => println!("{outcome:?}"),
        SessionEvent::Evaluation {
            score,
            advantage,
            quality,
            ..
        } => match quality {
            Some(q) => println!("eval {score:+.2} [{advantage:.0}% white] {q}"),
            None => println!("eval {score:+.2} [{advantage:.0}% white]"),
        },
        SessionEvent::Hint(Some(mv)) => println!("hint: {mv}"),
        SessionEvent::Hint(None) => println!("hint: no move"),
        SessionEvent::Report(text) => println!("{text}"),
        SessionEvent::Finished { outcome, result } => println!("Game over: {outcome} ({result})"),
        SessionEvent::Notice(text) => eprintln!("! {text}"),
    }
}

fn print_summary(summary: &SessionSummary) {
    println!("--");
    if summary.finished {
        println!("Result: {} ({})", summary.result, summary.outcome);
    } else {
        println!("Left game {} after {} plies", summary.game_id, summary.plies);
    }
    let c = &summary.counts;
    println!(
        "Your moves as {}: {} inaccuracies, {} mistakes, {} blunders",
        side_name(summary.local_side),
        c.inaccuracy,
        c.mistake,
        c.blunder
    );
    println!("{}", summary.pgn);
}

/// Feed stdin lines to the session until it stops listening.
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime
/// shutdown.
fn spawn_stdin(inputs: mpsc::Sender<LocalInput>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match parse_input(&line) {
                Ok(input) => {
                    if inputs.blocking_send(input).is_err() {
                        break;
                    }
                }
                Err(e) => eprintln!("! {e}"),
            }
        }
    });
}

async fn drive(runner: SessionRunner, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    let (input_tx, input_rx) = mpsc::channel(16);
    spawn_stdin(input_tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            print_event(&event);
        }
    });

    let summary = runner.run(input_rx).await;
    let _ = printer.await;
    print_summary(&summary);
}

async fn play_networked(
    config: &Config,
    store: Arc<PgStore>,
    game_id: GameId,
    player: ParticipantId,
) -> anyhow::Result<()> {
    let evaluator = Arc::new(EvaluationService::new(config.engine.clone()));
    if let Err(e) = evaluator.start().await {
        tracing::warn!(error = %e, "Playing without evaluation");
    }

    let realtime = PgRealtime::new(store.pool().clone());
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let runner = SessionRunner::open(
        store.clone(),
        &realtime,
        game_id,
        player,
        Some(evaluator.clone()),
        events_tx,
    )
    .await?
    .with_depths(config.engine.eval_depth, config.engine.hint_depth);

    drive(runner, events_rx).await;
    evaluator.stop().await;
    Ok(())
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<PgStore>> {
    tracing::info!("Connecting to database...");
    let pool = db::pool::create_pool(config.database_url()?)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Running migrations...");
    db::pool::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    Ok(Arc::new(PgStore::new(pool)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Logs go to stderr so they do not interleave with the board output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;
    let config = Config::from_env()?;

    match command {
        Command::Create => {
            let store = connect_store(&config).await?;
            let player = config.player_id()?;
            let game = store.create_game(player, &config.time_control).await?;
            println!("Created game {} (you play white); waiting for an opponent", game.id);
            play_networked(&config, store, game.id, player).await
        }
        Command::Join(game_id) => {
            let store = connect_store(&config).await?;
            let player = config.player_id()?;
            store.join_game(game_id, player).await?;
            println!("Joined game {game_id} (you play black)");
            play_networked(&config, store, game_id, player).await
        }
        Command::Play(game_id) => {
            let store = connect_store(&config).await?;
            let player = config.player_id()?;
            play_networked(&config, store, game_id, player).await
        }
        Command::Computer(side) => {
            let evaluator = Arc::new(EvaluationService::new(config.engine.clone()));
            evaluator
                .start()
                .await
                .context("Computer play needs a working Stockfish (STOCKFISH_PATH)")?;

            let relay = Arc::new(MemoryRelay::new());
            let player = config.player_id.unwrap_or_else(ParticipantId::random);
            let game = relay.create_game(player, &config.time_control).await?;

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let runner =
                SessionRunner::against_engine(relay, &game, player, side, evaluator.clone(), events_tx)
                    .with_depths(config.engine.eval_depth, config.engine.hint_depth);
            println!("Playing {} against Stockfish", side_name(side));

            drive(runner, events_rx).await;
            evaluator.stop().await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inputs() {
        assert_eq!(
            parse_input("e2e4"),
            Ok(LocalInput::Move("e2e4".parse().unwrap()))
        );
        assert_eq!(parse_input("click e2"), Ok(LocalInput::Click(Square::E2)));
        assert_eq!(parse_input("promote N"), Ok(LocalInput::Promote(Role::Knight)));
        assert_eq!(parse_input("history"), Ok(LocalInput::Show(View::History)));
        assert_eq!(parse_input("quit"), Ok(LocalInput::Quit));
        assert!(parse_input("promote k").is_err());
        assert!(parse_input("click z9").is_err());
        assert!(parse_input("e2").is_err());
    }

    #[test]
    fn test_parse_commands() {
        let args = |s: &str| s.split_whitespace().map(String::from).collect::<Vec<_>>();
        assert!(matches!(parse_command(&args("create")), Ok(Command::Create)));
        assert!(matches!(parse_command(&args("join 12")), Ok(Command::Join(12))));
        assert!(matches!(
            parse_command(&args("computer black")),
            Ok(Command::Computer(Color::Black))
        ));
        assert!(matches!(
            parse_command(&args("computer")),
            Ok(Command::Computer(Color::White))
        ));
        assert!(parse_command(&args("join abc")).is_err());
        assert!(parse_command(&args("spectate 1")).is_err());
    }
}
