use anyhow::Result;
use equilay_realtime::{VoiceHandle, VoiceStatus};
use equilay_state::{
    AppStore, ExecutionTiming, MarketFeed, NewBet, RiskUpdate, StrategyUpdate, format_gbp,
    format_number,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;

/// One line typed at the voice console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Start or stop the voice session.
    Talk,
    Status,
    /// Toggle automation.
    Live,
    /// Set the max liability per race.
    Risk(f64),
    /// Type a turn to the assistant instead of speaking it.
    Say(String),
    /// Record a lay bet by hand.
    Lay(NewBet),
    /// Mark a bet as matched by the exchange.
    Matched(String),
    Bets,
    /// Switch between pre-race and in-play execution.
    Timing(ExecutionTiming),
    Log,
    Markets,
    Help,
    Quit,
}

fn parse_number(word: Option<&str>, usage: &str) -> std::result::Result<f64, String> {
    let word = word.ok_or(usage)?;
    word.trim_start_matches('£').parse().map_err(|_| format!("not a number: {word}"))
}

impl ConsoleCommand {
    /// Parse a console line. An empty line toggles voice.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(Self::Talk);
        };
        let command = match head.to_ascii_lowercase().as_str() {
            "talk" | "t" => Self::Talk,
            "status" | "s" => Self::Status,
            "live" => Self::Live,
            "risk" => Self::Risk(parse_number(words.next(), "usage: risk <amount>")?),
            "say" => {
                let text = words.collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    return Err("usage: say <text>".to_string());
                }
                Self::Say(text)
            }
            "lay" => {
                const USAGE: &str = "usage: lay <time> <venue> <odds> <stake> <horse>";
                let time = words.next().ok_or(USAGE)?.to_string();
                let venue = words.next().ok_or(USAGE)?.to_string();
                let odds = parse_number(words.next(), USAGE)?;
                let stake = parse_number(words.next(), USAGE)?;
                let horse = words.collect::<Vec<_>>().join(" ");
                if horse.is_empty() {
                    return Err(USAGE.to_string());
                }
                Self::Lay(NewBet { time, venue, horse, odds, stake })
            }
            "matched" => Self::Matched(words.next().ok_or("usage: matched <bet-id>")?.to_string()),
            "bets" => Self::Bets,
            "timing" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("pre" | "pre-race") => Self::Timing(ExecutionTiming::PreRace),
                Some("inplay" | "in-play") => Self::Timing(ExecutionTiming::InPlay),
                _ => return Err("usage: timing pre|inplay".to_string()),
            },
            "log" => Self::Log,
            "markets" | "m" => Self::Markets,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };
        Ok(command)
    }
}

const HELP: &str = "\
Commands:
  talk, <enter>   start or stop the voice session
  status          voice and desk status
  live            start or pause automation
  risk <amount>   set max liability per race
  say <text>      type a turn to the assistant
  lay <time> <venue> <odds> <stake> <horse>
                  record a lay bet
  matched <id>    mark a bet as matched
  bets            bet log with ids
  timing pre|inplay
                  execution timing for automation
  log             recent activity
  markets         refresh race cards
  quit            end the session and exit";

fn describe(status: VoiceStatus) -> &'static str {
    match (status.is_connecting, status.is_active, status.is_speaking) {
        (true, _, _) => "connecting",
        (false, true, true) => "live (speaking)",
        (false, true, false) => "live (listening)",
        (false, false, _) => "idle",
    }
}

fn print_status(voice: &VoiceHandle, store: &AppStore) {
    let state = store.snapshot();
    println!("Voice:       {}", describe(voice.status()));
    println!("Automation:  {}", if state.is_live { "ACTIVE" } else { "PAUSED" });
    println!("Total PnL:   {}", format_gbp(state.total_pnl));
    println!("Today:       {}", format_gbp(state.today_profit));
    println!("Liability:   {}", format_gbp(state.active_liability));
    println!(
        "Risk:        max liability {}, target {}",
        format_gbp(state.risk.max_liability_per_race),
        format_gbp(state.risk.target_profit)
    );
}

fn print_bets(store: &AppStore) {
    let state = store.snapshot();
    if state.bets.is_empty() {
        println!("(no bets yet)");
    }
    for bet in &state.bets {
        println!(
            "{}  {} {}  {} @ {}  stake {}  liability {}  {:?}",
            bet.id,
            bet.time,
            bet.venue,
            bet.horse,
            format_number(bet.odds),
            format_gbp(bet.stake),
            format_gbp(bet.liability()),
            bet.status
        );
    }
}

fn print_log(store: &AppStore, limit: usize) {
    let entries = store.log_messages();
    if entries.is_empty() {
        println!("(no activity yet)");
    }
    for entry in entries.iter().take(limit).rev() {
        println!("{entry}");
    }
}

/// Interactive loop driving `voice` and `store` until `quit` or end of input.
pub async fn run_voice_console(
    voice: VoiceHandle,
    store: AppStore,
    feed: Arc<dyn MarketFeed>,
) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let mut status_rx = voice.subscribe();
    let status_printer = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            println!("[voice] {}", describe(status));
        }
    });

    println!("EquiLay Voice Console");
    println!("Press Enter to talk. Type `help` for commands, Ctrl+C to exit.\n");

    loop {
        let readline = tokio::task::block_in_place(|| rl.readline("equilay> "));
        match readline {
            Ok(line) => {
                if !line.trim().is_empty() {
                    rl.add_history_entry(line.as_str())?;
                }
                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Talk) => voice.toggle()?,
                    Ok(ConsoleCommand::Status) => print_status(&voice, &store),
                    Ok(ConsoleCommand::Live) => {
                        let live = store.toggle_live();
                        println!("Automation {}", if live { "ACTIVE" } else { "PAUSED" });
                    }
                    Ok(ConsoleCommand::Risk(amount)) => {
                        match store.update_risk(RiskUpdate::max_liability(amount)) {
                            Ok(risk) => {
                                println!("Max liability {}", format_gbp(risk.max_liability_per_race))
                            }
                            Err(e) => eprintln!("Error: {e}"),
                        }
                    }
                    Ok(ConsoleCommand::Say(text)) => voice.send_text(text)?,
                    Ok(ConsoleCommand::Lay(request)) => match store.place_lay_bet(request) {
                        Ok(bet) => println!(
                            "Lay bet {} recorded, liability {}",
                            bet.id,
                            format_gbp(bet.liability())
                        ),
                        Err(e) => eprintln!("Error: {e}"),
                    },
                    Ok(ConsoleCommand::Matched(id)) => {
                        if let Err(e) = store.mark_matched(&id) {
                            eprintln!("Error: {e}");
                        }
                    }
                    Ok(ConsoleCommand::Bets) => print_bets(&store),
                    Ok(ConsoleCommand::Timing(timing)) => {
                        let update = StrategyUpdate { execution_timing: Some(timing), ..Default::default() };
                        match store.update_strategy(update) {
                            Ok(strategy) => println!("Execution timing {:?}", strategy.execution_timing),
                            Err(e) => eprintln!("Error: {e}"),
                        }
                    }
                    Ok(ConsoleCommand::Log) => print_log(&store, 20),
                    Ok(ConsoleCommand::Markets) => {
                        if let Some(report) = store.refresh_races(feed.as_ref()).await {
                            println!("{report}");
                        } else {
                            print_log(&store, 1);
                        }
                    }
                    Ok(ConsoleCommand::Help) => println!("{HELP}"),
                    Ok(ConsoleCommand::Quit) => break,
                    Err(message) => eprintln!("{message}"),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    voice.shutdown().await;
    status_printer.abort();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse(""), Ok(ConsoleCommand::Talk));
        assert_eq!(ConsoleCommand::parse("   "), Ok(ConsoleCommand::Talk));
        assert_eq!(ConsoleCommand::parse("STATUS"), Ok(ConsoleCommand::Status));
        assert_eq!(ConsoleCommand::parse("risk 250"), Ok(ConsoleCommand::Risk(250.0)));
        assert_eq!(ConsoleCommand::parse("risk £75.5"), Ok(ConsoleCommand::Risk(75.5)));
        assert_eq!(ConsoleCommand::parse("quit"), Ok(ConsoleCommand::Quit));
        assert!(ConsoleCommand::parse("risk").is_err());
        assert!(ConsoleCommand::parse("risk lots").is_err());
        assert!(ConsoleCommand::parse("bet now").is_err());
    }

    #[test]
    fn test_parse_say_keeps_whole_line() {
        assert_eq!(
            ConsoleCommand::parse("say what is my   liability"),
            Ok(ConsoleCommand::Say("what is my liability".to_string()))
        );
        assert!(ConsoleCommand::parse("say").is_err());
    }

    #[test]
    fn test_parse_desk_commands() {
        assert_eq!(
            ConsoleCommand::parse("lay 15:10 Cheltenham 3.5 £20 Desert Orchid"),
            Ok(ConsoleCommand::Lay(NewBet {
                time: "15:10".into(),
                venue: "Cheltenham".into(),
                horse: "Desert Orchid".into(),
                odds: 3.5,
                stake: 20.0,
            }))
        );
        assert!(ConsoleCommand::parse("lay 15:10 Cheltenham 3.5 20").is_err());
        assert!(ConsoleCommand::parse("lay 15:10 Cheltenham evens 20 Arkle").is_err());

        assert_eq!(ConsoleCommand::parse("matched 9f2c"), Ok(ConsoleCommand::Matched("9f2c".into())));
        assert!(ConsoleCommand::parse("matched").is_err());
        assert_eq!(ConsoleCommand::parse("bets"), Ok(ConsoleCommand::Bets));
        assert_eq!(
            ConsoleCommand::parse("timing In-Play"),
            Ok(ConsoleCommand::Timing(ExecutionTiming::InPlay))
        );
        assert_eq!(ConsoleCommand::parse("timing pre"), Ok(ConsoleCommand::Timing(ExecutionTiming::PreRace)));
        assert!(ConsoleCommand::parse("timing later").is_err());
    }

    #[test]
    fn test_describe_status() {
        let mut status = VoiceStatus::default();
        assert_eq!(describe(status), "idle");
        status.is_connecting = true;
        assert_eq!(describe(status), "connecting");
        status = VoiceStatus { is_active: true, is_connecting: false, is_speaking: true };
        assert_eq!(describe(status), "live (speaking)");
    }
}
