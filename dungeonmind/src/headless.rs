//! Line-oriented game loop.
//!
//! - With world data, the first line is the adventure pitch
//! - Lines starting with `#` are commands (quit, status, history, character, help)
//! - All other lines are player messages

use anyhow::Result;
use dungeonmind_core::{
    ChatRequest, ConversationHistory, GameSession, ServiceFactory, SessionConfig, WorldData,
};
use std::io::{self, BufRead, Write};
use tracing::error;

const HELP: &[(&str, &str)] = &[
    ("#quit", "Exit the game"),
    ("#status", "Show turn counts"),
    ("#history", "Show the history sent to the DM"),
    ("#character", "Create a character from a description"),
    ("#help", "Show this help"),
];

pub async fn run_headless(
    factory: &ServiceFactory,
    config: &SessionConfig,
    world: Option<WorldData>,
) -> Result<()> {
    let mut session = GameSession::from_config(factory, config, world).await?;
    let mut history = ConversationHistory::new();
    let mut awaiting_pitch = session.has_campaigns();

    println!("=== DungeonMind ===");
    println!("Backend: {}", config.backend);
    print_help();
    if awaiting_pitch {
        println!("Describe the adventure you want to play:");
    } else {
        println!("Enter your actions (one per line):");
    }
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('#') {
            match command.split_whitespace().next() {
                Some("quit") | Some("exit") => {
                    println!("Goodbye!");
                    break;
                }
                Some("status") => {
                    let window = session.dm().window();
                    println!("[STATUS]");
                    println!("  Turns in history: {}", history.len());
                    println!("  Dialogue turns: {}", history.non_system_count());
                    println!(
                        "  Summarize at: {} (keeping {})",
                        window.trigger_threshold(),
                        window.retain_recent()
                    );
                    println!("  Turns in chat log: {}", session.store().log().len());
                }
                Some("history") => {
                    println!("[HISTORY]");
                    for turn in &history {
                        println!("  {}: {}", turn.role(), turn.content());
                    }
                }
                Some("character") => {
                    let description = command
                        .trim_start()
                        .split_once(char::is_whitespace)
                        .map_or("", |(_, rest)| rest.trim());
                    if description.is_empty() {
                        println!("Usage: #character <description>");
                    } else {
                        match session.create_character(description).await {
                            Ok(concept) => {
                                println!("[CHARACTER] {}", concept.name);
                                println!("  Race: {}", concept.race);
                                println!("  Class: {}", concept.class_name);
                                println!("  Background: {}", concept.background);
                            }
                            Err(e) => {
                                error!(error = %e, "Character creation failed");
                                println!("[ERROR] {e}");
                            }
                        }
                    }
                }
                Some("help") => print_help(),
                _ => println!("[ERROR] Unknown command: {line}"),
            }
            stdout.flush()?;
            continue;
        }

        if awaiting_pitch {
            match session.start_campaign(line).await {
                Ok((campaign, seeded)) => {
                    println!("[CAMPAIGN] {}", campaign.location.selected_location);
                    let hierarchy = campaign.location.hierarchy_label();
                    if !hierarchy.is_empty() {
                        println!("[LOCATION] {hierarchy}");
                    }
                    println!();
                    println!("{}", campaign.text);
                    history = seeded;
                    awaiting_pitch = false;
                }
                Err(e) => {
                    error!(error = %e, "Campaign generation failed");
                    println!("[ERROR] {e}");
                    println!("Try another pitch:");
                }
            }
        } else {
            let request = ChatRequest::new(line, history.clone());
            match session.chat(request).await {
                Ok(response) => {
                    println!("{}", response.assistant_message);
                    history = response.conversation_history;
                }
                Err(e) => {
                    error!(error = %e, "Chat failed");
                    println!("[ERROR] {e}");
                }
            }
        }

        println!();
        stdout.flush()?;
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    for (command, description) in HELP {
        println!("  {command:<10} - {description}");
    }
}
