//! Runs one table in process: an authority task plus two scripted
//! participants that limp and check every hand down. Useful for
//! watching the protocol with `RUST_LOG=debug`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use holdem_sync::game::{ActionKind, GameId, Phase, PlayerId};
use holdem_sync::sync::{
    ActionChannel, AuthorityCommand, AuthorityController, MemoryStore, ParticipantController,
    TableConfig,
};

const HANDS_TO_PLAY: u64 = 3;

async fn play_passively(mut me: ParticipantController) -> Result<()> {
    loop {
        if let Some(state) = me.poll().await?.cloned() {
            if state.hand_counter > HANDS_TO_PLAY {
                return Ok(());
            }
            if me.is_my_turn() {
                // Check when nothing is owed, call otherwise. The
                // authority treats an illegal check as a no-op, so
                // submitting both would also work; picking the legal
                // one keeps the logs clean.
                let owed = state.bet_to_match
                    > state
                        .seats
                        .iter()
                        .find(|p| p.id == me.player_id())
                        .map_or(0, |p| p.round_bet);
                let kind = if owed { ActionKind::Call } else { ActionKind::Check };
                me.submit(kind).await?;
            }
            if state.phase == Phase::Ended
                && let Some(outcome) = &state.last_outcome
            {
                println!("hand {}: {}", state.hand_counter, outcome.description);
            }
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = TableConfig {
        phase_delay: Duration::from_millis(200),
        showdown_delay: Duration::from_millis(400),
        ..TableConfig::default()
    };
    let store = Arc::new(MemoryStore::new());
    let channel = ActionChannel::new(store, GameId::new());

    let authority = AuthorityController::new(channel.clone(), config)
        .await
        .context("building the table authority")?;
    let (commands, command_rx) = mpsc::channel(4);
    let driver = tokio::spawn(authority.run(command_rx));

    let mut players = Vec::new();
    for (seat_idx, name) in ["alice", "bob"].into_iter().enumerate() {
        let mut participant = ParticipantController::new(PlayerId::new(), channel.clone());
        participant.connect().await?;
        participant.join_table(name.into(), seat_idx, 600).await?;
        players.push(tokio::spawn(play_passively(participant)));
    }
    for player in players {
        player.await??;
    }

    let finale = channel
        .latest_state()
        .await?
        .context("no state was ever published")?;
    println!(
        "final table after {} hands:\n{}",
        finale.state.hand_counter,
        serde_json::to_string_pretty(&finale.state)?
    );

    commands.send(AuthorityCommand::Close).await?;
    driver.await??;
    Ok(())
}
