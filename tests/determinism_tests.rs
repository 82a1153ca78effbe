//! Replay determinism.
//!
//! Replaying the same moves against freshly built games must reach the same
//! state, flow stack and message log. The seeded RNG is the only source of
//! randomness and its position travels with the snapshot.

use proptest::prelude::*;
use serde::{Deserialize, Serialize};

use rust_turnflow::actions::{Action, PendingMove, Selection};
use rust_turnflow::core::PlayerId;
use rust_turnflow::flow::{EachPlayer, Flow, FlowScope, Loop, PlayerActions, StepContext};
use rust_turnflow::game::{Game, GameBuilder, Move};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Dice {
    rolls: Vec<i64>,
    score: i64,
    rounds: i64,
}

/// Each round rolls a die, then every player either banks or rerolls.
fn dice_game(seed: u64) -> Game<Dice> {
    GameBuilder::new(Dice::default(), 3)
        .action(
            "bank",
            Action::<Dice>::new()
                .select(Selection::<Dice>::number("keep").min(0).max_with(|ctx| {
                    ctx.game.rolls.last().copied().unwrap_or(0)
                }))
                .perform(|ctx| {
                    ctx.game.score += ctx.number("keep").unwrap_or(0);
                    Ok(())
                })
                .message("{{player}} banked {{keep}}"),
        )
        .action(
            "reroll",
            Action::<Dice>::new().perform(|ctx| {
                let roll = ctx.rng.gen_range(1..7);
                ctx.game.rolls.push(roll);
                Ok(())
            }),
        )
        .flow(
            Loop::repeat_while(
                |scope: &FlowScope<'_, Dice>| scope.game.rounds < 3,
                Flow::sequence(vec![
                    Flow::step(|ctx: &mut StepContext<'_, Dice>| {
                        let roll = ctx.rng.gen_range(1..7);
                        ctx.game.rolls.push(roll);
                        ctx.game.rounds += 1;
                    }),
                    EachPlayer::new("turn", PlayerActions::new(["bank", "reroll"])).into(),
                ]),
            )
            .into(),
        )
        .seed(seed)
        .build()
        .unwrap()
}

/// Pick a complete move from the pending list using `choice`.
fn pick(game: &Game<Dice>, player: PlayerId, choice: usize) -> Move {
    let moves = game.pending_moves(player);
    let pending: &PendingMove = &moves[choice % moves.len()];
    let mut mv = Move::new(player, pending.action.clone());
    mv.args = pending.forced_args();
    if let Some(selection) = pending.selection() {
        if !mv.args.contains_key(&selection.name) {
            let options = selection.options();
            mv.args.insert(selection.name.clone(), options[choice % options.len()].clone());
        }
    }
    mv
}

fn play_out(seed: u64, choices: &[usize]) -> (Game<Dice>, Vec<Move>) {
    let mut game = dice_game(seed);
    let mut request = game.start().unwrap();
    let mut played = Vec::new();
    for choice in choices.iter().cycle() {
        let Some(current) = request else { break };
        let player = current.players().next().unwrap();
        let mv = pick(&game, player, *choice);
        request = game.process_move(&mv).unwrap();
        played.push(mv);
    }
    (game, played)
}

/// Test that two games with the same seed and moves end identically.
#[test]
fn test_replay_is_identical() {
    let (first, moves) = play_out(42, &[0, 1, 2, 3]);
    assert!(first.is_finished());

    let mut second = dice_game(42);
    second.start().unwrap();
    for mv in &moves {
        second.process_move(mv).unwrap();
    }

    assert_eq!(second.state(), first.state());
    assert_eq!(second.flow_json().unwrap(), first.flow_json().unwrap());
    assert_eq!(second.messages(), first.messages());
    assert_eq!(second.rng().state(), first.rng().state());
}

/// Test that a restored game draws the same numbers as the original.
#[test]
fn test_restore_continues_rng_stream() {
    let mut game = dice_game(7);
    game.start().unwrap();
    let p1 = PlayerId::new(0);
    game.process_move(&Move::new(p1, "reroll")).unwrap();

    let snapshot = game.snapshot().unwrap();
    let mut restored = dice_game(999);
    restored.restore(snapshot).unwrap();

    for player in [PlayerId::new(1), PlayerId::new(2)] {
        let mv = Move::new(player, "reroll");
        game.process_move(&mv).unwrap();
        restored.process_move(&mv).unwrap();
    }
    assert_eq!(restored.state().rolls, game.state().rolls);
    assert_eq!(restored.flow_json().unwrap(), game.flow_json().unwrap());
}

/// Test that different seeds give different rolls.
#[test]
fn test_seed_changes_rolls() {
    let rolls = |seed| {
        let (game, _) = play_out(seed, &[1]);
        game.state().rolls.clone()
    };
    assert_ne!(rolls(1), rolls(2));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Any move sequence replays to the same final state and stack.
    #[test]
    fn prop_replay_matches(
        seed in any::<u64>(),
        choices in prop::collection::vec(0usize..6, 1..12),
    ) {
        let (a, _) = play_out(seed, &choices);
        let (b, _) = play_out(seed, &choices);
        prop_assert_eq!(a.state(), b.state());
        prop_assert_eq!(a.flow_json().unwrap(), b.flow_json().unwrap());
        prop_assert_eq!(a.messages(), b.messages());
    }
}
