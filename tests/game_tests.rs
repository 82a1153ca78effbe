//! Driver-level tests: full games, persistence, and client submissions.

use serde::{Deserialize, Serialize};

use rust_turnflow::actions::Action;
use rust_turnflow::core::{Argument, FlowError, GameError, MoveError, PlayerId, PlayerMap};
use rust_turnflow::flow::{FlowScope, Loop, PlayerActions};
use rust_turnflow::game::{Game, GameBuilder, GameSnapshot, Move};
use rust_turnflow::games::{Nim, NimBuilder};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Tokens {
    tokens: PlayerMap<i64>,
}

impl Tokens {
    fn total(&self) -> i64 {
        self.tokens.values().sum()
    }
}

/// Every player may take one token from their own pile while any remain.
fn take_one_game(player_count: usize) -> Game<Tokens> {
    GameBuilder::new(
        Tokens {
            tokens: PlayerMap::with_value(player_count, 1),
        },
        player_count,
    )
    .action(
        "takeOne",
        Action::<Tokens>::new()
            .condition(|game, player| game.tokens[player] > 0)
            .perform(|ctx| {
                ctx.game.tokens[ctx.player] -= 1;
                Ok(())
            }),
    )
    .flow(
        Loop::repeat_while(
            |scope: &FlowScope<'_, Tokens>| scope.game.total() > 0,
            PlayerActions::new(["takeOne"]),
        )
        .into(),
    )
    .build()
    .unwrap()
}

/// Test four `takeOne` moves from four players end the loop at zero.
#[test]
fn test_take_one_four_players() {
    let mut game = take_one_game(4);
    let request = game.start().unwrap().unwrap();
    assert_eq!(request.players().count(), 4);

    let order = [2, 0, 3, 1].map(PlayerId::new);
    for (i, player) in order.iter().enumerate() {
        let next = game.process_move(&Move::new(*player, "takeOne")).unwrap();
        if i < 3 {
            let next = next.unwrap();
            assert!(next.actions_for(*player).is_none());
            assert_eq!(next.players().count(), 3 - i);
            assert!(!game.is_finished());
        } else {
            assert!(next.is_none());
        }
    }

    assert!(game.is_finished());
    assert_eq!(game.state().total(), 0);
}

/// Test that a player whose action is impossible is refused recoverably.
#[test]
fn test_impossible_action_is_recoverable() {
    let mut game = take_one_game(2);
    game.start().unwrap();
    let p1 = PlayerId::new(0);
    game.process_move(&Move::new(p1, "takeOne")).unwrap();

    let err = game.process_move(&Move::new(p1, "takeOne")).unwrap_err();
    assert!(err.is_recoverable());
    assert_eq!(game.state().tokens[p1], 0);
    assert!(game.allowed_actions(p1).is_empty());
}

/// Test a Nim game from start to finish with messages.
#[test]
fn test_nim_messages() {
    let mut game = NimBuilder::new().player_count(3).tokens_each(1).build().unwrap();
    game.start().unwrap();

    for player in PlayerId::all(3) {
        game.process_move(&Move::new(player, "takeOne")).unwrap();
    }

    assert!(game.is_finished());
    assert_eq!(
        game.take_messages(),
        vec![
            "Player 1 took a token",
            "Player 2 took a token",
            "Player 3 took a token",
            "Player 3 wins",
        ]
    );
}

/// Test pending moves for a player with several options.
#[test]
fn test_nim_pending_moves() {
    let mut game = NimBuilder::new().tokens_each(3).build().unwrap();
    game.start().unwrap();

    let moves = game.pending_moves(PlayerId::new(0));
    assert_eq!(moves.len(), 2);
    assert_eq!(moves[0].action, "takeOne");
    assert!(moves[0].is_ready());
    assert_eq!(moves[1].action, "take");
    let selection = moves[1].selection().unwrap();
    assert_eq!(selection.options(), vec![Argument::Number(2), Argument::Number(3)]);

    // Not this player's turn.
    assert!(game.pending_moves(PlayerId::new(1)).is_empty());
}

/// Test that a move out of turn is fatal and changes nothing.
#[test]
fn test_out_of_turn_move_is_fatal() {
    let mut game = NimBuilder::new().build().unwrap();
    game.start().unwrap();
    let before = game.snapshot().unwrap();

    let err = game.process_move(&Move::new(PlayerId::new(1), "takeOne")).unwrap_err();
    assert!(matches!(err, GameError::Flow(FlowError::IneligiblePlayer(_))));
    assert_eq!(game.snapshot().unwrap(), before);
}

/// Test client submissions decoded from JSON.
#[test]
fn test_move_from_json() {
    let mut game = NimBuilder::new().tokens_each(4).build().unwrap();
    game.start().unwrap();

    let mv = Move::from_json(r#"{"player": 1, "action": "take", "args": {"n": 3}}"#).unwrap();
    game.process_move(&mv).unwrap();
    assert_eq!(game.state().tokens[PlayerId::new(0)], 1);

    let bad = Move::from_json(r#"{"player": 2, "action": "take", "args": {"n": "$p[x]"}}"#);
    assert!(matches!(bad, Err(MoveError::Structural(_))));

    let too_many = Move::new(PlayerId::new(1), "take").with_arg("n", 5_i64);
    let err = game.process_move(&too_many).unwrap_err();
    assert!(matches!(err.as_move_error(), Some(MoveError::Structural(_))));
}

/// Test that a snapshot survives JSON and restores into a fresh game.
#[test]
fn test_snapshot_restore() {
    let mut game = NimBuilder::new().player_count(3).tokens_each(2).seed(11).build().unwrap();
    game.start().unwrap();
    game.process_move(&Move::new(PlayerId::new(0), "takeOne")).unwrap();

    let json = game.snapshot().unwrap().to_json().unwrap();
    let snapshot: GameSnapshot<Nim> = GameSnapshot::from_json(&json).unwrap();

    let mut restored = NimBuilder::new().player_count(3).tokens_each(2).build().unwrap();
    restored.restore(snapshot).unwrap();
    assert_eq!(restored.state(), game.state());
    assert_eq!(restored.current_players(), game.current_players());
    assert_eq!(restored.rng().state(), game.rng().state());
    assert_eq!(restored.action_request(), game.action_request());

    let mv = Move::new(PlayerId::new(1), "take").with_arg("n", 2_i64);
    assert_eq!(restored.process_move(&mv).unwrap(), game.process_move(&mv).unwrap());
    assert_eq!(restored.flow_json().unwrap(), game.flow_json().unwrap());
}

/// Test that a snapshot from a differently shaped game is refused.
#[test]
fn test_restore_rejects_other_program() {
    let mut nim = NimBuilder::new().build().unwrap();
    nim.start().unwrap();
    let flow_stack = nim.flow_json().unwrap();

    let mut other = take_one_game(2);
    let snapshot = GameSnapshot {
        players: PlayerId::all(2).collect(),
        entity_tree: Tokens {
            tokens: PlayerMap::with_value(2, 1),
        },
        flow_stack,
        random_seed: nim.rng().state(),
        current_players: vec![PlayerId::new(0)],
    };
    assert!(matches!(other.restore(snapshot), Err(FlowError::StackMismatch { .. })));
    assert!(!other.is_started());
}
