//! Personal-pile Nim, for exercising the engine.
//!
//! - Every player starts with the same number of tokens in their own pile
//! - Rounds go around the table while any tokens remain
//! - On your turn: take one token, or take several at once
//! - A player with an empty pile is passed over
//! - Whoever takes the last token wins
//!
//! Supports any player count to verify N-player generality.

use serde::{Deserialize, Serialize};

use crate::actions::{Action, Selection};
use crate::core::{FlowError, PlayerId, PlayerMap};
use crate::flow::{EachPlayer, Flow, FlowScope, Loop, PlayerActions, StepContext};
use crate::game::{Game, GameBuilder};

/// Table state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nim {
    pub tokens: PlayerMap<i64>,
    pub last_taker: Option<PlayerId>,
    pub winner: Option<PlayerId>,
}

impl Nim {
    pub fn new(player_count: usize, tokens_each: i64) -> Self {
        Self {
            tokens: PlayerMap::with_value(player_count, tokens_each),
            last_taker: None,
            winner: None,
        }
    }

    /// Tokens left on the table.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.tokens.values().sum()
    }

    fn take(&mut self, player: PlayerId, n: i64) -> Result<(), String> {
        if n > self.tokens[player] {
            return Err(format!("{player} only has {} tokens", self.tokens[player]));
        }
        self.tokens[player] -= n;
        self.last_taker = Some(player);
        Ok(())
    }
}

/// Builder for a Nim game.
pub struct NimBuilder {
    player_count: usize,
    tokens_each: i64,
    seed: u64,
}

impl Default for NimBuilder {
    fn default() -> Self {
        Self {
            player_count: 2,
            tokens_each: 3,
            seed: 0,
        }
    }
}

impl NimBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn player_count(mut self, count: usize) -> Self {
        assert!((1..=8).contains(&count), "Player count must be 1-8");
        self.player_count = count;
        self
    }

    pub fn tokens_each(mut self, tokens: i64) -> Self {
        self.tokens_each = tokens;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(self) -> Result<Game<Nim>, FlowError> {
        GameBuilder::new(Nim::new(self.player_count, self.tokens_each), self.player_count)
            .action("takeOne", take_one())
            .action("take", take_many())
            .flow(main_flow())
            .seed(self.seed)
            .build()
    }
}

fn take_one() -> Action<Nim> {
    Action::<Nim>::new()
        .prompt("Take one token")
        .condition(|game, player| game.tokens[player] > 0)
        .perform(|ctx| ctx.game.take(ctx.player, 1))
        .message("{{player}} took a token")
}

fn take_many() -> Action<Nim> {
    Action::<Nim>::new()
        .prompt("Take several tokens")
        .condition(|game, player| game.tokens[player] > 1)
        .select(
            Selection::<Nim>::number("n")
                .prompt("How many?")
                .min(2)
                .max_with(|ctx| ctx.game.tokens[ctx.player]),
        )
        .perform(|ctx| {
            let n = ctx.number("n").unwrap_or(0);
            ctx.game.take(ctx.player, n)
        })
        .message("{{player}} took {{n}} tokens")
}

fn main_flow() -> Flow<Nim> {
    Flow::sequence(vec![
        Loop::repeat_while(
            |scope: &FlowScope<'_, Nim>| scope.game.total() > 0,
            EachPlayer::new("turn", PlayerActions::new(["takeOne", "take"]).named("move")),
        )
        .named("round")
        .into(),
        Flow::step(|ctx: &mut StepContext<'_, Nim>| {
            ctx.game.winner = ctx.game.last_taker;
            if let Some(winner) = ctx.game.winner {
                ctx.message(format!("{winner} wins"));
            }
        }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Move;

    #[test]
    fn test_two_player_game_to_completion() {
        let mut game = NimBuilder::new().tokens_each(2).build().unwrap();
        let request = game.start().unwrap().unwrap();
        assert_eq!(request.players().collect::<Vec<_>>(), vec![PlayerId::new(0)]);

        let p1 = PlayerId::new(0);
        let p2 = PlayerId::new(1);
        game.process_move(&Move::new(p1, "take").with_arg("n", 2_i64)).unwrap();
        let request = game.process_move(&Move::new(p2, "takeOne")).unwrap().unwrap();
        // Player 1 has nothing left and is passed over.
        assert_eq!(request.players().collect::<Vec<_>>(), vec![p2]);

        assert_eq!(game.process_move(&Move::new(p2, "takeOne")).unwrap(), None);
        assert!(game.is_finished());
        assert_eq!(game.state().winner, Some(p2));
        assert_eq!(game.messages().last().map(String::as_str), Some("Player 2 wins"));
    }

    #[test]
    fn test_take_is_hidden_with_one_token() {
        let mut game = NimBuilder::new().tokens_each(1).build().unwrap();
        game.start().unwrap();
        assert_eq!(game.allowed_actions(PlayerId::new(0)), vec!["takeOne".to_string()]);
    }
}
