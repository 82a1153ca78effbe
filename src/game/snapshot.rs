//! Persisted game state.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{GameRngState, PlayerId};
use crate::flow::BranchStack;

/// Everything needed to rebuild a live game.
///
/// `S` is the game's own state type; the engine stores it as-is under
/// `entityTree`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot<S> {
    pub players: Vec<PlayerId>,
    pub entity_tree: S,
    pub flow_stack: Vec<BranchStack>,
    pub random_seed: GameRngState,
    pub current_players: Vec<PlayerId>,
}

impl<S: Serialize> GameSnapshot<S> {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl<S: DeserializeOwned> GameSnapshot<S> {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_field_names() {
        let snapshot = GameSnapshot {
            players: vec![PlayerId::new(0), PlayerId::new(1)],
            entity_tree: json!({"tokens": 3}),
            flow_stack: Vec::new(),
            random_seed: GameRngState { seed: 9, word_pos: 0 },
            current_players: vec![PlayerId::new(1)],
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["players"], json!([1, 2]));
        assert_eq!(value["entityTree"]["tokens"], 3);
        assert_eq!(value["randomSeed"]["seed"], 9);
        assert_eq!(value["currentPlayers"], json!([2]));

        let json = snapshot.to_json().unwrap();
        let back: GameSnapshot<serde_json::Value> = GameSnapshot::from_json(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
