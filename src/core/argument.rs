//! Arguments: the only values that cross the resolver/flow boundary.
//!
//! An `Argument` is what a player submits for one selection and what loops,
//! for-each blocks and switches bind to their names. `Args` is the named map
//! of them.
//!
//! ## Wire form
//!
//! | Variant  | JSON                     |
//! |----------|--------------------------|
//! | `Number` | `3`                      |
//! | `String` | `"red"`                  |
//! | `Bool`   | `true`                   |
//! | `Entity` | `"$eid[12]"`             |
//! | `Player` | `"$p[2]"` (seat position)|
//! | `List`   | `[ ... ]`                |
//!
//! A plain string that happens to look like a tag decodes as the tag.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::entity::EntityId;
use super::player::PlayerId;

/// Named argument map.
///
/// Persistent (`im`) so each speculative resolver frame can extend its own
/// copy in O(1) without touching the caller's.
pub type Args = im::OrdMap<String, Argument>;

/// A single submitted or bound value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Argument {
    Number(i64),
    String(String),
    Bool(bool),
    Entity(EntityId),
    Player(PlayerId),
    List(Vec<Argument>),
}

impl Argument {
    #[must_use]
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Argument::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Argument::Entity(e) => Some(*e),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_player(&self) -> Option<PlayerId> {
        match self {
            Argument::Player(p) => Some(*p),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Argument]> {
        match self {
            Argument::List(items) => Some(items),
            _ => None,
        }
    }

    /// Encode to the wire form as a JSON value.
    #[must_use]
    pub fn to_wire(&self) -> serde_json::Value {
        match self {
            Argument::Number(n) => serde_json::Value::from(*n),
            Argument::String(s) => serde_json::Value::from(s.as_str()),
            Argument::Bool(b) => serde_json::Value::from(*b),
            Argument::Entity(e) => serde_json::Value::from(entity_tag(*e)),
            Argument::Player(p) => serde_json::Value::from(player_tag(*p)),
            Argument::List(items) => {
                serde_json::Value::Array(items.iter().map(Argument::to_wire).collect())
            }
        }
    }

    fn from_wire_str(s: &str) -> Result<Self, String> {
        if let Some(inner) = tag_body(s, "$eid[") {
            let id = inner
                .parse::<u32>()
                .map_err(|_| format!("malformed entity reference `{s}`"))?;
            return Ok(Argument::Entity(EntityId(id)));
        }
        if let Some(inner) = tag_body(s, "$p[") {
            return inner
                .parse::<usize>()
                .ok()
                .and_then(PlayerId::from_position)
                .map(Argument::Player)
                .ok_or_else(|| format!("malformed player reference `{s}`"));
        }
        Ok(Argument::String(s.to_string()))
    }
}

fn entity_tag(entity: EntityId) -> String {
    format!("$eid[{}]", entity.raw())
}

fn player_tag(player: PlayerId) -> String {
    format!("$p[{}]", player.position())
}

fn tag_body<'s>(s: &'s str, prefix: &str) -> Option<&'s str> {
    s.strip_prefix(prefix)?.strip_suffix(']')
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Number(n) => write!(f, "{n}"),
            Argument::String(s) => write!(f, "{s}"),
            Argument::Bool(b) => write!(f, "{b}"),
            Argument::Entity(e) => write!(f, "{e}"),
            Argument::Player(p) => write!(f, "{p}"),
            Argument::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<i64> for Argument {
    fn from(n: i64) -> Self {
        Argument::Number(n)
    }
}

impl From<bool> for Argument {
    fn from(b: bool) -> Self {
        Argument::Bool(b)
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Argument::String(s.to_string())
    }
}

impl From<String> for Argument {
    fn from(s: String) -> Self {
        Argument::String(s)
    }
}

impl From<EntityId> for Argument {
    fn from(e: EntityId) -> Self {
        Argument::Entity(e)
    }
}

impl From<PlayerId> for Argument {
    fn from(p: PlayerId) -> Self {
        Argument::Player(p)
    }
}

impl<T: Into<Argument>> From<Vec<T>> for Argument {
    fn from(items: Vec<T>) -> Self {
        Argument::List(items.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Argument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Argument::Number(n) => serializer.serialize_i64(*n),
            Argument::String(s) => serializer.serialize_str(s),
            Argument::Bool(b) => serializer.serialize_bool(*b),
            Argument::Entity(e) => serializer.serialize_str(&entity_tag(*e)),
            Argument::Player(p) => serializer.serialize_str(&player_tag(*p)),
            Argument::List(items) => items.serialize(serializer),
        }
    }
}

struct ArgumentVisitor;

impl<'de> Visitor<'de> for ArgumentVisitor {
    type Value = Argument;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer, string, boolean, entity/player reference or list")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Argument, E> {
        Ok(Argument::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Argument, E> {
        Ok(Argument::Number(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Argument, E> {
        i64::try_from(v)
            .map(Argument::Number)
            .map_err(|_| E::custom(format!("number {v} is out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Argument, E> {
        Argument::from_wire_str(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Argument, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<Argument>()? {
            items.push(item);
        }
        Ok(Argument::List(items))
    }
}

impl<'de> Deserialize<'de> for Argument {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ArgumentVisitor)
    }
}
