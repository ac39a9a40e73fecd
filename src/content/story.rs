//! Read-only story content: characters and their levels, triggers, evidence
//! requirements, clues, specialization categories, objects and places.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub type CharacterId = u32;
pub type ObjectId = u32;
pub type ClueId = u32;
pub type LocationId = u32;
pub type AreaId = u32;
pub type DetailId = u32;
pub type TriggerId = u32;

/// Specialization requirements: category id to minimum level.
pub type SpecializationGate = BTreeMap<String, u32>;

/// A complete story as loaded from content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Location discovered (with its ungated areas) when a session starts.
    #[serde(default)]
    pub starting_location: Option<LocationId>,
    #[serde(default)]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub clues: Vec<Clue>,
    #[serde(default)]
    pub categories: Vec<SpecializationCategory>,
    #[serde(default)]
    pub objects: Vec<GameObject>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub access_points: Vec<AccessPoint>,
}

impl Story {
    pub fn character(&self, id: CharacterId) -> Option<&Character> {
        self.characters.iter().find(|c| c.id == id)
    }

    pub fn clue(&self, id: ClueId) -> Option<&Clue> {
        self.clues.iter().find(|c| c.id == id)
    }

    pub fn category(&self, id: &str) -> Option<&SpecializationCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn location(&self, id: LocationId) -> Option<&Location> {
        self.locations.iter().find(|l| l.id == id)
    }

    /// Find an area and the location that owns it.
    pub fn area(&self, id: AreaId) -> Option<(&Location, &Area)> {
        self.locations
            .iter()
            .find_map(|l| l.areas.iter().find(|a| a.id == id).map(|a| (l, a)))
    }

    pub fn access_point(&self, code: &str) -> Option<&AccessPoint> {
        self.access_points.iter().find(|p| p.code == code)
    }
}

/// An NPC with immutable base traits and an ordered list of behavioral levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    #[serde(default)]
    pub base_description: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub levels: Vec<CharacterLevel>,
}

impl Character {
    pub fn level(&self, level_number: u32) -> Option<&CharacterLevel> {
        self.levels.iter().find(|l| l.level_number == level_number)
    }

    /// Highest declared level; the terminal state. Loaded stories number
    /// their levels contiguously from 0.
    pub fn max_level(&self) -> u32 {
        self.levels
            .iter()
            .map(|l| l.level_number)
            .max()
            .unwrap_or(0)
    }

    /// Find a trigger by id along with the level that declares it.
    pub fn trigger(&self, id: TriggerId) -> Option<(&CharacterLevel, &Trigger)> {
        self.levels
            .iter()
            .find_map(|l| l.triggers.iter().find(|t| t.id == id).map(|t| (l, t)))
    }
}

/// One behavioral state of a character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterLevel {
    pub level_number: u32,
    #[serde(default)]
    pub knowledge_scope: String,
    /// How the character carries themselves at this level; handed to the
    /// narrative service as phrasing context.
    #[serde(default)]
    pub narrative_stance: String,
    #[serde(default)]
    pub is_defensive: bool,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
}

/// A keyword/phrase pattern scoped to a character level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: TriggerId,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    /// All keywords and phrases must be present (AND) instead of any one (OR).
    #[serde(default)]
    pub combination_required: bool,
    #[serde(default)]
    pub defensive_response: String,
    #[serde(default)]
    pub success_response: String,
    #[serde(default)]
    pub fail_response: String,
    #[serde(default)]
    pub requirements: Vec<EvidenceRequirement>,
    #[serde(default)]
    pub specialization_required: SpecializationGate,
    #[serde(default)]
    pub reward: Option<Reward>,
}

impl Trigger {
    /// Keywords and phrases in declaration order.
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.keywords
            .iter()
            .chain(self.phrases.iter())
            .map(String::as_str)
    }
}

/// Evidence the player must hold before a trigger succeeds.
///
/// A single id behaves as a scalar check; several ids are any-of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvidenceRequirement {
    /// Any of the objects is in the inventory.
    Object {
        #[serde(alias = "target_id", deserialize_with = "one_or_many")]
        target_ids: Vec<ObjectId>,
        #[serde(default)]
        hint_on_failure: String,
    },
    /// Any of the objects has been examined, or any keyword appears in the
    /// utterance.
    Knowledge {
        #[serde(default, alias = "target_id", deserialize_with = "one_or_many")]
        target_ids: Vec<ObjectId>,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        hint_on_failure: String,
    },
    /// Any of the details has been seen, in `area_id` when given.
    Observation {
        #[serde(alias = "detail_id", deserialize_with = "one_or_many")]
        detail_ids: Vec<DetailId>,
        #[serde(default)]
        area_id: Option<AreaId>,
        #[serde(default)]
        hint_on_failure: String,
    },
}

impl EvidenceRequirement {
    pub fn hint_on_failure(&self) -> &str {
        match self {
            Self::Object {
                hint_on_failure, ..
            }
            | Self::Knowledge {
                hint_on_failure, ..
            }
            | Self::Observation {
                hint_on_failure, ..
            } => hint_on_failure,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// Specialization points granted once per interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub category: String,
    pub points: u32,
}

/// A narrative fact unlocked by one or more discovery conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clue {
    pub id: ClueId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discovery_conditions: Vec<DiscoveryCondition>,
    #[serde(default)]
    pub reward: Option<Reward>,
}

/// A predicate over a discovery source. Any matching condition unlocks the
/// clue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryCondition {
    Detail {
        #[serde(default)]
        location_id: Option<LocationId>,
        #[serde(default)]
        area_id: Option<AreaId>,
        detail_id: DetailId,
    },
    Character {
        character_id: CharacterId,
        /// Only unlock once the character reaches this level.
        #[serde(default)]
        min_level: Option<u32>,
    },
    ObjectLevel {
        object_id: ObjectId,
        min_level: u32,
    },
}

/// A skill track with ascending point thresholds. Index `i` holds the points
/// needed for level `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecializationCategory {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level_thresholds: Vec<u32>,
}

impl SpecializationCategory {
    /// Level reached with `points`: the number of thresholds met.
    pub fn level_for(&self, points: u32) -> u32 {
        level_for(&self.level_thresholds, points)
    }

    pub fn max_level(&self) -> u32 {
        self.level_thresholds.len() as u32
    }
}

/// Level reached with `points` against ascending `thresholds`.
pub fn level_for(thresholds: &[u32], points: u32) -> u32 {
    thresholds.iter().take_while(|&&t| points >= t).count() as u32
}

/// A collectible object with a bounded knowledge level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObject {
    pub id: ObjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_object_max_level")]
    pub max_level: u32,
    #[serde(default)]
    pub reward: Option<Reward>,
}

fn default_object_max_level() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    #[serde(default)]
    pub areas: Vec<Area>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub name: String,
    #[serde(default)]
    pub detail_ids: Vec<DetailId>,
    /// Areas with a gate stay hidden until every category meets its minimum.
    #[serde(default)]
    pub specialization_required: SpecializationGate,
    /// Optional reward for the first observation of each detail here.
    #[serde(default)]
    pub reward: Option<Reward>,
}

/// A scannable code gating entry to a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub code: String,
    /// Location the player must already have discovered.
    #[serde(default)]
    pub required_location: Option<LocationId>,
    /// Location granted when access succeeds.
    #[serde(default)]
    pub grants_location: Option<LocationId>,
    #[serde(default)]
    pub required_objects: Vec<ObjectId>,
    #[serde(default)]
    pub specialization_required: SpecializationGate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_thresholds() {
        let thresholds = [15, 40, 80];
        assert_eq!(level_for(&thresholds, 0), 0);
        assert_eq!(level_for(&thresholds, 14), 0);
        assert_eq!(level_for(&thresholds, 15), 1);
        assert_eq!(level_for(&thresholds, 79), 2);
        assert_eq!(level_for(&thresholds, 500), 3);
        assert_eq!(level_for(&[], 500), 0);
    }

    #[test]
    fn test_requirement_accepts_scalar_or_list() {
        let scalar: EvidenceRequirement = serde_json::from_str(
            r#"{"kind": "object", "target_id": 10, "hint_on_failure": "Show me"}"#,
        )
        .unwrap();
        assert_eq!(
            scalar,
            EvidenceRequirement::Object {
                target_ids: vec![10],
                hint_on_failure: "Show me".into()
            }
        );

        let list: EvidenceRequirement =
            serde_json::from_str(r#"{"kind": "observation", "detail_ids": [3, 4], "area_id": 2}"#)
                .unwrap();
        assert_eq!(
            list,
            EvidenceRequirement::Observation {
                detail_ids: vec![3, 4],
                area_id: Some(2),
                hint_on_failure: String::new()
            }
        );
    }

    #[test]
    fn test_knowledge_requirement_keywords_only() {
        let req: EvidenceRequirement =
            serde_json::from_str(r#"{"kind": "knowledge", "keywords": ["poison"]}"#).unwrap();
        match req {
            EvidenceRequirement::Knowledge {
                target_ids,
                keywords,
                ..
            } => {
                assert!(target_ids.is_empty());
                assert_eq!(keywords, vec!["poison"]);
            }
            other => panic!("unexpected requirement: {:?}", other),
        }
    }

    #[test]
    fn test_character_lookup_helpers() {
        let character = Character {
            id: 1,
            name: "Butler".into(),
            levels: vec![
                CharacterLevel {
                    level_number: 0,
                    triggers: vec![Trigger {
                        id: 5,
                        ..Trigger::default()
                    }],
                    ..CharacterLevel::default()
                },
                CharacterLevel {
                    level_number: 1,
                    ..CharacterLevel::default()
                },
            ],
            ..Character::default()
        };

        assert_eq!(character.max_level(), 1);
        assert!(character.level(2).is_none());
        let (level, trigger) = character.trigger(5).unwrap();
        assert_eq!(level.level_number, 0);
        assert_eq!(trigger.id, 5);
    }

    #[test]
    fn test_story_area_lookup() {
        let story = Story {
            locations: vec![Location {
                id: 1,
                name: "Manor".into(),
                areas: vec![Area {
                    id: 7,
                    name: "Library".into(),
                    ..Area::default()
                }],
            }],
            ..Story::default()
        };

        let (location, area) = story.area(7).unwrap();
        assert_eq!(location.id, 1);
        assert_eq!(area.name, "Library");
        assert!(story.area(8).is_none());
    }

    #[test]
    fn test_object_default_max_level() {
        let object: GameObject = serde_json::from_str(r#"{"id": 3, "name": "Letter"}"#).unwrap();
        assert_eq!(object.max_level, 1);
    }
}
