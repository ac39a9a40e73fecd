//! Story content consumed by the engine.
//!
//! Content is authored elsewhere and read-only here. The engine only needs
//! it to be structurally sound, which [`Story::validate`] checks on load.

mod loader;
pub mod story;

pub use story::{
    level_for, AccessPoint, Area, AreaId, Character, CharacterId, CharacterLevel, Clue, ClueId,
    DetailId, DiscoveryCondition, EvidenceRequirement, GameObject, Location, LocationId, ObjectId,
    Reward, SpecializationCategory, SpecializationGate, Story, Trigger, TriggerId,
};
