//! Loading and validating story content.

use std::collections::BTreeSet;
use std::path::Path;

use super::story::{CharacterId, DiscoveryCondition, EvidenceRequirement, Story, TriggerId};
use crate::error::{CasebookError, Result};
use crate::util::{read_to_string_with_limit, MAX_STORY_SIZE};

impl Story {
    /// Parse and validate a story from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let story: Story = serde_json::from_str(json)
            .map_err(|e| CasebookError::content(format!("invalid story JSON: {}", e)))?;
        story.validate()?;
        Ok(story)
    }

    /// Read, parse and validate a story file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = read_to_string_with_limit(path, MAX_STORY_SIZE)?;
        let story = Self::from_json(&json)?;
        tracing::debug!(
            story = %story.id,
            characters = story.characters.len(),
            clues = story.clues.len(),
            "loaded story from {}",
            path.display()
        );
        Ok(story)
    }

    /// Check the structural rules the engine relies on.
    ///
    /// Ids are unique per kind, level numbers are unique per character,
    /// trigger ids are unique per character, thresholds ascend strictly, and
    /// every id referenced by a clue condition, reward, or gate exists.
    pub fn validate(&self) -> Result<()> {
        unique("character", self.characters.iter().map(|c| c.id))?;
        unique("clue", self.clues.iter().map(|c| c.id))?;
        unique("object", self.objects.iter().map(|o| o.id))?;
        unique("location", self.locations.iter().map(|l| l.id))?;
        unique(
            "area",
            self.locations.iter().flat_map(|l| l.areas.iter().map(|a| a.id)),
        )?;
        unique("category", self.categories.iter().map(|c| c.id.clone()))?;
        unique("access point", self.access_points.iter().map(|p| p.code.clone()))?;

        for category in &self.categories {
            if category.level_thresholds.windows(2).any(|w| w[0] >= w[1]) {
                return Err(CasebookError::content(format!(
                    "category '{}' thresholds must be strictly ascending",
                    category.id
                )));
            }
        }

        for character in &self.characters {
            let scope = format!("character {} level", character.id);
            unique(&scope, character.levels.iter().map(|l| l.level_number))?;
            // Advancement is +1 at a time, so every number below the max must exist.
            if character
                .levels
                .iter()
                .any(|l| l.level_number as usize >= character.levels.len())
            {
                return Err(CasebookError::content(format!(
                    "character {} levels must be contiguous from 0",
                    character.id
                )));
            }
            let scope = format!("character {} trigger", character.id);
            unique(
                &scope,
                character
                    .levels
                    .iter()
                    .flat_map(|l| l.triggers.iter().map(|t| t.id)),
            )?;

            for trigger in character.levels.iter().flat_map(|l| l.triggers.iter()) {
                if trigger.terms().all(|t| t.trim().is_empty()) {
                    return Err(CasebookError::content(format!(
                        "character {} trigger {} has no keywords or phrases",
                        character.id, trigger.id
                    )));
                }
                self.check_gate(trigger.specialization_required.keys())?;
                for requirement in &trigger.requirements {
                    self.check_requirement(character.id, trigger.id, requirement)?;
                }
                if let Some(reward) = &trigger.reward {
                    self.check_category(&reward.category)?;
                }
            }
        }

        for clue in &self.clues {
            for condition in &clue.discovery_conditions {
                match condition {
                    DiscoveryCondition::Character { character_id, .. } => {
                        if self.character(*character_id).is_none() {
                            return Err(CasebookError::content(format!(
                                "clue {} references unknown character {}",
                                clue.id, character_id
                            )));
                        }
                    }
                    DiscoveryCondition::ObjectLevel { object_id, .. } => {
                        if self.object(*object_id).is_none() {
                            return Err(CasebookError::content(format!(
                                "clue {} references unknown object {}",
                                clue.id, object_id
                            )));
                        }
                    }
                    DiscoveryCondition::Detail { .. } => {}
                }
            }
            if let Some(reward) = &clue.reward {
                self.check_category(&reward.category)?;
            }
        }

        for object in &self.objects {
            if let Some(reward) = &object.reward {
                self.check_category(&reward.category)?;
            }
        }

        for area in self.locations.iter().flat_map(|l| l.areas.iter()) {
            self.check_gate(area.specialization_required.keys())?;
            if let Some(reward) = &area.reward {
                self.check_category(&reward.category)?;
            }
        }

        for point in &self.access_points {
            self.check_gate(point.specialization_required.keys())?;
            if let Some(object) = point
                .required_objects
                .iter()
                .find(|id| self.object(**id).is_none())
            {
                return Err(CasebookError::content(format!(
                    "access point '{}' references unknown object {}",
                    point.code, object
                )));
            }
            for location in point.required_location.iter().chain(&point.grants_location) {
                if self.location(*location).is_none() {
                    return Err(CasebookError::content(format!(
                        "access point '{}' references unknown location {}",
                        point.code, location
                    )));
                }
            }
        }

        if let Some(start) = self.starting_location {
            if self.location(start).is_none() {
                return Err(CasebookError::content(format!(
                    "starting location {} does not exist",
                    start
                )));
            }
        }

        Ok(())
    }

    fn check_category(&self, id: &str) -> Result<()> {
        match self.category(id) {
            Some(_) => Ok(()),
            None => Err(CasebookError::content(format!(
                "unknown specialization category '{}'",
                id
            ))),
        }
    }

    fn check_requirement(
        &self,
        character: CharacterId,
        trigger: TriggerId,
        requirement: &EvidenceRequirement,
    ) -> Result<()> {
        let unknown = |what: &str, id: u32| {
            Err(CasebookError::content(format!(
                "character {} trigger {} requires unknown {} {}",
                character, trigger, what, id
            )))
        };
        match requirement {
            EvidenceRequirement::Object { target_ids, .. }
            | EvidenceRequirement::Knowledge { target_ids, .. } => {
                if let Some(id) = target_ids.iter().find(|id| self.object(**id).is_none()) {
                    return unknown("object", *id);
                }
            }
            EvidenceRequirement::Observation { area_id, .. } => {
                if let Some(id) = area_id.filter(|id| self.area(*id).is_none()) {
                    return unknown("area", id);
                }
            }
        }
        Ok(())
    }

    fn check_gate<'a>(&self, categories: impl Iterator<Item = &'a String>) -> Result<()> {
        for id in categories {
            self.check_category(id)?;
        }
        Ok(())
    }
}

fn unique<T: Ord + std::fmt::Display>(kind: &str, ids: impl Iterator<Item = T>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if seen.contains(&id) {
            return Err(CasebookError::content(format!("duplicate {} id {}", kind, id)));
        }
        seen.insert(id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const STORY: &str = r#"{
        "id": "manor",
        "title": "Death at the Manor",
        "starting_location": 1,
        "categories": [{"id": "analysis", "level_thresholds": [15, 40]}],
        "objects": [{"id": 10, "name": "Bloodied glove"}],
        "locations": [{"id": 1, "name": "Manor", "areas": [{"id": 2, "name": "Hall", "detail_ids": [3]}]}],
        "characters": [{
            "id": 1,
            "name": "Butler",
            "levels": [
                {"level_number": 0, "triggers": [{
                    "id": 1,
                    "keywords": ["glove"],
                    "requirements": [{"kind": "object", "target_id": 10, "hint_on_failure": "Bring proof."}],
                    "reward": {"category": "analysis", "points": 5}
                }]},
                {"level_number": 1}
            ]
        }],
        "clues": [{"id": 100, "name": "Stained cuff", "discovery_conditions": [{"kind": "character", "character_id": 1}]}]
    }"#;

    #[test]
    fn test_from_json_valid() {
        let story = Story::from_json(STORY).unwrap();
        assert_eq!(story.id, "manor");
        assert_eq!(story.characters[0].max_level(), 1);
        assert_eq!(story.category("analysis").unwrap().max_level(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("story.json");
        fs::write(&path, STORY).unwrap();

        let story = Story::load(&path).unwrap();
        assert_eq!(story.title, "Death at the Manor");
    }

    #[test]
    fn test_invalid_json_is_content_error() {
        let err = Story::from_json("{").unwrap_err();
        assert!(matches!(err, CasebookError::Content { .. }));
    }

    #[test]
    fn test_rejects_duplicate_level_numbers() {
        let json = STORY.replace(r#"{"level_number": 1}"#, r#"{"level_number": 0}"#);
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("level"));
    }

    #[test]
    fn test_rejects_level_gap() {
        let json = STORY.replace(r#"{"level_number": 1}"#, r#"{"level_number": 2}"#);
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("contiguous from 0"));
    }

    #[test]
    fn test_rejects_unknown_required_object() {
        let json = STORY.replace(r#""target_id": 10"#, r#""target_id": 999"#);
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("unknown object 999"));
    }

    #[test]
    fn test_rejects_unknown_observation_area() {
        let json = STORY.replace(
            r#"{"kind": "object", "target_id": 10, "hint_on_failure": "Bring proof."}"#,
            r#"{"kind": "observation", "detail_id": 3, "area_id": 77}"#,
        );
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("unknown area 77"));

        let json = json.replace(r#""area_id": 77"#, r#""area_id": 2"#);
        assert!(Story::from_json(&json).is_ok());
    }

    #[test]
    fn test_rejects_non_ascending_thresholds() {
        let json = STORY.replace("[15, 40]", "[40, 15]");
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("ascending"));
    }

    #[test]
    fn test_rejects_unknown_clue_character() {
        let json = STORY.replace(r#""character_id": 1}"#, r#""character_id": 9}"#);
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("unknown character 9"));
    }

    #[test]
    fn test_rejects_unknown_reward_category() {
        let json = STORY.replace(r#""category": "analysis""#, r#""category": "forensics""#);
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("forensics"));
    }

    #[test]
    fn test_rejects_trigger_without_terms() {
        let json = STORY.replace(r#""keywords": ["glove"],"#, "");
        let err = Story::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("no keywords"));
    }
}
