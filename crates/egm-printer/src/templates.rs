//! Region and template definitions and their device-side cache.
//!
//! A region is a rectangle on the ticket with a font; a template is an
//! ordered list of regions. Both are defined to the printer once and
//! referenced by id afterwards, so a print command never retransmits
//! layout data. The cache mirrors what the device has been told; a print
//! referencing anything missing from it is refused before any bytes move.
//!
//! Definitions travel as ASCII payloads:
//!
//! ```text
//! R|<id>|<x>|<y>|<width>|<height>|<font>
//! T|<id>|<region>,<region>,...
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a cached print region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u16);

/// Identifier of a cached template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub u16);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One print-region layout definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionDef {
    pub id: RegionId,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub font: u8,
}

impl RegionDef {
    /// Wire encoding of the definition.
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "R|{}|{}|{}|{}|{}|{}",
            self.id, self.x, self.y, self.width, self.height, self.font
        )
        .into_bytes()
    }
}

/// One template definition: an ordered list of region references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDef {
    pub id: TemplateId,
    pub regions: Vec<RegionId>,
}

impl TemplateDef {
    pub fn encode(&self) -> Vec<u8> {
        let regions = self
            .regions
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!("T|{}|{}", self.id, regions).into_bytes()
    }
}

/// Mirror of the definitions the device has acknowledged.
#[derive(Debug, Default, Clone)]
pub struct TemplateCache {
    regions: HashMap<RegionId, RegionDef>,
    templates: HashMap<TemplateId, TemplateDef>,
}

impl TemplateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_region(&mut self, def: RegionDef) {
        self.regions.insert(def.id, def);
    }

    pub fn insert_template(&mut self, def: TemplateDef) {
        self.templates.insert(def.id, def);
    }

    pub fn region(&self, id: RegionId) -> Option<&RegionDef> {
        self.regions.get(&id)
    }

    pub fn template(&self, id: TemplateId) -> Option<&TemplateDef> {
        self.templates.get(&id)
    }

    /// Whether every region a template references is cached.
    pub fn template_is_complete(&self, id: TemplateId) -> bool {
        self.templates
            .get(&id)
            .is_some_and(|t| t.regions.iter().all(|r| self.regions.contains_key(r)))
    }

    pub fn has_templates(&self) -> bool {
        !self.templates.is_empty()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn template_count(&self) -> usize {
        self.templates.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: u16) -> RegionDef {
        RegionDef {
            id: RegionId(id),
            x: 10,
            y: 20,
            width: 200,
            height: 40,
            font: 2,
        }
    }

    #[test]
    fn region_encoding() {
        assert_eq!(region(3).encode(), b"R|3|10|20|200|40|2");
    }

    #[test]
    fn template_encoding() {
        let def = TemplateDef {
            id: TemplateId(12),
            regions: vec![RegionId(3), RegionId(4)],
        };
        assert_eq!(def.encode(), b"T|12|3,4");
    }

    #[test]
    fn cache_lookups() {
        let mut cache = TemplateCache::new();
        assert!(!cache.has_templates());

        cache.insert_region(region(3));
        cache.insert_template(TemplateDef {
            id: TemplateId(12),
            regions: vec![RegionId(3)],
        });

        assert!(cache.has_templates());
        assert!(cache.template(TemplateId(12)).is_some());
        assert!(cache.template(TemplateId(13)).is_none());
        assert!(cache.template_is_complete(TemplateId(12)));
    }

    #[test]
    fn incomplete_template_is_detected() {
        let mut cache = TemplateCache::new();
        cache.insert_template(TemplateDef {
            id: TemplateId(12),
            regions: vec![RegionId(3), RegionId(9)],
        });
        cache.insert_region(region(3));

        assert!(!cache.template_is_complete(TemplateId(12)));
        assert!(!cache.template_is_complete(TemplateId(99)));
    }
}
