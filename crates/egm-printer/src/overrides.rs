//! Jurisdiction override rules for printer templates and regions.
//!
//! Regulators and site operators remap platform layouts per printer
//! protocol and firmware line: a rule keyed on `(protocol, firmware)`
//! replaces platform template ids with the printer's own, substitutes
//! region definitions, and rewrites fixed ticket text. The rule file is
//! external reference data: loaded once at configuration time, consulted
//! read-only by the engine, never mutated.
//!
//! ```json
//! {
//!   "rules": [
//!     {
//!       "protocol": "gds",
//!       "firmware": "05*",
//!       "templates": [{ "platform": 12, "device": 7 }],
//!       "regions": [{ "id": 3, "x": 0, "y": 12, "width": 320, "height": 28, "font": 1 }],
//!       "substitutions": [{ "from": "VOUCHER", "to": "COUPON" }]
//!     }
//!   ]
//! }
//! ```
//!
//! A `firmware` pattern ending in `*` matches any version with that
//! prefix; otherwise the match is exact.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use egm_core::{Error, Result};

use crate::templates::{RegionDef, RegionId, TemplateId};

/// One platform-to-device template id replacement.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateSwap {
    pub platform: TemplateId,
    pub device: TemplateId,
}

/// One fixed-text rewrite applied to ticket column text.
#[derive(Debug, Clone, Deserialize)]
pub struct TextSubstitution {
    pub from: String,
    pub to: String,
}

/// Override rule for one (protocol, firmware line) pair.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRule {
    pub protocol: String,
    pub firmware: String,
    #[serde(default)]
    pub templates: Vec<TemplateSwap>,
    #[serde(default)]
    pub regions: Vec<RegionDef>,
    #[serde(default)]
    pub substitutions: Vec<TextSubstitution>,
}

impl OverrideRule {
    fn matches(&self, protocol: &str, firmware: &str) -> bool {
        if self.protocol != protocol {
            return false;
        }
        match self.firmware.strip_suffix('*') {
            Some(prefix) => firmware.starts_with(prefix),
            None => self.firmware == firmware,
        }
    }

    /// Device template id for a platform template id (identity when
    /// unmapped).
    pub fn map_template(&self, id: TemplateId) -> TemplateId {
        self.templates
            .iter()
            .find(|swap| swap.platform == id)
            .map_or(id, |swap| swap.device)
    }

    /// Replacement definition for a region, if the rule carries one.
    pub fn region_override(&self, id: RegionId) -> Option<&RegionDef> {
        self.regions.iter().find(|def| def.id == id)
    }

    /// Apply every text substitution to one column entry.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for sub in &self.substitutions {
            out = out.replace(&sub.from, &sub.to);
        }
        out
    }
}

/// The full override rule set for a site.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverrideSet {
    #[serde(default)]
    pub rules: Vec<OverrideRule>,
}

impl OverrideSet {
    /// Rule set that maps nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the rule file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a rule set from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::config(format!("override rules malformed: {e}")))
    }

    /// First rule matching the given protocol and firmware version.
    pub fn resolve(&self, protocol: &str, firmware: &str) -> Option<&OverrideRule> {
        self.rules
            .iter()
            .find(|rule| rule.matches(protocol, firmware))
    }
}
