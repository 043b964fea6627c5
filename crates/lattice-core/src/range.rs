//! Sheet-qualified ranges

use crate::adjust::{adjust_zone, StructuralChange};
use crate::error::{Error, Result};
use crate::zone::Zone;
use std::fmt;

/// Stable identifier of a sheet
///
/// Ids never change when a sheet is renamed or moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct SheetId(String);

impl SheetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SheetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SheetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A zone on a specific sheet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Range {
    pub zone: Zone,
    pub sheet_id: SheetId,
    /// Whether the sheet was written out explicitly (`Sheet2!A1`)
    pub explicit_sheet: bool,
    /// Set when the range names a sheet that does not exist (anymore)
    pub invalid_sheet_name: Option<String>,
}

impl Range {
    /// A range on `sheet_id` without an explicit sheet prefix
    pub fn new(sheet_id: SheetId, zone: Zone) -> Self {
        Self {
            zone,
            sheet_id,
            explicit_sheet: false,
            invalid_sheet_name: None,
        }
    }

    /// Parse `A1:B2`, `Sheet2!A1:B2` or `'My sheet'!A1`
    ///
    /// `resolve` maps a sheet name to its id; unknown names produce a range
    /// flagged with `invalid_sheet_name` on `default_sheet`.
    pub fn parse<F>(xc: &str, default_sheet: &SheetId, resolve: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<SheetId>,
    {
        let xc = xc.trim();
        match split_sheet_prefix(xc)? {
            (None, zone_part) => Ok(Self::new(default_sheet.clone(), Zone::parse(zone_part)?)),
            (Some(name), zone_part) => {
                let zone = Zone::parse(zone_part)?;
                Ok(match resolve(&name) {
                    Some(sheet_id) => Self {
                        zone,
                        sheet_id,
                        explicit_sheet: true,
                        invalid_sheet_name: None,
                    },
                    None => Self {
                        zone,
                        sheet_id: default_sheet.clone(),
                        explicit_sheet: true,
                        invalid_sheet_name: Some(name),
                    },
                })
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_sheet_name.is_none()
    }

    /// Format relative to `current_sheet`
    ///
    /// The sheet prefix is written when it was explicit or when the range lives on
    /// another sheet. A range whose sheet is gone keeps the stale name so that it
    /// parses back into the same invalid range.
    pub fn to_xc<F>(&self, current_sheet: &SheetId, sheet_name: F) -> String
    where
        F: Fn(&SheetId) -> Option<String>,
    {
        let zone = self.zone.to_a1_string();
        if let Some(stale) = &self.invalid_sheet_name {
            return format!("{}!{}", quote_sheet_name(stale), zone);
        }
        if !self.explicit_sheet && &self.sheet_id == current_sheet {
            return zone;
        }
        match sheet_name(&self.sheet_id) {
            Some(name) => format!("{}!{}", quote_sheet_name(&name), zone),
            None => zone,
        }
    }

    /// Mark the range as pointing to a deleted sheet
    pub fn invalidated(&self, sheet_name: &str) -> Range {
        Range {
            explicit_sheet: true,
            invalid_sheet_name: Some(sheet_name.to_string()),
            ..self.clone()
        }
    }

    /// Map the range through a structural change of `sheet_id`
    ///
    /// Ranges on other sheets are returned untouched; `None` means the range collapsed.
    pub fn adjusted(&self, sheet_id: &SheetId, change: &StructuralChange) -> Option<Range> {
        if &self.sheet_id != sheet_id || !self.is_valid() {
            return Some(self.clone());
        }
        adjust_zone(&self.zone, change)
            .apply_to(self.zone)
            .map(|zone| Range { zone, ..self.clone() })
    }
}

/// Split `Sheet!A1` into its (unquoted) sheet name and zone text
pub fn split_sheet_prefix(xc: &str) -> Result<(Option<String>, &str)> {
    let Some(bang) = xc.rfind('!') else {
        return Ok((None, xc));
    };
    let (sheet, zone) = (&xc[..bang], &xc[bang + 1..]);
    if sheet.is_empty() {
        return Err(Error::InvalidRange(xc.to_string()));
    }
    if let Some(quoted) = sheet.strip_prefix('\'') {
        let inner = quoted
            .strip_suffix('\'')
            .ok_or_else(|| Error::InvalidRange(xc.to_string()))?;
        return Ok((Some(inner.replace("''", "'")), zone));
    }
    Ok((Some(sheet.to_string()), zone))
}

/// Quote a sheet name for use in a reference when it needs it
pub fn quote_sheet_name(name: &str) -> String {
    let plain = !name.is_empty()
        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}
