//! Versioned document format
//!
//! Everything a core plugin owns is exported into one [`SheetData`] section per
//! sheet. Ranges are written in A1 notation (`"A1"`, `"A1:B2"`, `"A:A"`,
//! `"Sheet2!B3"`), cell-keyed maps use the cell's A1 name as key.

use crate::error::{Error, Result};
use crate::plugins::charts::ChartDefinitionData;
use crate::plugins::conditional_format::ConditionalFormat;
use crate::plugins::data_validation::DataValidationRule;
use crate::plugins::figures::Figure;
use crate::plugins::tables::TableConfig;
use lattice_core::{Border, SheetId, Style};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version written by this engine
pub const CURRENT_VERSION: u32 = 1;

/// A whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkbookData {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_sheet: Option<SheetId>,
    pub sheets: Vec<SheetData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_colors: Vec<String>,
}

impl Default for WorkbookData {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            active_sheet: None,
            sheets: Vec::new(),
            custom_colors: Vec::new(),
        }
    }
}

impl WorkbookData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn sheet(&self, sheet_id: &SheetId) -> Option<&SheetData> {
        self.sheets.iter().find(|sheet| &sheet.id == sheet_id)
    }

    pub fn sheet_name(&self, sheet_id: &SheetId) -> Option<String> {
        self.sheet(sheet_id).map(|sheet| sheet.name.clone())
    }

    /// Resolve a sheet name (case-insensitive)
    pub fn sheet_id_by_name(&self, name: &str) -> Option<SheetId> {
        self.sheets
            .iter()
            .find(|sheet| sheet.name.eq_ignore_ascii_case(name))
            .map(|sheet| sheet.id.clone())
    }

    /// Structural checks done before any plugin imports the document
    pub fn validate(&self) -> Result<()> {
        if self.version != CURRENT_VERSION {
            return Err(Error::UnsupportedVersion {
                found: self.version,
                expected: CURRENT_VERSION,
            });
        }
        if self.sheets.is_empty() {
            return Err(Error::invalid_document("a document needs at least one sheet"));
        }
        for (i, sheet) in self.sheets.iter().enumerate() {
            if self.sheets[..i].iter().any(|other| other.id == sheet.id) {
                return Err(Error::invalid_document(format!(
                    "duplicated sheet id '{}'",
                    sheet.id
                )));
            }
            if self.sheets[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&sheet.name))
            {
                return Err(Error::invalid_document(format!(
                    "duplicated sheet name '{}'",
                    sheet.name
                )));
            }
            if sheet.rows == 0 || sheet.cols == 0 {
                return Err(Error::invalid_document(format!(
                    "sheet '{}' has no cells",
                    sheet.name
                )));
            }
        }
        if let Some(active) = &self.active_sheet {
            if self.sheet(active).is_none() {
                return Err(Error::invalid_document(format!(
                    "active sheet '{}' does not exist",
                    active
                )));
            }
        }
        Ok(())
    }
}

/// One sheet and everything anchored on it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SheetData {
    pub id: SheetId,
    pub name: String,
    pub rows: u32,
    pub cols: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub cells: BTreeMap<String, CellData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merges: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub borders: BTreeMap<String, Border>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_formats: Vec<ConditionalFormatData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_validation_rules: Vec<DataValidationData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protection_rules: Vec<ProtectionData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tables: Vec<TableData>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub figures: Vec<FigureData>,
}

impl SheetData {
    pub fn new(id: SheetId, name: impl Into<String>, rows: u32, cols: u32) -> Self {
        Self {
            id,
            name: name.into(),
            rows,
            cols,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellData {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalFormatData {
    #[serde(flatten)]
    pub cf: ConditionalFormat,
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationData {
    #[serde(flatten)]
    pub rule: DataValidationRule,
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionData {
    pub id: String,
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub id: String,
    pub range: String,
    #[serde(default)]
    pub config: TableConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureData {
    #[serde(flatten)]
    pub figure: Figure,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartDefinitionData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> WorkbookData {
        WorkbookData {
            sheets: vec![
                SheetData::new(SheetId::from("s1"), "Sheet1", 10, 5),
                SheetData::new(SheetId::from("s2"), "Data", 10, 5),
            ],
            ..WorkbookData::default()
        }
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(document().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_version() {
        let mut data = document();
        data.version = 7;
        assert!(matches!(
            data.validate(),
            Err(Error::UnsupportedVersion { found: 7, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicated_names() {
        let mut data = document();
        data.sheets[1].name = "SHEET1".into();
        assert!(matches!(data.validate(), Err(Error::InvalidDocument(_))));
    }

    #[test]
    fn test_sheet_lookup_is_case_insensitive() {
        let data = document();
        assert_eq!(data.sheet_id_by_name("data"), Some(SheetId::from("s2")));
        assert_eq!(data.sheet_name(&SheetId::from("s1")).as_deref(), Some("Sheet1"));
    }

    #[test]
    fn test_json_skips_empty_sections() {
        let json = document().to_json().unwrap();
        assert!(!json.contains("merges"));
        let back = WorkbookData::from_json(&json).unwrap();
        assert_eq!(back, document());
    }
}
