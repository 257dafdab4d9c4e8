use std::collections::BTreeMap;

use serde::Deserialize;

use super::DataResponse;

/// Field, portal and value list definitions for a layout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetadata {
    /// The fields on the layout.
    pub field_meta_data: Vec<FieldMetadata>,
    /// The fields of each portal on the layout.
    #[serde(default)]
    pub portal_meta_data: BTreeMap<String, Vec<FieldMetadata>>,
    /// The value lists used on the layout.
    #[serde(default)]
    pub value_lists: Option<Vec<ValueList>>,
}

impl DataResponse for LayoutMetadata {}

impl LayoutMetadata {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.field_meta_data.iter().find(|f| f.name == name)
    }
}

/// The definition of a single field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    /// The field name.
    pub name: String,
    /// Whether the field is stored, calculated or a summary.
    #[serde(rename = "type")]
    pub kind: FieldType,
    /// How the field is shown on the layout.
    #[serde(default)]
    pub display_type: Option<DisplayType>,
    /// The data type of the field.
    pub result: CalcResult,
    /// Whether the field is global.
    #[serde(default)]
    pub global: bool,
    /// Whether the field is filled in automatically.
    #[serde(default)]
    pub auto_enter: bool,
    /// Whether dates require four-digit years.
    #[serde(default)]
    pub four_digit_year: bool,
    /// The number of repetitions the field is defined with.
    #[serde(default)]
    pub max_repeat: u32,
    /// The maximum number of characters, if limited.
    #[serde(default)]
    pub max_characters: Option<u32>,
    /// Whether the field must not be empty.
    #[serde(default)]
    pub not_empty: bool,
    /// Whether the field must be numeric.
    #[serde(default)]
    pub numeric: bool,
    /// The number of repetitions shown on the layout.
    #[serde(default)]
    pub repetitions: Option<u32>,
    /// Whether the field must contain a time of day.
    #[serde(default)]
    pub time_of_day: bool,
    /// The value list attached to the field.
    #[serde(default)]
    pub value_list: Option<String>,
}

/// Whether a field is stored, calculated or a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    /// A stored field.
    Normal,
    /// A calculation.
    Calculation,
    /// A summary.
    Summary,
    /// A type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// The control a field is shown with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayType {
    #[allow(missing_docs)]
    EditText,
    #[allow(missing_docs)]
    PopupList,
    #[allow(missing_docs)]
    PopupMenu,
    #[allow(missing_docs)]
    CheckBox,
    #[allow(missing_docs)]
    RadioButtons,
    #[allow(missing_docs)]
    SelectionList,
    #[allow(missing_docs)]
    Calendar,
    #[allow(missing_docs)]
    SecureText,
    /// A control this client does not know about.
    #[serde(other)]
    Unknown,
}

/// The data type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CalcResult {
    #[allow(missing_docs)]
    Text,
    #[allow(missing_docs)]
    Number,
    #[allow(missing_docs)]
    Date,
    #[allow(missing_docs)]
    Time,
    #[allow(missing_docs)]
    TimeStamp,
    #[allow(missing_docs)]
    Container,
    /// A type this client does not know about.
    #[serde(other)]
    Unknown,
}

/// A value list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ValueList {
    /// The value list name.
    pub name: String,
    /// Where the values come from, e.g. `customList` or `byField`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The values.
    pub values: Vec<ValueListItem>,
}

/// One entry in a value list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueListItem {
    /// The stored value.
    pub value: String,
    /// The value shown to the user.
    pub display_value: String,
}
