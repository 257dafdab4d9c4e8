//! Server, database, layout and script listings.

use serde::Deserialize;

use super::DataResponse;
use crate::Layout;

/// Information about the server software.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    /// The build date of the server.
    pub build_date: String,
    /// The product name.
    pub name: String,
    /// The server version.
    pub version: String,
    /// The date format used by the server.
    pub date_format: String,
    /// The time format used by the server.
    pub time_format: String,
    /// The timestamp format used by the server.
    pub time_stamp_format: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductInfoContainer {
    pub(crate) product_info: ProductInfo,
}

impl DataResponse for ProductInfoContainer {}

/// The databases hosted on a server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseList {
    /// One entry per database.
    pub databases: Vec<DatabaseName>,
}

/// A database name, as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseName {
    /// The name.
    pub name: String,
}

impl DatabaseList {
    /// The database names, in the order the server listed them.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.databases.iter().map(|d| d.name.as_str())
    }
}

impl DataResponse for DatabaseList {}

/// A script, or a folder of scripts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ScriptItem {
    /// A folder, which may contain further folders.
    Folder {
        /// The folder name.
        name: String,
        /// The folder contents.
        #[serde(rename = "folderScriptNames")]
        scripts: Vec<ScriptItem>,
    },
    /// A script.
    Script {
        /// The script name.
        name: String,
    },
}

impl ScriptItem {
    /// The name of the script or folder.
    pub fn name(&self) -> &str {
        match self {
            ScriptItem::Folder { name, .. } | ScriptItem::Script { name } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScriptList {
    pub(crate) scripts: Vec<ScriptItem>,
}

impl DataResponse for ScriptList {}

/// A layout, or a folder of layouts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LayoutListItem {
    /// A folder, which may contain further folders.
    Folder {
        /// The folder name.
        name: String,
        /// The folder contents.
        #[serde(rename = "folderLayoutNames")]
        layouts: Vec<LayoutListItem>,
    },
    /// A layout.
    Layout(Layout),
}

impl LayoutListItem {
    /// The name of the layout or folder.
    pub fn name(&self) -> &str {
        match self {
            LayoutListItem::Folder { name, .. } => name,
            LayoutListItem::Layout(layout) => layout.name(),
        }
    }

    /// Visit every layout in this item, depth first.
    pub fn for_each_layout_mut(&mut self, f: &mut impl FnMut(&mut Layout)) {
        match self {
            LayoutListItem::Folder { layouts, .. } => {
                for item in layouts {
                    item.for_each_layout_mut(f);
                }
            }
            LayoutListItem::Layout(layout) => f(layout),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LayoutList {
    pub(crate) layouts: Vec<LayoutListItem>,
}

impl DataResponse for LayoutList {}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn nested_layout_folders() -> anyhow::Result<()> {
        let list: LayoutList = serde_json::from_value(json!({
            "layouts": [
                {"name": "Home"},
                {
                    "name": "Sales",
                    "isFolder": true,
                    "folderLayoutNames": [{
                        "name": "Reports",
                        "isFolder": true,
                        "folderLayoutNames": [{"name": "Quarterly"}],
                    }],
                },
            ]
        }))?;

        assert_eq!(list.layouts.len(), 2);
        assert_eq!(list.layouts[0].name(), "Home");
        assert!(matches!(&list.layouts[0], LayoutListItem::Layout(_)));

        let LayoutListItem::Folder { name, layouts } = &list.layouts[1] else {
            panic!("expected a folder");
        };
        assert_eq!(name, "Sales");

        let LayoutListItem::Folder { name, layouts } = &layouts[0] else {
            panic!("expected a nested folder");
        };
        assert_eq!(name, "Reports");

        let LayoutListItem::Layout(leaf) = &layouts[0] else {
            panic!("expected a layout");
        };
        assert_eq!(leaf.name(), "Quarterly");

        Ok(())
    }

    #[test]
    fn nested_script_folders() -> anyhow::Result<()> {
        let list: ScriptList = serde_json::from_value(json!({
            "scripts": [
                {"name": "Nightly", "isFolder": true, "folderScriptNames": [
                    {"name": "Cleanup", "isFolder": false},
                    {"name": "Empty", "isFolder": true, "folderScriptNames": []},
                ]},
                {"name": "Log In", "isFolder": false},
            ]
        }))?;

        assert_eq!(
            list.scripts,
            vec![
                ScriptItem::Folder {
                    name: "Nightly".into(),
                    scripts: vec![
                        ScriptItem::Script {
                            name: "Cleanup".into()
                        },
                        ScriptItem::Folder {
                            name: "Empty".into(),
                            scripts: vec![],
                        },
                    ],
                },
                ScriptItem::Script {
                    name: "Log In".into()
                },
            ]
        );

        Ok(())
    }

    #[test]
    fn product_info() -> anyhow::Result<()> {
        let info: ProductInfoContainer = serde_json::from_value(json!({
            "productInfo": {
                "buildDate": "03/27/2024",
                "name": "FileMaker Data API Engine",
                "version": "20.3.2.201",
                "dateFormat": "MM/dd/yyyy",
                "timeFormat": "HH:mm:ss",
                "timeStampFormat": "MM/dd/yyyy HH:mm:ss",
            }
        }))?;

        assert_eq!(info.product_info.version, "20.3.2.201");
        assert_eq!(info.product_info.time_stamp_format, "MM/dd/yyyy HH:mm:ss");
        Ok(())
    }

    #[test]
    fn database_names() -> anyhow::Result<()> {
        let list: DatabaseList = serde_json::from_value(json!({
            "databases": [{"name": "Contacts"}, {"name": "Inventory"}]
        }))?;

        assert_eq!(list.names().collect::<Vec<_>>(), vec!["Contacts", "Inventory"]);
        Ok(())
    }
}
