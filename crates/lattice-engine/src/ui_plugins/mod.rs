//! UI plugins: transient state that is never persisted nor undone

pub mod clipboard;
pub mod selection;

use crate::plugin::UiPlugin;

/// Every UI plugin, in the order they see commands
pub fn ui_plugins() -> Vec<Box<dyn UiPlugin>> {
    vec![
        Box::new(selection::SelectionPlugin::default()),
        Box::new(clipboard::ClipboardPlugin::default()),
    ]
}
