use serde::{Deserialize, Serialize};

pub const UI_LAYOUT_VERSION: u32 = 0;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiLayout {
    #[serde(default)]
    pub lesson_menu_open: bool,
}
