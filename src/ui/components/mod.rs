pub mod lesson_menu;
pub mod typing_area;
pub mod word_table;
