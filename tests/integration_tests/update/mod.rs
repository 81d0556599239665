#[path = "mod_update.rs"]
mod update_tests;
