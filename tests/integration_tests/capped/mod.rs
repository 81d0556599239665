#[path = "mod_capped.rs"]
mod capped_tests;
