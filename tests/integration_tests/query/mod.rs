#[path = "mod_compare.rs"]
mod compare_tests;
#[path = "mod_filter.rs"]
mod filter_tests;
