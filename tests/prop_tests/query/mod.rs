#[path = "prop_compare.rs"]
mod compare_props;
#[path = "prop_update.rs"]
mod update_props;
