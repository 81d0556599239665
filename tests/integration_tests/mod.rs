// Mirrors src/: query, update application, capped cleanup, utils
mod capped;
mod query;
mod update;
mod utils;
