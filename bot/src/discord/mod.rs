pub mod backfill;
pub mod bot;
pub mod commands;
pub mod constants;
pub mod delivery;
pub mod fetch;
