pub mod coalesce;
pub mod singleflight;
pub mod terminal_id;
