/// Provider API clients for the polling service.
pub mod dpobs;
