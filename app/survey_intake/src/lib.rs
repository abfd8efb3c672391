pub mod action;
pub mod classifier;
pub mod clock;
pub mod code;
pub mod config;
pub mod event;
pub mod gate;
pub mod mail;
pub mod notifier;
pub mod report;
pub mod stats;
pub mod store;
