//! Wind-sensor UDP receiver core.
//!
//! Ingests datagrams from wind-sensor hardware, decodes the supported wire
//! formats (binary ModBus-style report frames, the vendor "ZQWL" frame,
//! and text heartbeat/registration packets in mixed character encodings),
//! converts raw register values into physical measurements, and maintains
//! a live registry of devices with online/offline status.
//!
//! The host application is an external collaborator: it starts a
//! [`UdpServer`], consumes [`Event`]s from the channel it handed over, and
//! queries device status through the [`Tracker`] handle.

pub mod config;
pub mod event;
pub mod frame;
pub mod server;
pub mod tracker;
pub mod types;
pub mod units;

pub use crate::{
    config::Config,
    event::Event,
    frame::{
        DecodeError,
        Frame,
    },
    server::UdpServer,
    tracker::Tracker,
};
