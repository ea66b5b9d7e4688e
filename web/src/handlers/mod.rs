//! HTTP handlers.

pub mod bookings;
pub mod courts;
pub mod health;
pub mod matches;
pub mod schedule;
pub mod waitlist;
pub mod websocket;
