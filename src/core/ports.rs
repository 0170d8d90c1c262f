//! Outbound boundary the Trader depends on, mirroring the teacher's own
//! `port::outbound` trait seams: the event-dispatch loop is written against
//! [`OrderSink`], not against the private connector directly, so it can be
//! driven end to end in tests with a recording fake and no live socket.

use crate::core::domain::OrderSide;

pub trait OrderSink: Send + Sync {
    fn place_order(&self, side: OrderSide, quantity: f64);
}
