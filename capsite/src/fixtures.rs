//! Test capability shared by the unit tests.
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    Capability, Receiver, UnsupportedMessage, export_capability, register_capability,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Origin {
    Cached,
    Uncached,
    Fallback,
}

pub trait CounterOps: Send + Sync {
    fn count(&self, receiver: &dyn Receiver) -> Result<i64, UnsupportedMessage>;
    fn describe(&self, receiver: &dyn Receiver) -> String;
    fn origin(&self) -> Origin;
    /// `count` calls made through this implementation. Always 0 for shared
    /// implementations.
    fn calls(&self) -> u64;
}

pub struct Counter;

impl Capability for Counter {
    const NAME: &'static str = "Counter";
    type Ops = dyn CounterOps;

    fn fallback() -> Arc<dyn CounterOps> {
        Arc::new(NoCount)
    }
}

register_capability!(Counter);

/// Never registered.
pub struct Unregistered;

impl Capability for Unregistered {
    const NAME: &'static str = "Unregistered";
    type Ops = dyn CounterOps;

    fn fallback() -> Arc<dyn CounterOps> {
        Arc::new(NoCount)
    }
}

#[derive(Debug)]
pub struct IntBox(pub i64);

#[derive(Debug)]
pub struct StringBox(pub String);

#[derive(Debug)]
pub struct FloatBox(pub f64);

/// Exports nothing.
#[derive(Debug)]
pub struct BoolBox(pub bool);

fn unsupported(message: &'static str, receiver: &dyn Receiver) -> UnsupportedMessage {
    UnsupportedMessage::new(Counter::NAME, message, receiver.receiver_type())
}

struct NoCount;

impl CounterOps for NoCount {
    fn count(&self, receiver: &dyn Receiver) -> Result<i64, UnsupportedMessage> {
        Err(unsupported("count", receiver))
    }

    fn describe(&self, receiver: &dyn Receiver) -> String {
        format!("{receiver:?}")
    }

    fn origin(&self) -> Origin {
        Origin::Fallback
    }

    fn calls(&self) -> u64 {
        0
    }
}

/// Shared body of every export: how to count one receiver type.
struct Counting<F> {
    origin: Origin,
    calls: AtomicU64,
    count: F,
}

impl<F> Counting<F>
where
    F: Fn(&dyn Receiver) -> Option<i64> + Send + Sync + 'static,
{
    fn cached(count: F) -> Arc<dyn CounterOps> {
        Arc::new(Self {
            origin: Origin::Cached,
            calls: AtomicU64::new(0),
            count,
        })
    }

    fn uncached(count: F) -> Arc<dyn CounterOps> {
        Arc::new(Self {
            origin: Origin::Uncached,
            calls: AtomicU64::new(0),
            count,
        })
    }
}

impl<F> CounterOps for Counting<F>
where
    F: Fn(&dyn Receiver) -> Option<i64> + Send + Sync,
{
    fn count(&self, receiver: &dyn Receiver) -> Result<i64, UnsupportedMessage> {
        if self.origin == Origin::Cached {
            self.calls.fetch_add(1, Ordering::Relaxed);
        }
        (self.count)(receiver).ok_or_else(|| unsupported("count", receiver))
    }

    fn describe(&self, receiver: &dyn Receiver) -> String {
        match (self.count)(receiver) {
            Some(n) => format!("{} counting {n}", receiver.receiver_type()),
            None => format!("{receiver:?}"),
        }
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

fn count_int(receiver: &dyn Receiver) -> Option<i64> {
    receiver.downcast_ref::<IntBox>().map(|int| int.0)
}

fn count_string(receiver: &dyn Receiver) -> Option<i64> {
    receiver
        .downcast_ref::<StringBox>()
        .map(|text| text.0.chars().count() as i64)
}

fn count_float(receiver: &dyn Receiver) -> Option<i64> {
    receiver.downcast_ref::<FloatBox>().map(|float| float.0 as i64)
}

pub fn int_cached(_: &dyn Receiver) -> Arc<dyn CounterOps> {
    Counting::cached(count_int)
}

pub fn int_uncached() -> Arc<dyn CounterOps> {
    Counting::uncached(count_int)
}

fn string_cached(_: &dyn Receiver) -> Arc<dyn CounterOps> {
    Counting::cached(count_string)
}

fn string_uncached() -> Arc<dyn CounterOps> {
    Counting::uncached(count_string)
}

fn float_cached(_: &dyn Receiver) -> Arc<dyn CounterOps> {
    Counting::cached(count_float)
}

fn float_uncached() -> Arc<dyn CounterOps> {
    Counting::uncached(count_float)
}

export_capability!(COUNTER_INT: Counter => IntBox {
    cached: int_cached,
    uncached: int_uncached,
});

export_capability!(COUNTER_STRING: Counter => StringBox {
    cached: string_cached,
    uncached: string_uncached,
});

export_capability!(COUNTER_FLOAT: Counter => FloatBox {
    cached: float_cached,
    uncached: float_uncached,
});
