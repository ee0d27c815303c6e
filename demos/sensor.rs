//! # Sensor Example
//!
//! A sensor thread answers `DemandReading` with a `Reading`; a receiver thread
//! keeps demanding readings until one crosses a threshold, then tells the
//! sensor to stop. Each side is one handler object registered per event type
//! through a `SubscriptionSet`.
//!
//! ## Run
//! ```bash
//! cargo run --example sensor
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use relaybus::{Endpoint, EndpointHandle, Subscriber, SubscriptionSet};
use tracing_subscriber::EnvFilter;

const THRESHOLD: u32 = 700;

struct DemandReading;
struct Reading(u32);
struct StopSensor;

/// Produces pseudo-random readings on demand.
struct Sensor {
    endpoint: EndpointHandle,
    state: u32,
    working: bool,
}

impl Subscriber<DemandReading> for Sensor {
    fn on_event(&mut self, _: &DemandReading) {
        self.state = self.state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let value = (self.state >> 16) % 1024;
        self.endpoint.publish(Reading(value));
    }
}

impl Subscriber<StopSensor> for Sensor {
    fn on_event(&mut self, _: &StopSensor) {
        self.working = false;
    }
}

/// Demands readings until one is above the threshold.
struct Receiver {
    endpoint: EndpointHandle,
    last: Option<u32>,
    working: bool,
}

impl Receiver {
    fn check(&mut self) {
        match self.last {
            Some(v) if v > THRESHOLD => {
                println!("reading {v} > {THRESHOLD}, stopping sensor");
                self.endpoint.publish(StopSensor);
                self.working = false;
            }
            last => {
                println!("reading {last:?} <= {THRESHOLD}, demanding another");
                self.endpoint.publish(DemandReading);
            }
        }
    }
}

impl Subscriber<Reading> for Receiver {
    fn on_event(&mut self, event: &Reading) {
        self.last = Some(event.0);
        self.check();
    }
}

fn pump(endpoint: &Endpoint, working: impl Fn() -> bool) {
    while working() {
        if !endpoint.dispatch() {
            thread::sleep(Duration::from_millis(1));
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (ready_tx, ready_rx) = mpsc::channel();

    let sensor_thread = thread::spawn(move || -> anyhow::Result<()> {
        let endpoint = Endpoint::new();
        let sensor = Rc::new(RefCell::new(Sensor {
            endpoint: endpoint.handle(),
            state: 42,
            working: true,
        }));
        let _subs = SubscriptionSet::new(&endpoint)
            .on::<DemandReading, _>(&sensor)
            .on::<StopSensor, _>(&sensor);
        ready_tx.send(())?;

        pump(&endpoint, || sensor.borrow().working);
        Ok(())
    });

    let endpoint = Endpoint::new();
    let receiver = Rc::new(RefCell::new(Receiver {
        endpoint: endpoint.handle(),
        last: None,
        working: true,
    }));
    let _subs = SubscriptionSet::new(&endpoint).on::<Reading, _>(&receiver);

    ready_rx.recv()?;
    receiver.borrow_mut().check();
    pump(&endpoint, || receiver.borrow().working);

    sensor_thread
        .join()
        .map_err(|_| anyhow::anyhow!("sensor thread panicked"))??;
    Ok(())
}
