//! # Ping-Pong Example
//!
//! Two threads, one endpoint each. The client publishes `Ping`; the server
//! answers every `Ping` with a numbered `Pong` until the round limit.
//!
//! ## Run
//! ```bash
//! RUST_LOG=relaybus=debug cargo run --example ping_pong
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use relaybus::{Endpoint, Subscription};
use tracing_subscriber::EnvFilter;

const ROUNDS: u32 = 5;

struct Ping;
struct Pong(u32);

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let (ready_tx, ready_rx) = mpsc::channel();

    let server = thread::spawn(move || -> anyhow::Result<u32> {
        let endpoint = Endpoint::new();
        let reply = endpoint.handle();
        let served = Rc::new(Cell::new(0));
        let count = Rc::clone(&served);
        let _sub = Subscription::new(&endpoint, move |_: &Ping| {
            count.set(count.get() + 1);
            println!("[server] ping #{}", count.get());
            reply.publish(Pong(count.get()));
        });
        ready_tx.send(())?;

        while served.get() < ROUNDS {
            if !endpoint.dispatch() {
                thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(served.get())
    });

    let client = Endpoint::new();
    let last = Rc::new(Cell::new(0));
    let sink = Rc::clone(&last);
    let again = client.handle();
    let _sub = Subscription::new(&client, move |p: &Pong| {
        println!("[client] pong #{}", p.0);
        sink.set(p.0);
        if p.0 < ROUNDS {
            again.publish(Ping);
        }
    });

    ready_rx.recv()?;
    client.publish(Ping);
    while last.get() < ROUNDS {
        if !client.dispatch() {
            thread::sleep(Duration::from_millis(1));
        }
    }

    let served = server
        .join()
        .map_err(|_| anyhow::anyhow!("server thread panicked"))??;
    println!("done: served={served} received={}", last.get());
    Ok(())
}
