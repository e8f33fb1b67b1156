//! Echo Stress Test - dua port di dua thread
//!
//! Usage:
//!   cargo test --release --test echo_stress_test -- --nocapture

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use twinport::{
    Channel, ChannelError, Endpoint, Port, PortEvent, PortId, RunLoop, PORT_CAPACITY,
};

const MESSAGES: u32 = 100_000;

fn spawn_echo(channel: &Arc<Channel>) -> thread::JoinHandle<u32> {
    let channel = Arc::clone(channel);
    thread::spawn(move || {
        let mut endpoint = Endpoint::connect(&channel).unwrap();
        let mut echoed = 0;
        while let Some(payload) = endpoint.recv() {
            endpoint.send(payload).unwrap();
            echoed += 1;
        }
        endpoint.close().unwrap();
        echoed
    })
}

#[test]
fn test_echo_preserves_fifo_order() {
    let channel = Channel::new();
    let echo = spawn_echo(&channel);

    let mut client = Endpoint::connect(&channel).unwrap();
    let start = Instant::now();

    let mut sent = 0u32;
    let mut expected = 0u32;
    while expected < MESSAGES {
        while sent < MESSAGES && client.try_send(sent.to_le_bytes()).is_ok() {
            sent += 1;
        }

        let payload = client.recv().expect("echo ended early");
        assert_eq!(payload.as_bytes(), &expected.to_le_bytes());
        expected += 1;
    }

    client.close().unwrap();
    assert_eq!(echo.join().unwrap(), MESSAGES);

    let elapsed = start.elapsed();
    println!(
        "echoed {} messages in {:.3}s ({:.0} msg/s)",
        MESSAGES,
        elapsed.as_secs_f64(),
        MESSAGES as f64 / elapsed.as_secs_f64()
    );
}

#[test]
fn test_blocking_send_survives_backpressure() {
    let channel = Channel::new();
    let sink_channel = Arc::clone(&channel);

    // Penerima lambat: inbox pasti penuh berkali-kali
    let sink = thread::spawn(move || {
        let mut endpoint = Endpoint::connect(&sink_channel).unwrap();
        let mut total = 0u64;
        let mut count = 0u32;
        while let Some(payload) = endpoint.recv() {
            total += payload.len() as u64;
            count += 1;
            if count % 4096 == 0 {
                thread::yield_now();
            }
        }
        endpoint.close().unwrap();
        (count, total)
    });

    let mut source = Endpoint::connect(&channel).unwrap();
    for i in 0..MESSAGES {
        source.send(vec![(i % 251) as u8; 16]).unwrap();
    }
    source.close().unwrap();

    let (count, total) = sink.join().unwrap();
    assert_eq!(count, MESSAGES);
    assert_eq!(total, MESSAGES as u64 * 16);
}

#[test]
fn test_event_driven_consumer() {
    let channel = Channel::new();
    let consumer_channel = Arc::clone(&channel);

    let consumer = thread::spawn(move || {
        let mut run_loop = RunLoop::new().unwrap();
        let received: Rc<RefCell<Vec<u32>>> = Rc::default();
        let closed = Rc::new(RefCell::new(false));

        let sink = Rc::clone(&received);
        let closed_flag = Rc::clone(&closed);
        let _port = Port::init(
            &consumer_channel,
            &run_loop,
            move |port: &Port, event: PortEvent| match event {
                PortEvent::Flush => {
                    while let Some(payload) = port.read() {
                        let mut bytes = [0u8; 4];
                        bytes.copy_from_slice(payload.as_bytes());
                        sink.borrow_mut().push(u32::from_le_bytes(bytes));
                    }
                }
                PortEvent::RemoteEnd => {
                    assert!(port.end());
                    port.close();
                }
                PortEvent::Close => *closed_flag.borrow_mut() = true,
                PortEvent::Drain | PortEvent::End => {}
            },
        )
        .unwrap();

        run_loop.run().unwrap();
        assert!(*closed.borrow());
        let received = received.borrow().clone();
        received
    });

    // Producer memakai Port langsung dengan blocking wait
    let mut run_loop = RunLoop::new().unwrap();
    let producer = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).unwrap();

    for i in 0..MESSAGES {
        let payload = i.to_le_bytes();
        while producer.write(payload).is_err() {
            assert!(producer.wait_drain());
        }
    }
    while !producer.end() {
        assert!(producer.wait_drain());
    }

    while !producer.is_remote_ended() {
        assert_eq!(producer.read(), None);
        if !producer.is_remote_ended() && !producer.wait_flush() {
            break;
        }
    }
    assert!(producer.is_remote_ended());

    producer.close();
    while !producer.is_released() {
        run_loop.run_once(None).unwrap();
    }

    let received = consumer.join().unwrap();
    assert_eq!(received.len(), MESSAGES as usize);
    assert!(received.iter().copied().eq(0..MESSAGES));
}

#[test]
fn test_close_with_both_directions_full() {
    let channel = Channel::new();
    let echo_channel = Arc::clone(&channel);

    let echo = thread::spawn(move || {
        let mut endpoint = Endpoint::connect(&echo_channel).unwrap();
        while let Some(payload) = endpoint.recv() {
            if endpoint.send(payload).is_err() {
                break;
            }
        }
        endpoint.close().unwrap();
    });

    let mut client = Endpoint::connect(&channel).unwrap();
    let full = PORT_CAPACITY - 1;

    // Client tidak pernah membaca: echo akhirnya blocking di `send`
    loop {
        if client.try_send("spin").is_err() {
            let echo_id = client.id().peer();
            if channel.unread(client.id()) == full && channel.unread(echo_id) == full {
                break;
            }
            thread::yield_now();
        }
    }

    client.close().unwrap();
    echo.join().unwrap();

    assert_eq!(channel.unread(PortId::Zero), 0);
    assert_eq!(channel.unread(PortId::One), 0);
}

#[test]
fn test_third_connection_is_rejected() {
    let channel = Channel::new();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let channel = Arc::clone(&channel);
            thread::spawn(move || {
                let endpoint = Endpoint::connect(&channel).unwrap();
                endpoint.id()
            })
        })
        .collect();

    let mut ids: Vec<PortId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort_by_key(|id| id.index());
    assert_eq!(ids, vec![PortId::Zero, PortId::One]);

    assert!(channel.is_fully_connected());
    assert!(matches!(
        Endpoint::connect(&channel),
        Err(ChannelError::FullyConnected)
    ));
}
