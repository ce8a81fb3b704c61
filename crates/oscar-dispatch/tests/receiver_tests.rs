//! Receiver Tests
//!
//! Covers parsing at the transport boundary, fan-out to packet listeners and
//! the bad-data path.

use oscar_core::{CodecConfig, Message, ParseErrorKind, TypeRegistry};
use oscar_dispatch::{
    BadDataEvent, Dispatcher, PacketEvent, PacketListener, Receiver,
};
use oscar_test_utils::{local_source, message_bytes, BadDataCollector, MessageCollector};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct Recorder {
    packets: Mutex<Vec<PacketEvent>>,
    bad: Mutex<Vec<BadDataEvent>>,
}

impl PacketListener for Recorder {
    fn handle_packet(&self, event: &PacketEvent) {
        self.packets.lock().push(event.clone());
    }

    fn handle_bad_data(&self, event: &BadDataEvent) {
        self.bad.lock().push(event.clone());
    }
}

fn wired() -> (Receiver, Arc<Dispatcher>, MessageCollector, BadDataCollector) {
    let receiver = Receiver::new();
    let dispatcher = Arc::new(Dispatcher::new());
    let messages = MessageCollector::new();
    let bad = BadDataCollector::new();

    dispatcher.add_listener("//", messages.listener());
    dispatcher.add_bad_data_listener(bad.listener());
    receiver.add_listener(dispatcher.clone());

    (receiver, dispatcher, messages, bad)
}

#[test]
fn test_receive_dispatches_message() {
    let (receiver, _dispatcher, messages, bad) = wired();
    let source = local_source(57120);

    let bytes = message_bytes(&Message::new("/synth/freq").arg(440.0f32));
    receiver.receive(&bytes, Some(source)).unwrap();

    assert_eq!(messages.messages(), vec![Message::new("/synth/freq").arg(440.0f32)]);
    let received = messages.last().unwrap();
    assert_eq!(received.source, Some(source));
    assert!(received.message.info().is_some());
    assert_eq!(bad.count(), 0);
}

#[test]
fn test_bad_data_does_not_disturb_later_packets() {
    let (receiver, _dispatcher, messages, bad) = wired();
    let garbage = [0xFFu8, 0x00, 0x12, 0x34, 0x56];

    let error = receiver.receive(&garbage, None).unwrap_err();
    assert_eq!(&error.data()[..], &garbage[..]);
    assert_eq!(bad.count(), 1);
    assert_eq!(&bad.events()[0].data()[..], &garbage[..]);

    receiver
        .receive(&message_bytes(&Message::new("/ok")), None)
        .unwrap();
    assert_eq!(messages.addresses(), vec!["/ok"]);
    assert_eq!(bad.count(), 1);
}

#[test]
fn test_truncated_message_reported() {
    let (receiver, _dispatcher, messages, bad) = wired();
    let bytes = message_bytes(&Message::new("/value").arg(1).arg(2));

    let error = receiver.receive(&bytes[..bytes.len() - 4], None).unwrap_err();
    assert!(matches!(error.kind(), ParseErrorKind::Truncated { .. }));
    assert_eq!(messages.count(), 0);
    assert_eq!(bad.count(), 1);
}

#[test]
fn test_multiple_packet_listeners() {
    let receiver = Receiver::new();
    let first = Arc::new(Recorder::default());
    let second = Arc::new(Recorder::default());
    let second_handle: Arc<dyn PacketListener> = second.clone();

    receiver.add_listener(first.clone());
    receiver.add_listener(second_handle.clone());

    let bytes = message_bytes(&Message::new("/a"));
    receiver.receive_bytes(&bytes, None).unwrap();
    assert_eq!(first.packets.lock().len(), 1);
    assert_eq!(second.packets.lock().len(), 1);

    assert!(receiver.remove_listener(&second_handle));
    assert!(!receiver.remove_listener(&second_handle));
    receiver.receive(&[0u8; 3], None).unwrap_err();
    assert_eq!(first.bad.lock().len(), 1);
    assert_eq!(second.bad.lock().len(), 0);
}

#[test]
fn test_strict_type_tags() {
    let config = CodecConfig {
        allow_missing_type_tags: false,
        ..Default::default()
    };
    let strict = Receiver::with_config(Arc::new(TypeRegistry::standard()), config);
    let lenient = Receiver::new();
    let recorder = Arc::new(Recorder::default());
    strict.add_listener(recorder.clone());
    lenient.add_listener(recorder.clone());

    // Address only, no type tag string
    let bytes = b"/old\0\0\0\0";
    assert!(strict.receive(bytes, None).is_err());
    lenient.receive(bytes, None).unwrap();

    assert_eq!(recorder.bad.lock().len(), 1);
    let packets = recorder.packets.lock();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].packet.as_message().unwrap().arguments().len(), 0);
}
